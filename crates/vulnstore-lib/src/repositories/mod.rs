// Repository Layer
// Data access over the SQLite store

pub mod scan_repo;
pub mod vulnerability_repo;

pub use scan_repo::ScanRepository;
pub use vulnerability_repo::VulnerabilityRepository;
