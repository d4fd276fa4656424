// Data models module

pub mod report;
pub mod scan;

pub use report::{ReportMetadata, ReportSummary, ReportVulnerability, ScanReport, ScanResults};
pub use scan::{
    Metadata, ScanHeader, ScanRecord, SeverityCounts, Summary, UpsertOutcome, Vulnerability,
    UNKNOWN_VERSION,
};
