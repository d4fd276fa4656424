// Ingest Service Module
// Fetches scanner report files, normalizes them, and persists each scan

pub mod cancel;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod normalizer;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use dispatcher::{BatchSummary, IngestDispatcher};
pub use error::{IngestError, IngestErrorCode, IngestResult};
pub use fetcher::{HttpFetcher, ReportFetcher};
pub use normalizer::normalize;
