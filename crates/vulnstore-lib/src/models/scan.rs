// Canonical scan models
// The shape persisted by the store and returned by queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::lenient::null_as_default;

/// Placeholder for scanner/policy versions the source did not report
pub const UNKNOWN_VERSION: &str = "unknown";

/// One ingested scan result for one resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanRecord {
    pub scan_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub resource_type: String,
    pub resource_name: String,
    pub vulnerabilities: Vec<Vulnerability>,
    pub summary: Summary,
    pub metadata: Metadata,
}

/// A single finding; `id` is unique across all scans
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Vulnerability {
    pub id: String,
    pub severity: String,
    pub cvss: f64,
    pub status: String,
    pub package_name: String,
    pub current_version: String,
    pub fixed_version: String,
    pub description: String,
    /// `None` when the source date was missing or unreadable
    pub published_date: Option<DateTime<Utc>>,
    pub link: String,
    pub risk_factors: Vec<String>,
}

/// Counts per severity level, stored as JSON text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SeverityCounts {
    #[serde(rename = "CRITICAL", default, deserialize_with = "null_as_default")]
    pub critical: i64,
    #[serde(rename = "HIGH", default, deserialize_with = "null_as_default")]
    pub high: i64,
    #[serde(rename = "MEDIUM", default, deserialize_with = "null_as_default")]
    pub medium: i64,
    #[serde(rename = "LOW", default, deserialize_with = "null_as_default")]
    pub low: i64,
}

/// Per-scan roll-up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Summary {
    pub total_vulnerabilities: i64,
    pub severity_counts: SeverityCounts,
    pub fixable_count: i64,
    pub compliant: bool,
}

/// Scanner details for one scan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub scanner_version: String,
    pub policies_version: String,
    pub scanning_rules: Vec<String>,
    pub excluded_paths: Vec<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            scanner_version: UNKNOWN_VERSION.to_string(),
            policies_version: UNKNOWN_VERSION.to_string(),
            scanning_rules: Vec::new(),
            excluded_paths: Vec::new(),
        }
    }
}

/// Stored `scans` row
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScanHeader {
    pub scan_id: String,
    /// `None` if the stored value no longer parses
    pub timestamp: Option<DateTime<Utc>>,
    pub status: String,
    pub resource_type: String,
    pub resource_name: String,
    pub created_at: String,
    pub updated_at: String,
    pub last_attempted_at: String,
}

impl ScanHeader {
    /// Whether the change-tracked fields equal those of `record`
    pub fn matches(&self, record: &ScanRecord) -> bool {
        self.timestamp == Some(record.timestamp)
            && self.status == record.status
            && self.resource_type == record.resource_type
            && self.resource_name == record.resource_name
    }
}

/// Result of persisting one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No header existed for the scan
    Inserted,
    /// Header existed with different tracked fields
    Updated,
    /// Header unchanged; only `last_attempted_at` moved
    Touched,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Inserted => "inserted",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Touched => "touched",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> ScanRecord {
        ScanRecord {
            scan_id: "scan_1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 27, 10, 0, 0).unwrap(),
            status: "completed".to_string(),
            resource_type: "container".to_string(),
            resource_name: "web".to_string(),
            vulnerabilities: Vec::new(),
            summary: Summary::default(),
            metadata: Metadata::default(),
        }
    }

    #[test]
    fn test_severity_counts_json_keys() {
        let counts = SeverityCounts {
            critical: 1,
            high: 2,
            medium: 3,
            low: 4,
        };
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"CRITICAL":1,"HIGH":2,"MEDIUM":3,"LOW":4}"#);
    }

    #[test]
    fn test_metadata_default_is_unknown() {
        let metadata = Metadata::default();
        assert_eq!(metadata.scanner_version, UNKNOWN_VERSION);
        assert_eq!(metadata.policies_version, UNKNOWN_VERSION);
        assert!(metadata.scanning_rules.is_empty());
    }

    #[test]
    fn test_header_matches() {
        let record = record();
        let mut header = ScanHeader {
            scan_id: record.scan_id.clone(),
            timestamp: Some(record.timestamp),
            status: record.status.clone(),
            resource_type: record.resource_type.clone(),
            resource_name: record.resource_name.clone(),
            created_at: String::new(),
            updated_at: String::new(),
            last_attempted_at: String::new(),
        };
        assert!(header.matches(&record));

        header.status = "failed".to_string();
        assert!(!header.matches(&record));

        header.status = record.status.clone();
        header.timestamp = None;
        assert!(!header.matches(&record));
    }
}
