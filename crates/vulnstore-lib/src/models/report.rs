// Source report models
// Mirrors the JSON files published by the scanner; loosely typed on purpose

use serde::Deserialize;

use super::scan::SeverityCounts;
use crate::utils::lenient::null_as_default;

/// One element of a report file (files hold a JSON array of these)
#[derive(Debug, Clone, Deserialize)]
pub struct ScanReport {
    #[serde(rename = "scanResults")]
    pub scan_results: ScanResults,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanResults {
    pub scan_id: String,
    /// Kept as text; decoded leniently during normalization
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scan_status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource_name: String,
    #[serde(default)]
    pub vulnerabilities: Option<Vec<ReportVulnerability>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: ReportSummary,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scan_metadata: ReportMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportVulnerability {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cvss: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub package_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fixed_version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Kept as text; decoded leniently during normalization
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub link: String,
    #[serde(default)]
    pub risk_factors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_vulnerabilities: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity_counts: SeverityCounts,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fixable_count: i64,
    // Published reports spell this key "complaint"
    #[serde(default, alias = "complaint", deserialize_with = "null_as_default")]
    pub compliant: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportMetadata {
    #[serde(default)]
    pub scanner_version: Option<String>,
    #[serde(default)]
    pub policies_version: Option<String>,
    #[serde(default)]
    pub scanning_rules: Option<Vec<String>>,
    #[serde(default)]
    pub excluded_paths: Option<Vec<String>>,
}

/// Decode a fetched file body
pub fn parse_reports(bytes: &[u8]) -> Result<Vec<ScanReport>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_report() {
        let json = r#"[{
            "scanResults": {
                "scan_id": "VULN_SCAN_1",
                "timestamp": "2025-01-27T08:00:00Z",
                "scan_status": "completed",
                "resource_type": "container",
                "resource_name": "payment-processor:1.0",
                "vulnerabilities": [{
                    "id": "CVE-2024-1234",
                    "severity": "HIGH",
                    "cvss": 8.5,
                    "status": "fixed",
                    "package_name": "openssl",
                    "current_version": "1.1.1t",
                    "fixed_version": "1.1.1u",
                    "description": "Buffer overflow",
                    "published_date": "2024-01-15T00:00:00Z",
                    "link": "https://nvd.nist.gov/vuln/detail/CVE-2024-1234",
                    "risk_factors": ["Remote Code Execution", "High CVSS Score"]
                }],
                "summary": {
                    "total_vulnerabilities": 1,
                    "severity_counts": {"CRITICAL": 0, "HIGH": 1, "MEDIUM": 0, "LOW": 0},
                    "fixable_count": 1,
                    "complaint": true
                },
                "scan_metadata": {
                    "scanner_version": "30.1.0",
                    "policies_version": "2025.1.27",
                    "scanning_rules": ["vulnerability"],
                    "excluded_paths": ["/tmp"]
                }
            }
        }]"#;

        let reports = parse_reports(json.as_bytes()).unwrap();
        assert_eq!(reports.len(), 1);

        let scan = &reports[0].scan_results;
        assert_eq!(scan.scan_id, "VULN_SCAN_1");
        assert_eq!(scan.summary.severity_counts.high, 1);
        assert!(scan.summary.compliant);
        let vulns = scan.vulnerabilities.as_ref().unwrap();
        assert_eq!(vulns[0].cvss, 8.5);
        assert_eq!(vulns[0].risk_factors.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_optional_sections_may_be_absent() {
        let json = r#"[{"scanResults": {"scan_id": "s", "timestamp": "2025-01-27T08:00:00Z"}}]"#;

        let reports = parse_reports(json.as_bytes()).unwrap();
        let scan = &reports[0].scan_results;

        assert!(scan.vulnerabilities.is_none());
        assert!(scan.scan_metadata.scanner_version.is_none());
        assert_eq!(scan.summary.total_vulnerabilities, 0);
        assert!(!scan.summary.compliant);
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert!(parse_reports(b"{\"scanResults\": {}}").is_err());
        assert!(parse_reports(b"not json").is_err());
        // scan_id is the only required key
        assert!(parse_reports(br#"[{"scanResults": {"timestamp": "2025-01-27T08:00:00Z"}}]"#).is_err());
    }

    #[test]
    fn test_null_fields_decode_as_absent() {
        let json = r#"[{"scanResults": {
            "scan_id": "s",
            "timestamp": null,
            "scan_status": null,
            "resource_name": null,
            "vulnerabilities": [{
                "id": "CVE-1",
                "severity": null,
                "cvss": null,
                "description": null,
                "published_date": null,
                "risk_factors": null
            }],
            "summary": {"total_vulnerabilities": null, "severity_counts": {"HIGH": null, "LOW": 2}},
            "scan_metadata": null
        }}, {"scanResults": {"scan_id": "t", "summary": null}}]"#;

        let reports = parse_reports(json.as_bytes()).unwrap();
        let scan = &reports[0].scan_results;

        assert!(scan.timestamp.is_none());
        assert_eq!(scan.scan_status, "");
        let vuln = &scan.vulnerabilities.as_ref().unwrap()[0];
        assert_eq!(vuln.severity, "");
        assert_eq!(vuln.cvss, 0.0);
        assert_eq!(vuln.description, "");
        assert_eq!(scan.summary.total_vulnerabilities, 0);
        assert_eq!(scan.summary.severity_counts.high, 0);
        assert_eq!(scan.summary.severity_counts.low, 2);
        assert!(scan.scan_metadata.scanner_version.is_none());
        assert!(!reports[1].scan_results.summary.compliant);
    }
}
