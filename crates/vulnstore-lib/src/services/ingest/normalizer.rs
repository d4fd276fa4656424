// Report normalization
// Maps the source wire shape onto the canonical scan model

use crate::models::{
    Metadata, ReportMetadata, ReportSummary, ReportVulnerability, ScanReport, ScanRecord, Summary,
    Vulnerability, UNKNOWN_VERSION,
};
use crate::utils::lenient::parse_timestamp;

/// Convert one decoded report into a `ScanRecord`
pub fn normalize(report: ScanReport) -> ScanRecord {
    let results = report.scan_results;

    // Missing or unreadable scan times fall back to the Unix epoch
    let timestamp = parse_timestamp(results.timestamp.as_deref().unwrap_or_default());
    if timestamp.defaulted {
        log::warn!(
            "[ingest] Scan {} has no usable timestamp ({:?})",
            results.scan_id,
            results.timestamp
        );
    }

    let vulnerabilities = results
        .vulnerabilities
        .unwrap_or_default()
        .into_iter()
        .map(|v| normalize_vulnerability(&results.scan_id, v))
        .collect();

    ScanRecord {
        scan_id: results.scan_id,
        timestamp: timestamp.value.unwrap_or_default(),
        status: results.scan_status,
        resource_type: results.resource_type,
        resource_name: results.resource_name,
        vulnerabilities,
        summary: normalize_summary(results.summary),
        metadata: normalize_metadata(results.scan_metadata),
    }
}

fn normalize_vulnerability(scan_id: &str, v: ReportVulnerability) -> Vulnerability {
    let published = parse_timestamp(v.published_date.as_deref().unwrap_or_default());
    if published.defaulted {
        log::debug!(
            "[ingest] Scan {}: vulnerability {} has no usable published_date ({:?})",
            scan_id,
            v.id,
            v.published_date
        );
    }

    Vulnerability {
        id: v.id,
        severity: v.severity,
        cvss: v.cvss,
        status: v.status,
        package_name: v.package_name,
        current_version: v.current_version,
        fixed_version: v.fixed_version,
        description: v.description,
        published_date: published.value,
        link: v.link,
        risk_factors: v.risk_factors.unwrap_or_default(),
    }
}

fn normalize_summary(summary: ReportSummary) -> Summary {
    Summary {
        total_vulnerabilities: summary.total_vulnerabilities,
        severity_counts: summary.severity_counts,
        fixable_count: summary.fixable_count,
        compliant: summary.compliant,
    }
}

fn normalize_metadata(metadata: ReportMetadata) -> Metadata {
    Metadata {
        scanner_version: version_or_unknown(metadata.scanner_version),
        policies_version: version_or_unknown(metadata.policies_version),
        scanning_rules: metadata.scanning_rules.unwrap_or_default(),
        excluded_paths: metadata.excluded_paths.unwrap_or_default(),
    }
}

fn version_or_unknown(version: Option<String>) -> String {
    version
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
}
