// Vulnerability Repository
// Read-only queries over stored vulnerabilities

use rusqlite::{params, Row};

use crate::models::Vulnerability;
use crate::utils::database::Database;
use crate::utils::lenient::{decode_string_list, parse_timestamp};

/// Column list shared by every vulnerability read
pub(crate) const VULNERABILITY_COLUMNS: &str = r#"
    id, severity, cvss, status, package_name, current_version, fixed_version,
    description, published_date, link, risk_factors
"#;

/// Raw vulnerability row before lenient decoding
pub(crate) struct VulnerabilityRow {
    id: String,
    severity: String,
    cvss: f64,
    status: String,
    package_name: String,
    current_version: String,
    fixed_version: String,
    description: String,
    published_date: Option<String>,
    link: String,
    risk_factors: String,
}

impl VulnerabilityRow {
    /// Map a row selected with `VULNERABILITY_COLUMNS`
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            severity: row.get(1)?,
            cvss: row.get(2)?,
            status: row.get(3)?,
            package_name: row.get(4)?,
            current_version: row.get(5)?,
            fixed_version: row.get(6)?,
            description: row.get(7)?,
            published_date: row.get(8)?,
            link: row.get(9)?,
            risk_factors: row.get(10)?,
        })
    }

    pub(crate) fn into_vulnerability(self) -> Vulnerability {
        let published_date = self
            .published_date
            .as_deref()
            .and_then(|text| parse_timestamp(text).value);

        Vulnerability {
            risk_factors: decode_string_list(&self.risk_factors).value,
            published_date,
            id: self.id,
            severity: self.severity,
            cvss: self.cvss,
            status: self.status,
            package_name: self.package_name,
            current_version: self.current_version,
            fixed_version: self.fixed_version,
            description: self.description,
            link: self.link,
        }
    }
}

/// Repository for vulnerability lookups
pub struct VulnerabilityRepository {
    db: Database,
}

impl VulnerabilityRepository {
    /// Create a new VulnerabilityRepository
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// List vulnerabilities whose stored severity equals `severity`
    pub fn list_by_severity(&self, severity: &str) -> Result<Vec<Vulnerability>, String> {
        let vulnerabilities = self.db.with_connection(|conn| {
            let sql = format!(
                "SELECT {} FROM vulnerabilities WHERE severity = ?1 ORDER BY id",
                VULNERABILITY_COLUMNS
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| format!("Failed to prepare statement: {}", e))?;

            let rows = stmt
                .query_map(params![severity], VulnerabilityRow::from_row)
                .map_err(|e| format!("Failed to query vulnerabilities: {}", e))?;

            let mut vulnerabilities = Vec::new();
            for row in rows {
                let row = row.map_err(|e| format!("Failed to read row: {}", e))?;
                vulnerabilities.push(row.into_vulnerability());
            }

            Ok(vulnerabilities)
        })?;

        log::info!(
            "[query] Fetched {} vulnerabilities with severity {}",
            vulnerabilities.len(),
            severity
        );
        Ok(vulnerabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, ScanRecord, Summary};
    use crate::repositories::ScanRepository;
    use chrono::{TimeZone, Utc};

    fn vuln(id: &str, severity: &str) -> Vulnerability {
        Vulnerability {
            id: id.to_string(),
            severity: severity.to_string(),
            cvss: 7.5,
            status: "active".to_string(),
            package_name: "openssl".to_string(),
            current_version: "1.1.1t".to_string(),
            fixed_version: "1.1.1u".to_string(),
            description: "Buffer overflow".to_string(),
            published_date: Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()),
            link: format!("https://nvd.nist.gov/vuln/detail/{}", id),
            risk_factors: vec!["Remote Code Execution".to_string()],
        }
    }

    fn seed(db: &Database) {
        let record = ScanRecord {
            scan_id: "scan_q".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 27, 8, 0, 0).unwrap(),
            status: "completed".to_string(),
            resource_type: "container".to_string(),
            resource_name: "api".to_string(),
            vulnerabilities: vec![
                vuln("CVE-2024-0002", "HIGH"),
                vuln("CVE-2024-0001", "HIGH"),
                vuln("CVE-2024-0003", "LOW"),
            ],
            summary: Summary::default(),
            metadata: Metadata::default(),
        };
        ScanRepository::new(db.clone()).upsert_scan(&record).unwrap();
    }

    #[test]
    fn test_list_by_severity() {
        let db = Database::in_memory().unwrap();
        seed(&db);
        let repo = VulnerabilityRepository::new(db);

        let high = repo.list_by_severity("HIGH").unwrap();
        let ids: Vec<&str> = high.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["CVE-2024-0001", "CVE-2024-0002"]);
        assert_eq!(high[0], vuln("CVE-2024-0001", "HIGH"));

        assert_eq!(repo.list_by_severity("LOW").unwrap().len(), 1);
        assert!(repo.list_by_severity("CRITICAL").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_stored_fields_degrade() {
        let db = Database::in_memory().unwrap();
        seed(&db);
        db.with_connection_raw(|conn| {
            conn.execute(
                "UPDATE vulnerabilities SET risk_factors = 'invalid-json', published_date = 'soon'
                 WHERE id = 'CVE-2024-0003'",
                [],
            )
        })
        .unwrap();

        let low = VulnerabilityRepository::new(db).list_by_severity("LOW").unwrap();

        assert!(low[0].risk_factors.is_empty());
        assert_eq!(low[0].published_date, None);
    }
}
