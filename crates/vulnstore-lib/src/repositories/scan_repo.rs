// Scan Repository
// Writes a scan header, its vulnerabilities, summary, and metadata as one unit

use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Metadata, ScanHeader, ScanRecord, SeverityCounts, Summary, UpsertOutcome, Vulnerability,
};
use crate::repositories::vulnerability_repo::{VulnerabilityRow, VULNERABILITY_COLUMNS};
use crate::utils::database::Database;
use crate::utils::lenient::{decode_string_list, encode_string_list, parse_timestamp};
use crate::utils::timestamp::{format_reported, now_timestamp};

/// Repository for scan persistence
#[derive(Clone)]
pub struct ScanRepository {
    db: Database,
}

impl ScanRepository {
    /// Create a new ScanRepository
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // =========================================================================
    // Upsert
    // =========================================================================

    /// Persist a scan and everything attached to it in a single transaction.
    /// Any failing sub-write rolls back the whole scan.
    pub fn upsert_scan(&self, record: &ScanRecord) -> Result<UpsertOutcome, String> {
        let outcome = self.db.with_transaction(|conn| {
            let outcome = upsert_scan_header(conn, record)?;
            upsert_vulnerabilities(conn, &record.scan_id, &record.vulnerabilities)?;
            upsert_summary(conn, &record.scan_id, &record.summary)?;
            upsert_metadata(conn, &record.scan_id, &record.metadata)?;
            Ok(outcome)
        })?;

        log::info!(
            "[store] Scan {} {} ({} vulnerabilities)",
            record.scan_id,
            outcome.as_str(),
            record.vulnerabilities.len()
        );
        Ok(outcome)
    }

    // =========================================================================
    // Read-back
    // =========================================================================

    /// Get the stored header for a scan
    pub fn get_scan_header(&self, scan_id: &str) -> Result<Option<ScanHeader>, String> {
        self.db.with_connection(|conn| find_header(conn, scan_id))
    }

    /// Get a vulnerability by its global ID
    pub fn get_vulnerability(&self, id: &str) -> Result<Option<Vulnerability>, String> {
        self.db.with_connection(|conn| {
            let sql = format!("SELECT {} FROM vulnerabilities WHERE id = ?1", VULNERABILITY_COLUMNS);
            let row = conn
                .query_row(&sql, params![id], VulnerabilityRow::from_row)
                .optional()
                .map_err(|e| format!("Failed to get vulnerability: {}", e))?;

            Ok(row.map(VulnerabilityRow::into_vulnerability))
        })
    }

    /// List the vulnerabilities attached to a scan, ordered by ID
    pub fn list_vulnerabilities_for_scan(&self, scan_id: &str) -> Result<Vec<Vulnerability>, String> {
        self.db.with_connection(|conn| {
            let sql = format!(
                "SELECT {} FROM vulnerabilities WHERE scan_id = ?1 ORDER BY id",
                VULNERABILITY_COLUMNS
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| format!("Failed to prepare statement: {}", e))?;

            let rows = stmt
                .query_map(params![scan_id], VulnerabilityRow::from_row)
                .map_err(|e| format!("Failed to query vulnerabilities: {}", e))?;

            let mut vulnerabilities = Vec::new();
            for row in rows {
                let row = row.map_err(|e| format!("Failed to read row: {}", e))?;
                vulnerabilities.push(row.into_vulnerability());
            }
            Ok(vulnerabilities)
        })
    }

    /// Get the summary stored for a scan
    pub fn get_summary(&self, scan_id: &str) -> Result<Option<Summary>, String> {
        self.db.with_connection(|conn| {
            let row = conn
                .query_row(
                    r#"
                    SELECT total_vulnerabilities, severity_counts, fixable_count, compliant
                    FROM scan_summary
                    WHERE scan_id = ?1
                    "#,
                    params![scan_id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, bool>(3)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| format!("Failed to get scan summary: {}", e))?;

            Ok(row.map(|(total, counts_json, fixable, compliant)| Summary {
                total_vulnerabilities: total,
                severity_counts: serde_json::from_str::<SeverityCounts>(&counts_json)
                    .unwrap_or_default(),
                fixable_count: fixable,
                compliant,
            }))
        })
    }

    /// Get the metadata stored for a scan
    pub fn get_metadata(&self, scan_id: &str) -> Result<Option<Metadata>, String> {
        self.db.with_connection(|conn| {
            let row = conn
                .query_row(
                    r#"
                    SELECT scanner_version, policies_version, scanning_rules, excluded_paths
                    FROM scan_metadata
                    WHERE scan_id = ?1
                    "#,
                    params![scan_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| format!("Failed to get scan metadata: {}", e))?;

            Ok(row.map(|(scanner, policies, rules, excluded)| Metadata {
                scanner_version: scanner,
                policies_version: policies,
                scanning_rules: decode_string_list(&rules).value,
                excluded_paths: decode_string_list(&excluded).value,
            }))
        })
    }

    /// Count stored scan headers
    pub fn count_scans(&self) -> Result<i64, String> {
        self.db.with_connection_raw(|conn| {
            conn.query_row("SELECT COUNT(*) FROM scans", [], |row| row.get(0))
        })
    }
}

// =============================================================================
// Sub-writes (run inside the caller's transaction)
// =============================================================================

fn find_header(conn: &Connection, scan_id: &str) -> Result<Option<ScanHeader>, String> {
    conn.query_row(
        r#"
        SELECT scan_id, timestamp, scan_status, resource_type, resource_name,
               created_at, updated_at, last_attempted_at
        FROM scans
        WHERE scan_id = ?1
        "#,
        params![scan_id],
        |row| {
            let timestamp: String = row.get(1)?;
            Ok(ScanHeader {
                scan_id: row.get(0)?,
                timestamp: parse_timestamp(&timestamp).value,
                status: row.get(2)?,
                resource_type: row.get(3)?,
                resource_name: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
                last_attempted_at: row.get(7)?,
            })
        },
    )
    .optional()
    .map_err(|e| format!("Failed to check existing scan header: {}", e))
}

/// Insert or refresh the header; unchanged headers only get `last_attempted_at`
fn upsert_scan_header(conn: &Connection, record: &ScanRecord) -> Result<UpsertOutcome, String> {
    let existing = find_header(conn, &record.scan_id)?;
    let now = now_timestamp();

    if let Some(header) = &existing {
        if header.matches(record) {
            conn.execute(
                "UPDATE scans SET last_attempted_at = ?1 WHERE scan_id = ?2",
                params![now, record.scan_id],
            )
            .map_err(|e| format!("Failed to touch scan header: {}", e))?;
            return Ok(UpsertOutcome::Touched);
        }
    }

    conn.execute(
        r#"
        INSERT INTO scans (scan_id, timestamp, scan_status, resource_type, resource_name,
                           created_at, updated_at, last_attempted_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?6)
        ON CONFLICT(scan_id) DO UPDATE SET
            timestamp = excluded.timestamp,
            scan_status = excluded.scan_status,
            resource_type = excluded.resource_type,
            resource_name = excluded.resource_name,
            updated_at = excluded.updated_at,
            last_attempted_at = excluded.last_attempted_at
        "#,
        params![
            record.scan_id,
            format_reported(&record.timestamp),
            record.status,
            record.resource_type,
            record.resource_name,
            now,
        ],
    )
    .map_err(|e| format!("Failed to upsert scan header: {}", e))?;

    Ok(if existing.is_some() {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    })
}

fn upsert_vulnerabilities(
    conn: &Connection,
    scan_id: &str,
    vulnerabilities: &[Vulnerability],
) -> Result<(), String> {
    let now = now_timestamp();

    for vuln in vulnerabilities {
        let risk_factors = encode_string_list(&vuln.risk_factors);
        let published_date = vuln.published_date.as_ref().map(format_reported);

        // scan_id is fixed by the first scan that reported this ID
        conn.execute(
            r#"
            INSERT INTO vulnerabilities (id, scan_id, severity, cvss, status, package_name,
                                         current_version, fixed_version, description,
                                         published_date, link, risk_factors,
                                         created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
            ON CONFLICT(id) DO UPDATE SET
                severity = excluded.severity,
                cvss = excluded.cvss,
                status = excluded.status,
                package_name = excluded.package_name,
                current_version = excluded.current_version,
                fixed_version = excluded.fixed_version,
                description = excluded.description,
                published_date = excluded.published_date,
                link = excluded.link,
                risk_factors = excluded.risk_factors,
                updated_at = excluded.updated_at
            "#,
            params![
                vuln.id,
                scan_id,
                vuln.severity,
                vuln.cvss,
                vuln.status,
                vuln.package_name,
                vuln.current_version,
                vuln.fixed_version,
                vuln.description,
                published_date,
                vuln.link,
                risk_factors,
                now,
            ],
        )
        .map_err(|e| format!("Failed to upsert vulnerability {}: {}", vuln.id, e))?;
    }

    Ok(())
}

fn upsert_summary(conn: &Connection, scan_id: &str, summary: &Summary) -> Result<(), String> {
    let severity_counts = serde_json::to_string(&summary.severity_counts)
        .map_err(|e| format!("Failed to serialize severity_counts: {}", e))?;

    conn.execute(
        r#"
        INSERT INTO scan_summary (scan_id, total_vulnerabilities, severity_counts,
                                  fixable_count, compliant, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
        ON CONFLICT(scan_id) DO UPDATE SET
            total_vulnerabilities = excluded.total_vulnerabilities,
            severity_counts = excluded.severity_counts,
            fixable_count = excluded.fixable_count,
            compliant = excluded.compliant,
            updated_at = excluded.updated_at
        "#,
        params![
            scan_id,
            summary.total_vulnerabilities,
            severity_counts,
            summary.fixable_count,
            summary.compliant,
            now_timestamp(),
        ],
    )
    .map_err(|e| format!("Failed to upsert scan summary: {}", e))?;

    Ok(())
}

fn upsert_metadata(conn: &Connection, scan_id: &str, metadata: &Metadata) -> Result<(), String> {
    conn.execute(
        r#"
        INSERT INTO scan_metadata (scan_id, scanner_version, policies_version,
                                   scanning_rules, excluded_paths, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
        ON CONFLICT(scan_id) DO UPDATE SET
            scanner_version = excluded.scanner_version,
            policies_version = excluded.policies_version,
            scanning_rules = excluded.scanning_rules,
            excluded_paths = excluded.excluded_paths,
            updated_at = excluded.updated_at
        "#,
        params![
            scan_id,
            metadata.scanner_version,
            metadata.policies_version,
            encode_string_list(&metadata.scanning_rules),
            encode_string_list(&metadata.excluded_paths),
            now_timestamp(),
        ],
    )
    .map_err(|e| format!("Failed to upsert scan metadata: {}", e))?;

    Ok(())
}
