// SQLite Schema Definitions and Migrations
// Contains all table definitions and migration logic

use rusqlite::{params, Connection};

/// Current schema version
pub const CURRENT_VERSION: i32 = 1;

/// Migration struct containing version and SQL statements
struct Migration {
    version: i32,
    description: &'static str,
    up: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial scan ingestion schema",
    up: r#"
        -- Scan headers, one row per scan_id
        CREATE TABLE IF NOT EXISTS scans (
            scan_id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            scan_status TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_attempted_at TEXT NOT NULL
        );

        -- Vulnerabilities, keyed globally by id
        CREATE TABLE IF NOT EXISTS vulnerabilities (
            id TEXT PRIMARY KEY,
            scan_id TEXT NOT NULL REFERENCES scans(scan_id) ON DELETE CASCADE,
            severity TEXT NOT NULL,
            cvss REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT '',
            package_name TEXT NOT NULL DEFAULT '',
            current_version TEXT NOT NULL DEFAULT '',
            fixed_version TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            published_date TEXT,
            link TEXT NOT NULL DEFAULT '',
            risk_factors TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_vulnerabilities_severity ON vulnerabilities(severity);
        CREATE INDEX IF NOT EXISTS idx_vulnerabilities_scan ON vulnerabilities(scan_id);

        -- One summary per scan
        CREATE TABLE IF NOT EXISTS scan_summary (
            scan_id TEXT PRIMARY KEY REFERENCES scans(scan_id) ON DELETE CASCADE,
            total_vulnerabilities INTEGER NOT NULL DEFAULT 0,
            severity_counts TEXT NOT NULL DEFAULT '{}',
            fixable_count INTEGER NOT NULL DEFAULT 0,
            compliant INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- One metadata row per scan
        CREATE TABLE IF NOT EXISTS scan_metadata (
            scan_id TEXT PRIMARY KEY REFERENCES scans(scan_id) ON DELETE CASCADE,
            scanner_version TEXT NOT NULL DEFAULT 'unknown',
            policies_version TEXT NOT NULL DEFAULT 'unknown',
            scanning_rules TEXT NOT NULL DEFAULT '[]',
            excluded_paths TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    "#,
}];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    // Ensure schema_version table exists first
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now')),
            description TEXT
        )
        "#,
        [],
    )
    .map_err(|e| format!("Failed to create schema_version table: {}", e))?;

    let current_version = get_version(conn)?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            log::info!(
                "[schema] Running migration v{}: {}",
                migration.version,
                migration.description
            );

            conn.execute_batch(migration.up)
                .map_err(|e| format!("Migration v{} failed: {}", migration.version, e))?;

            conn.execute(
                "INSERT INTO schema_version (version, description) VALUES (?1, ?2)",
                params![migration.version, migration.description],
            )
            .map_err(|e| format!("Failed to record migration v{}: {}", migration.version, e))?;

            log::info!("[schema] Migration v{} completed", migration.version);
        }
    }

    Ok(())
}

/// Get the current schema version
pub fn get_version(conn: &Connection) -> Result<i32, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| format!("Failed to get schema version: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Check if a table exists
    fn table_exists(conn: &Connection, table_name: &str) -> Result<bool, String> {
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                params![table_name],
                |row| row.get(0),
            )
            .map_err(|e| format!("Failed to check table existence: {}", e))?;
        Ok(count > 0)
    }

    #[test]
    fn test_migrations() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);

        for table in ["scans", "vulnerabilities", "scan_summary", "scan_metadata"] {
            assert!(table_exists(&conn, table).unwrap(), "missing table {}", table);
        }
        assert!(!table_exists(&conn, "projects").unwrap());
    }

    #[test]
    fn test_idempotent_migrations() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
        let recorded: i32 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(recorded, 1);
    }
}
