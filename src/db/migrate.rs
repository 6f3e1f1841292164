use rusqlite::Connection;
use crate::error::{Result, PapergraphError};

/// Migration metadata
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

/// Schema migrations, applied in version order.
///
/// The applied version is tracked in `PRAGMA user_version` so the store
/// holds no tables besides `nodes` and `edges`.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "001_graph_tables",
    sql: include_str!("../../migrations/001_graph_tables.sql"),
}];

/// Get the highest applied migration version
pub fn current_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Run all pending migrations
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let applied = current_version(conn)?;

    for migration in MIGRATIONS {
        if migration.version <= applied {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;

        tx.execute_batch(migration.sql).map_err(|e| {
            PapergraphError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("Failed to execute migration {}: {}", migration.name, e)),
            ))
        })?;

        // PRAGMA does not accept bound parameters
        tx.execute_batch(&format!("PRAGMA user_version = {}", migration.version))?;

        tx.commit()?;

        log::info!("Migration {} applied successfully", migration.name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .unwrap()
    }

    #[test]
    fn test_full_migration_schema() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let mut conn = Connection::open(&db_path).unwrap();

        run_migrations(&mut conn).unwrap();

        assert_eq!(table_names(&conn), vec!["edges".to_string(), "nodes".to_string()]);
        assert_eq!(current_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let mut conn = Connection::open(&db_path).unwrap();

        run_migrations(&mut conn).unwrap();
        conn.execute("INSERT INTO nodes (name, type) VALUES ('BERT', 'Method')", [])
            .unwrap();
        run_migrations(&mut conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_node_name_is_unique() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();

        conn.execute("INSERT INTO nodes (name, type) VALUES ('BERT', 'Method')", [])
            .unwrap();
        let dup = conn.execute("INSERT INTO nodes (name, type) VALUES ('BERT', 'Concept')", []);
        assert!(dup.is_err());
    }
}
