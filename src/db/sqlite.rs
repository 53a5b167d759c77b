//! SQLite-backed store

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use super::schema;
use super::{
    AuditEntry, AuthTokenRecord, DangerLevel, FolderRecord, Provenance, ScriptRecord, ScriptStore,
    VersionRecord,
};
use crate::types::{GateError, Result};

const SCRIPT_COLUMNS: &str = "id, path, name, content, description, tags, locked, \
     password_hash, danger_level, requires, examples, created_at, updated_at";

/// Store backed by a single SQLite connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database file
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)
            .map_err(|e| GateError::Database(format!("Failed to open SQLite: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )
        .map_err(|e| GateError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        Self::with_schema(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory().map_err(|e| {
            GateError::Database(format!("Failed to open in-memory SQLite: {}", e))
        })?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| GateError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        Self::with_schema(conn)
    }

    fn with_schema(conn: Connection) -> Result<Self> {
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| GateError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Count audit rows for an action (diagnostics and tests)
    pub fn count_audit(&self, action: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM audit_log WHERE action = ?1",
                params![action],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

fn to_sql_ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_column(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

fn script_from_row(row: &Row) -> rusqlite::Result<ScriptRecord> {
    let level: i64 = row.get("danger_level")?;
    let danger_level = u8::try_from(level)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(e)))
        .and_then(|l| {
            DangerLevel::try_from(l).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(e))
            })
        })?;
    let locked: i64 = row.get("locked")?;

    Ok(ScriptRecord {
        id: row.get("id")?,
        path: row.get("path")?,
        name: row.get("name")?,
        content: row.get("content")?,
        locked: locked != 0,
        password_hash: row.get("password_hash")?,
        danger_level,
        description: row.get("description")?,
        tags: row.get("tags")?,
        requires: row.get("requires")?,
        examples: row.get("examples")?,
        created_at: ts_column(row, "created_at")?,
        updated_at: ts_column(row, "updated_at")?,
    })
}

fn folder_from_row(row: &Row) -> rusqlite::Result<FolderRecord> {
    Ok(FolderRecord {
        id: row.get("id")?,
        path: row.get("path")?,
        name: row.get("name")?,
        created_at: ts_column(row, "created_at")?,
    })
}

fn token_from_row(row: &Row) -> rusqlite::Result<AuthTokenRecord> {
    Ok(AuthTokenRecord {
        token: row.get("token")?,
        script_id: row.get("script_id")?,
        expires_at: ts_column(row, "expires_at")?,
        created_at: ts_column(row, "created_at")?,
        provenance: Provenance {
            ip_address: row.get("ip_address")?,
            user_agent: row.get("user_agent")?,
        },
    })
}

fn version_from_row(row: &Row) -> rusqlite::Result<VersionRecord> {
    Ok(VersionRecord {
        script_id: row.get("script_id")?,
        version: row.get("version")?,
        content: row.get("content")?,
        created_at: ts_column(row, "created_at")?,
    })
}

/// Map constraint failures on writes onto the error taxonomy
fn write_error(e: rusqlite::Error, what: &str) -> GateError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        match err.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return GateError::Conflict(format!("{what} already exists"));
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return GateError::NotFound(format!("{what} references a missing record"));
            }
            _ => {}
        }
    }
    GateError::Database(e.to_string())
}

/// Escape LIKE wildcards; pair with `ESCAPE '\'`
fn like_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[async_trait]
impl ScriptStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn get_script_by_path(&self, path: &str) -> Result<Option<ScriptRecord>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {SCRIPT_COLUMNS} FROM scripts WHERE path = ?1");
            Ok(conn
                .query_row(&sql, params![path], script_from_row)
                .optional()?)
        })
    }

    async fn get_script(&self, id: &str) -> Result<Option<ScriptRecord>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {SCRIPT_COLUMNS} FROM scripts WHERE id = ?1");
            Ok(conn.query_row(&sql, params![id], script_from_row).optional()?)
        })
    }

    async fn list_scripts(&self) -> Result<Vec<ScriptRecord>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {SCRIPT_COLUMNS} FROM scripts ORDER BY path");
            let mut stmt = conn.prepare(&sql)?;
            let scripts = stmt
                .query_map([], script_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(scripts)
        })
    }

    async fn search_scripts(&self, query: &str) -> Result<Vec<ScriptRecord>> {
        let pattern = format!("%{}%", like_escape(query));
        self.with_conn(|conn| {
            let sql = format!(
                r"SELECT {SCRIPT_COLUMNS} FROM scripts
                  WHERE path LIKE ?1 ESCAPE '\'
                     OR name LIKE ?1 ESCAPE '\'
                     OR description LIKE ?1 ESCAPE '\'
                     OR tags LIKE ?1 ESCAPE '\'
                  ORDER BY path"
            );
            let mut stmt = conn.prepare(&sql)?;
            let scripts = stmt
                .query_map(params![pattern], script_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(scripts)
        })
    }

    async fn create_script(&self, script: &ScriptRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO scripts (id, path, name, content, description, tags, locked,
                     password_hash, danger_level, requires, examples, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    script.id,
                    script.path,
                    script.name,
                    script.content,
                    script.description,
                    script.tags,
                    script.locked as i64,
                    script.password_hash,
                    u8::from(script.danger_level) as i64,
                    script.requires,
                    script.examples,
                    to_sql_ts(&script.created_at),
                    to_sql_ts(&script.updated_at),
                ],
            )
            .map_err(|e| write_error(e, &format!("script with path {}", script.path)))?;
            Ok(())
        })
    }

    async fn update_script(&self, script: &ScriptRecord) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE scripts SET path = ?2, name = ?3, content = ?4, description = ?5,
                         tags = ?6, locked = ?7, password_hash = ?8, danger_level = ?9,
                         requires = ?10, examples = ?11, updated_at = ?12
                     WHERE id = ?1",
                    params![
                        script.id,
                        script.path,
                        script.name,
                        script.content,
                        script.description,
                        script.tags,
                        script.locked as i64,
                        script.password_hash,
                        u8::from(script.danger_level) as i64,
                        script.requires,
                        script.examples,
                        to_sql_ts(&script.updated_at),
                    ],
                )
                .map_err(|e| write_error(e, &format!("script with path {}", script.path)))?;
            if changed == 0 {
                return Err(GateError::NotFound(format!("script {}", script.id)));
            }
            Ok(())
        })
    }

    async fn delete_script(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM scripts WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
    }

    async fn list_folders(&self) -> Result<Vec<FolderRecord>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, path, name, created_at FROM folders ORDER BY path")?;
            let folders = stmt
                .query_map([], folder_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(folders)
        })
    }

    async fn get_folder(&self, id: &str) -> Result<Option<FolderRecord>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, path, name, created_at FROM folders WHERE id = ?1",
                    params![id],
                    folder_from_row,
                )
                .optional()?)
        })
    }

    async fn get_folder_by_path(&self, path: &str) -> Result<Option<FolderRecord>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, path, name, created_at FROM folders WHERE path = ?1",
                    params![path],
                    folder_from_row,
                )
                .optional()?)
        })
    }

    async fn create_folder(&self, folder: &FolderRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO folders (id, path, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![folder.id, folder.path, folder.name, to_sql_ts(&folder.created_at)],
            )
            .map_err(|e| write_error(e, &format!("folder {}", folder.path)))?;
            Ok(())
        })
    }

    async fn delete_folder_tree(&self, path: &str) -> Result<usize> {
        // Case-sensitive prefix match; LIKE folds ASCII case
        let prefix = format!("{path}/");
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM folders WHERE path = ?1 OR substr(path, 1, length(?2)) = ?2",
                params![path, prefix],
            )?;
            Ok(removed)
        })
    }

    async fn get_auth_token(&self, token: &str) -> Result<Option<AuthTokenRecord>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT token, script_id, expires_at, created_at, ip_address, user_agent
                     FROM auth_tokens WHERE token = ?1",
                    params![token],
                    token_from_row,
                )
                .optional()?)
        })
    }

    async fn create_auth_token(&self, record: &AuthTokenRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO auth_tokens (token, script_id, expires_at, created_at, ip_address, user_agent)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.token,
                    record.script_id,
                    to_sql_ts(&record.expires_at),
                    to_sql_ts(&record.created_at),
                    record.provenance.ip_address,
                    record.provenance.user_agent,
                ],
            )
            .map_err(|e| write_error(e, "token"))?;
            Ok(())
        })
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM auth_tokens WHERE expires_at <= ?1",
                params![to_sql_ts(&now)],
            )?;
            Ok(removed)
        })
    }

    async fn create_audit_log(&self, entry: &AuditEntry) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_log (action, entity_type, entity_id, entity_path, ip_address, user_agent, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.action.as_str(),
                    entry.entity_type,
                    entry.entity_id,
                    entry.entity_path,
                    entry.provenance.ip_address,
                    entry.provenance.user_agent,
                    to_sql_ts(&entry.created_at),
                ],
            )?;
            Ok(())
        })
    }

    async fn create_version(&self, version: &VersionRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO script_versions (script_id, version, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    version.script_id,
                    version.version,
                    version.content,
                    to_sql_ts(&version.created_at),
                ],
            )
            .map_err(|e| write_error(e, &format!("version {}", version.version)))?;
            Ok(())
        })
    }

    async fn list_versions(&self, script_id: &str) -> Result<Vec<VersionRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT script_id, version, content, created_at FROM script_versions
                 WHERE script_id = ?1 ORDER BY version DESC",
            )?;
            let versions = stmt
                .query_map(params![script_id], version_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(versions)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn script(id: &str, path: &str) -> ScriptRecord {
        let now = Utc::now();
        ScriptRecord {
            id: id.to_string(),
            path: path.to_string(),
            name: crate::paths::leaf_name(path).to_string(),
            content: "echo hi".to_string(),
            locked: true,
            password_hash: Some("$argon2id$placeholder".to_string()),
            danger_level: DangerLevel::Caution,
            description: Some("100% useful_thing".to_string()),
            tags: None,
            requires: None,
            examples: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_script_round_trip_preserves_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let original = script("1", "/a/b.sh");
        store.create_script(&original).await.unwrap();

        let loaded = store.get_script_by_path("/a/b.sh").await.unwrap().unwrap();
        assert_eq!(loaded.id, "1");
        assert!(loaded.locked);
        assert_eq!(loaded.danger_level, DangerLevel::Caution);
        assert_eq!(loaded.password_hash, original.password_hash);
        assert_eq!(loaded.created_at.timestamp_micros(), original.created_at.timestamp_micros());
    }

    #[tokio::test]
    async fn test_unique_path_is_conflict() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_script(&script("1", "/a.sh")).await.unwrap();
        let err = store.create_script(&script("2", "/a.sh")).await.unwrap_err();
        assert!(matches!(err, GateError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_script(&script("1", "/a.sh")).await.unwrap();
        let mut other = script("2", "/b.sh");
        other.description = Some("plain".into());
        store.create_script(&other).await.unwrap();

        assert_eq!(store.search_scripts("100%").await.unwrap().len(), 1);
        assert_eq!(store.search_scripts("u_e").await.unwrap().len(), 0);
        assert_eq!(store.search_scripts("USEFUL").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_token_cascade_and_sweep() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_script(&script("1", "/a.sh")).await.unwrap();
        let now = Utc::now();
        for (token, offset) in [("live", 5), ("stale", -5)] {
            store
                .create_auth_token(&AuthTokenRecord {
                    token: token.into(),
                    script_id: "1".into(),
                    expires_at: now + Duration::minutes(offset),
                    created_at: now,
                    provenance: Provenance::default(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.delete_expired_tokens(now).await.unwrap(), 1);
        assert!(store.get_auth_token("live").await.unwrap().is_some());

        store.delete_script("1").await.unwrap();
        assert!(store.get_auth_token("live").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_folder_tree_delete_is_case_sensitive() {
        let store = SqliteStore::open_in_memory().unwrap();
        for path in ["/ops", "/ops/db", "/OPS", "/OPS/web", "/ops_x"] {
            store
                .create_folder(&FolderRecord {
                    id: path.to_string(),
                    path: path.to_string(),
                    name: crate::paths::leaf_name(path).to_string(),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.delete_folder_tree("/ops").await.unwrap(), 2);
        let left: Vec<String> = store
            .list_folders()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(left, vec!["/OPS", "/OPS/web", "/ops_x"]);
    }

    #[tokio::test]
    async fn test_search_folds_ascii_case_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut umlaut = script("1", "/a.sh");
        umlaut.description = Some("ÜBER tool".into());
        store.create_script(&umlaut).await.unwrap();

        assert_eq!(store.search_scripts("über").await.unwrap().len(), 0);
        assert_eq!(store.search_scripts("ÜBER TOOL").await.unwrap().len(), 1);
        assert_eq!(store.search_scripts("Über tOOL").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_token_for_missing_script_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        let err = store
            .create_auth_token(&AuthTokenRecord {
                token: "t".into(),
                script_id: "ghost".into(),
                expires_at: now,
                created_at: now,
                provenance: Provenance::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::NotFound(_)));
    }
}
