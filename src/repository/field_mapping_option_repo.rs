// ==========================================
// 实体导入系统 - 字段映射选项仓储
// ==========================================
// 职责: 管理 entity_importer_field_mapping_option 表（每个导入配置一行）
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::field_mapping::FieldMappingOptions;
use crate::importer::discovery_cache::invalidate_discovery;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct FieldMappingOptionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FieldMappingOptionRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.ensure_table()?;
        Ok(repo)
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        init_schema(&conn)?;
        Ok(())
    }

    pub fn save(&self, options: &FieldMappingOptions) -> RepositoryResult<()> {
        let identifiers_json = serde_json::to_string(&options.unique_identifiers)
            .map_err(|e| RepositoryError::json("unique_identifiers_json", e))?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO entity_importer_field_mapping_option (importer_id, unique_identifiers_json)
            VALUES (?1, ?2)
            ON CONFLICT(importer_id) DO UPDATE SET
                unique_identifiers_json = excluded.unique_identifiers_json
            "#,
            params![options.importer_id, identifiers_json],
        )?;
        invalidate_discovery();
        Ok(())
    }

    pub fn find(&self, importer_id: &str) -> RepositoryResult<Option<FieldMappingOptions>> {
        let raw: Option<String> = {
            let conn = self.get_conn()?;
            conn.query_row(
                "SELECT unique_identifiers_json FROM entity_importer_field_mapping_option WHERE importer_id = ?1",
                params![importer_id],
                |row| row.get(0),
            )
            .optional()?
        };

        match raw {
            None => Ok(None),
            Some(raw) => {
                let unique_identifiers = serde_json::from_str(&raw)
                    .map_err(|e| RepositoryError::json("unique_identifiers_json", e))?;
                Ok(Some(FieldMappingOptions {
                    importer_id: importer_id.to_string(),
                    unique_identifiers,
                }))
            }
        }
    }

    pub fn delete(&self, importer_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM entity_importer_field_mapping_option WHERE importer_id = ?1",
            params![importer_id],
        )?;
        if deleted > 0 {
            invalidate_discovery();
        }
        Ok(deleted > 0)
    }
}
