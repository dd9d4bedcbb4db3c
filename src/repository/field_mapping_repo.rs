// ==========================================
// 实体导入系统 - 字段映射仓储
// ==========================================
// 职责: 管理 entity_importer_field_mapping 表
// 顺序: 查询按 rowid 返回（存储自然加载顺序），更新不改变 rowid
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::field_mapping::{FieldMapping, ProcessingConfiguration, UniqueIdentifier};
use crate::importer::discovery_cache::invalidate_discovery;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::debug;

struct FieldMappingRow {
    id: String,
    label: String,
    name: String,
    destination: String,
    importer_id: String,
    importer_bundle: String,
    processing_json: String,
    unique_identifier_json: Option<String>,
}

impl FieldMappingRow {
    fn into_entity(self) -> RepositoryResult<FieldMapping> {
        let processing: ProcessingConfiguration = serde_json::from_str(&self.processing_json)
            .map_err(|e| RepositoryError::json("processing_json", e))?;
        let unique_identifier: Option<UniqueIdentifier> = match self.unique_identifier_json {
            Some(raw) if !raw.trim().is_empty() => Some(
                serde_json::from_str(&raw)
                    .map_err(|e| RepositoryError::json("unique_identifier_json", e))?,
            ),
            _ => None,
        };

        Ok(FieldMapping {
            id: self.id,
            label: self.label,
            name: self.name,
            destination: self.destination,
            importer_id: self.importer_id,
            importer_bundle: self.importer_bundle,
            processing,
            unique_identifier,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        label,
        name,
        destination,
        importer_id,
        importer_bundle,
        processing_json,
        unique_identifier_json
    FROM entity_importer_field_mapping
"#;

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FieldMappingRow> {
    Ok(FieldMappingRow {
        id: row.get(0)?,
        label: row.get(1)?,
        name: row.get(2)?,
        destination: row.get(3)?,
        importer_id: row.get(4)?,
        importer_bundle: row.get(5)?,
        processing_json: row.get(6)?,
        unique_identifier_json: row.get(7)?,
    })
}

pub struct FieldMappingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FieldMappingRepository {
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

    /// 创建或更新字段映射（按 id Upsert，保留 rowid）
    ///
    /// # 错误
    /// - ForeignKeyViolation: 所属导入配置不存在
    pub fn save(&self, mapping: &FieldMapping) -> RepositoryResult<()> {
        let processing_json = serde_json::to_string(&mapping.processing)
            .map_err(|e| RepositoryError::json("processing_json", e))?;
        let unique_identifier_json = mapping
            .unique_identifier
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::json("unique_identifier_json", e))?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO entity_importer_field_mapping (
                id,
                label,
                name,
                destination,
                importer_id,
                importer_bundle,
                processing_json,
                unique_identifier_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                label = excluded.label,
                name = excluded.name,
                destination = excluded.destination,
                importer_id = excluded.importer_id,
                importer_bundle = excluded.importer_bundle,
                processing_json = excluded.processing_json,
                unique_identifier_json = excluded.unique_identifier_json,
                updated_at = datetime('now')
            "#,
            params![
                mapping.id,
                mapping.label,
                mapping.name,
                mapping.destination,
                mapping.importer_id,
                mapping.importer_bundle,
                processing_json,
                unique_identifier_json,
            ],
        )?;

        invalidate_discovery();
        debug!(
            mapping_id = %mapping.id,
            importer_id = %mapping.importer_id,
            bundle = %mapping.importer_bundle,
            plugins = mapping.processing.plugins.len(),
            "字段映射已保存"
        );
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<FieldMapping>> {
        let row = {
            let conn = self.get_conn()?;
            let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
            conn.query_row(&sql, params![id], map_row).optional()?
        };

        row.map(FieldMappingRow::into_entity).transpose()
    }

    /// 查询导入配置下的全部字段映射（自然加载顺序）
    pub fn find_by_importer(&self, importer_id: &str) -> RepositoryResult<Vec<FieldMapping>> {
        let rows = {
            let conn = self.get_conn()?;
            let sql = format!("{} WHERE importer_id = ?1 ORDER BY rowid", SELECT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![importer_id], map_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        rows.into_iter().map(FieldMappingRow::into_entity).collect()
    }

    /// 查询导入配置 + bundle 下的字段映射（自然加载顺序）
    pub fn find_by_importer_bundle(
        &self,
        importer_id: &str,
        bundle: &str,
    ) -> RepositoryResult<Vec<FieldMapping>> {
        let rows = {
            let conn = self.get_conn()?;
            let sql = format!(
                "{} WHERE importer_id = ?1 AND importer_bundle = ?2 ORDER BY rowid",
                SELECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![importer_id, bundle], map_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        rows.into_iter().map(FieldMappingRow::into_entity).collect()
    }

    /// 删除单个字段映射
    pub fn delete(&self, id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM entity_importer_field_mapping WHERE id = ?1",
            params![id],
        )?;
        if deleted > 0 {
            invalidate_discovery();
            debug!(mapping_id = %id, "字段映射已删除");
        }
        Ok(deleted > 0)
    }
}
