// ==========================================
// 实体导入系统 - 导入配置仓储
// ==========================================
// 职责: 管理 entity_importer 表
// 说明: 保存/删除导入配置都会使迁移管道发现缓存整体失效；
//       删除时字段映射与映射选项经外键级联删除
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::importer::{EntityImporter, EntityInfo, SourceInfo};
use crate::importer::discovery_cache::invalidate_discovery;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// 保存结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub is_new: bool,
    pub page_display_changed: bool, // 页面展示开关变化（外部需重建路由）
}

/// 行数据（JSON 列尚未解析）
struct ImporterRow {
    id: String,
    label: String,
    description: Option<String>,
    display_page: bool,
    source_plugin_id: String,
    source_configuration_json: String,
    entity_type: String,
    bundles_json: String,
}

impl ImporterRow {
    fn into_entity(self) -> RepositoryResult<EntityImporter> {
        let configuration = serde_json::from_str(&self.source_configuration_json)
            .map_err(|e| RepositoryError::json("source_configuration_json", e))?;
        let bundles = serde_json::from_str(&self.bundles_json)
            .map_err(|e| RepositoryError::json("bundles_json", e))?;

        Ok(EntityImporter {
            id: self.id,
            label: self.label,
            description: self.description,
            display_page: self.display_page,
            source: SourceInfo {
                plugin_id: self.source_plugin_id,
                configuration,
            },
            entity: EntityInfo {
                entity_type: self.entity_type,
                bundles,
            },
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        label,
        description,
        display_page,
        source_plugin_id,
        source_configuration_json,
        entity_type,
        bundles_json
    FROM entity_importer
"#;

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImporterRow> {
    Ok(ImporterRow {
        id: row.get(0)?,
        label: row.get(1)?,
        description: row.get(2)?,
        display_page: row.get(3)?,
        source_plugin_id: row.get(4)?,
        source_configuration_json: row.get(5)?,
        entity_type: row.get(6)?,
        bundles_json: row.get(7)?,
    })
}

pub struct EntityImporterRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EntityImporterRepository {
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

    /// 确保表存在（如果不存在则创建）
    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        init_schema(&conn)?;
        Ok(())
    }

    /// 创建或更新导入配置（Upsert 操作）
    ///
    /// 使用 ON CONFLICT DO UPDATE 而不是 REPLACE，避免触发字段映射的级联删除
    pub fn save(&self, importer: &EntityImporter) -> RepositoryResult<SaveOutcome> {
        if importer.id.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "导入配置 id 不能为空".to_string(),
            ));
        }

        let original = self.find_by_id(&importer.id)?;
        let outcome = SaveOutcome {
            is_new: original.is_none(),
            page_display_changed: importer.has_page_display_changed(original.as_ref()),
        };

        let configuration_json = serde_json::to_string(&importer.source.configuration)
            .map_err(|e| RepositoryError::json("source_configuration_json", e))?;
        let bundles_json = serde_json::to_string(&importer.entity.bundles)
            .map_err(|e| RepositoryError::json("bundles_json", e))?;

        {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                INSERT INTO entity_importer (
                    id,
                    label,
                    description,
                    display_page,
                    source_plugin_id,
                    source_configuration_json,
                    entity_type,
                    bundles_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    label = excluded.label,
                    description = excluded.description,
                    display_page = excluded.display_page,
                    source_plugin_id = excluded.source_plugin_id,
                    source_configuration_json = excluded.source_configuration_json,
                    entity_type = excluded.entity_type,
                    bundles_json = excluded.bundles_json,
                    updated_at = datetime('now')
                "#,
                params![
                    importer.id,
                    importer.label,
                    importer.description,
                    importer.display_page,
                    importer.source.plugin_id,
                    configuration_json,
                    importer.entity.entity_type,
                    bundles_json,
                ],
            )?;
        }

        invalidate_discovery();
        info!(
            importer_id = %importer.id,
            is_new = outcome.is_new,
            page_display_changed = outcome.page_display_changed,
            "导入配置已保存"
        );
        Ok(outcome)
    }

    /// 按主键查找导入配置
    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<EntityImporter>> {
        let row = {
            let conn = self.get_conn()?;
            let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
            conn.query_row(&sql, params![id], map_row).optional()?
        };

        row.map(ImporterRow::into_entity).transpose()
    }

    /// 查询全部导入配置（按 id 排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<EntityImporter>> {
        let rows = {
            let conn = self.get_conn()?;
            let sql = format!("{} ORDER BY id", SELECT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], map_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        rows.into_iter().map(ImporterRow::into_entity).collect()
    }

    /// 删除导入配置（级联删除字段映射与映射选项）
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 记录不存在
    pub fn delete(&self, id: &str) -> RepositoryResult<bool> {
        let (deleted, mapping_count) = {
            let conn = self.get_conn()?;
            let mapping_count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM entity_importer_field_mapping WHERE importer_id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            let deleted = conn.execute("DELETE FROM entity_importer WHERE id = ?1", params![id])?;
            (deleted, mapping_count)
        };

        if deleted == 0 {
            debug!(importer_id = %id, "导入配置不存在，跳过删除");
            return Ok(false);
        }

        invalidate_discovery();
        info!(
            importer_id = %id,
            cascaded_mappings = mapping_count,
            "导入配置已删除"
        );
        Ok(true)
    }
}
