// ==========================================
// 实体导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::{init_schema, open_sqlite_connection};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// 查找插件默认 ID
pub const DEFAULT_LOOKUP_PLUGIN_ID: &str = "entity_import_migrate_lookup";

/// 合并文件默认前缀
pub const DEFAULT_MERGE_FILE_PREFIX: &str = "ENTITY_IMPORTER_";

// ==========================================
// ImportSettings - 导入配置快照
// ==========================================
// 核心组件只依赖该快照，不直接访问数据库
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    pub lookup_plugin_id: String,
    pub merge_directory: PathBuf,
    pub merge_file_prefix: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            lookup_plugin_id: DEFAULT_LOOKUP_PLUGIN_ID.to_string(),
            merge_directory: std::env::temp_dir(),
            merge_file_prefix: DEFAULT_MERGE_FILE_PREFIX.to_string(),
        }
    }
}

impl ImportSettings {
    /// 从配置读取器加载快照
    pub async fn load(reader: &dyn ImportConfigReader) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            lookup_plugin_id: reader.get_lookup_plugin_id().await?,
            merge_directory: reader.get_merge_directory().await?,
            merge_file_prefix: reader.get_merge_file_prefix().await?,
        })
    }

    pub fn with_merge_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.merge_directory = dir.into();
        self
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            init_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（Upsert）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取配置值，缺失或为空白时返回默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        match self.get_config_value(key)? {
            Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
            Some(_) => {
                warn!(config_key = key, default, "配置值为空，使用默认值");
                Ok(default.to_string())
            }
            None => Ok(default.to_string()),
        }
    }
}

// ==========================================
// ImportConfigReader 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_lookup_plugin_id(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default(config_keys::LOOKUP_PLUGIN_ID, DEFAULT_LOOKUP_PLUGIN_ID)
    }

    async fn get_merge_directory(&self) -> Result<PathBuf, Box<dyn Error>> {
        match self.get_config_value(config_keys::MERGE_DIRECTORY)? {
            Some(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir.trim())),
            _ => Ok(std::env::temp_dir()),
        }
    }

    async fn get_merge_file_prefix(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default(config_keys::MERGE_FILE_PREFIX, DEFAULT_MERGE_FILE_PREFIX)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const LOOKUP_PLUGIN_ID: &str = "entity_import.lookup_plugin_id";
    pub const MERGE_DIRECTORY: &str = "entity_import.merge_directory";
    pub const MERGE_FILE_PREFIX: &str = "entity_import.merge_file_prefix";
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn manager() -> (NamedTempFile, ConfigManager) {
        let file = NamedTempFile::new().unwrap();
        let manager = ConfigManager::new(file.path().to_str().unwrap()).unwrap();
        (file, manager)
    }

    #[tokio::test]
    async fn test_defaults_when_config_kv_empty() {
        let (_file, manager) = manager();
        let settings = ImportSettings::load(&manager).await.unwrap();

        assert_eq!(settings, ImportSettings::default());
    }

    #[tokio::test]
    async fn test_overrides_from_config_kv() {
        let (_file, manager) = manager();
        manager
            .set_global_config_value(config_keys::LOOKUP_PLUGIN_ID, "custom_lookup")
            .unwrap();
        manager
            .set_global_config_value(config_keys::MERGE_DIRECTORY, "/var/tmp/imports")
            .unwrap();
        // 空白值回退默认
        manager
            .set_global_config_value(config_keys::MERGE_FILE_PREFIX, "  ")
            .unwrap();

        let settings = ImportSettings::load(&manager).await.unwrap();
        assert_eq!(settings.lookup_plugin_id, "custom_lookup");
        assert_eq!(settings.merge_directory, PathBuf::from("/var/tmp/imports"));
        assert_eq!(settings.merge_file_prefix, DEFAULT_MERGE_FILE_PREFIX);
    }
}
