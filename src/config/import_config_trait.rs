// ==========================================
// 实体导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;
use std::path::PathBuf;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取查找类转换插件 ID（其 migration 设置产生管道依赖）
    ///
    /// # 默认值
    /// - entity_import_migrate_lookup
    async fn get_lookup_plugin_id(&self) -> Result<String, Box<dyn Error>>;

    /// 获取 CSV 合并临时目录
    ///
    /// # 默认值
    /// - 操作系统临时目录
    async fn get_merge_directory(&self) -> Result<PathBuf, Box<dyn Error>>;

    /// 获取合并文件名前缀
    ///
    /// # 默认值
    /// - ENTITY_IMPORTER_
    async fn get_merge_file_prefix(&self) -> Result<String, Box<dyn Error>>;
}
