// ==========================================
// 实体导入系统 - 配置层
// ==========================================
// 职责: 导入运行时配置（查找插件 ID、合并目录、合并文件前缀）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, ImportSettings};
pub use import_config_trait::ImportConfigReader;
