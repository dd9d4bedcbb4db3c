// ==========================================
// 实体导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 导入配置 / 字段映射 / 映射选项的持久化，屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod field_mapping_option_repo;
pub mod field_mapping_repo;
pub mod importer_repo;
pub mod importer_store;
pub mod importer_store_impl;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use field_mapping_option_repo::FieldMappingOptionRepository;
pub use field_mapping_repo::FieldMappingRepository;
pub use importer_repo::{EntityImporterRepository, SaveOutcome};
pub use importer_store::ImporterStore;
pub use importer_store_impl::SqliteImporterStore;
