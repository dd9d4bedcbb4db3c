// ==========================================
// 实体导入系统 - 领域模型层
// ==========================================
// 职责: 定义导入配置、字段映射、管道定义等领域实体与类型
// 红线: 不含数据访问逻辑，不含编译逻辑
// ==========================================

pub mod field_mapping;
pub mod importer;
pub mod pipeline;
pub mod types;

// 重导出核心类型
pub use field_mapping::{
    FieldMapping, FieldMappingOptions, ProcessPluginConfig, ProcessingConfiguration,
    UniqueIdentifier,
};
pub use importer::{parse_migration_plugin_id, EntityImporter, EntityInfo, SourceInfo};
pub use pipeline::{
    DependencySpec, DestinationSpec, PipelineDefinition, ProcessEntry, ProcessSpec, ProcessStep,
    SourceSpec,
};
pub use types::{BatchAction, MigrationResult, MigrationStatus, PluginCapability};
