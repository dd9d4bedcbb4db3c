// ==========================================
// 实体导入系统 - 导入层
// ==========================================
// 职责: 迁移管道编译、依赖解析、CSV 记录流、批处理编排
// 数据流: 字段映射解析 → 管道编译 → 依赖解析 → 批处理
//         （CSV 记录流在执行期接入管道 source 阶段）
// ==========================================

// 模块声明
pub mod batch_process;
pub mod csv_merge;
pub mod csv_source;
pub mod dependency_resolver;
pub mod discovery_cache;
pub mod error;
pub mod field_mapping_resolver;
pub mod pipeline_compiler;
pub mod process_registry;
pub mod source_plugin;

// 重导出核心类型
pub use batch_process::{
    BatchFailure, BatchOperation, BatchProcess, BatchSummary, MigrationExecutor,
};
pub use csv_merge::{CsvMergeReport, CsvMerger};
pub use csv_source::{CsvRecordReader, CsvRecordSource, SourceRecord};
pub use dependency_resolver::{DependencyResolver, ImporterPipelineFactory, PipelineFactory};
pub use discovery_cache::{discovery_epoch, invalidate_discovery, PipelineCache};
pub use error::{ImportError, ImportResult};
pub use field_mapping_resolver::FieldMappingResolver;
pub use pipeline_compiler::PipelineCompiler;
pub use process_registry::{ProcessPluginDefinition, ProcessPluginRegistry};
pub use source_plugin::{CsvImportSource, ImportSource, SourcePluginManager};
