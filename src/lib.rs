// ==========================================
// 实体导入系统 - 核心库
// ==========================================
// 导入配置 + 字段映射 → 迁移管道定义 → 依赖顺序 → 批处理
// CSV 源: 多文件合并 + 流式逐行读取
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 配置存储
pub mod repository;

// 导入层 - 管道编译 / 依赖解析 / CSV 记录源 / 批处理
pub mod importer;

// 配置层 - 运行时配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::{
    EntityImporter, FieldMapping, FieldMappingOptions, MigrationResult, PipelineDefinition,
};

pub use importer::{
    BatchProcess, BatchSummary, CsvRecordSource, DependencyResolver, ImportError, ImportResult,
    MigrationExecutor, PipelineCompiler,
};

pub use api::{ApiError, EntityImporterApi};

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
