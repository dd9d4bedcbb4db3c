// ==========================================
// 实体导入系统 - API 层
// ==========================================
// 职责: 对外业务入口（管道编译、依赖列表、导入 / 回滚批处理）
// ==========================================

pub mod error;
pub mod importer_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use importer_api::{EntityImporterApi, PipelineRunOptions};
