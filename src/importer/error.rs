// ==========================================
// 实体导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 每个错误提供 kind()（稳定机器名）与 offending_id()，
//       供批处理层组装单条汇总消息
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 编译错误 =====
    #[error("bundle 不属于导入配置 (importer={importer_id}, bundle={bundle})")]
    InvalidBundle { importer_id: String, bundle: String },

    #[error("导入配置不存在: {0}")]
    ImporterNotFound(String),

    #[error("管道配置不一致 (id={id}): {message}")]
    ConfigurationInconsistency { id: String, message: String },

    // ===== 执行期错误（由作业运行器检出）=====
    #[error("目标属性缺少可解析的源数据 (pipeline={pipeline_id}, destination={destination})")]
    MissingSourceField {
        pipeline_id: String,
        destination: String,
    },

    // ===== 文件相关错误 =====
    #[error("文件不可读: {path}: {message}")]
    FileUnreadable { path: String, message: String },

    #[error("文件不可写: {path}: {message}")]
    FileUnwritable { path: String, message: String },

    #[error("CSV 解析失败 (行 {line}): {message}")]
    CsvParseError { line: u64, message: String },

    // ===== 存储错误（原样透传）=====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    pub fn unreadable(path: impl AsRef<std::path::Path>, err: impl std::fmt::Display) -> Self {
        ImportError::FileUnreadable {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn unwritable(path: impl AsRef<std::path::Path>, err: impl std::fmt::Display) -> Self {
        ImportError::FileUnwritable {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn inconsistency(id: impl Into<String>, message: impl Into<String>) -> Self {
        ImportError::ConfigurationInconsistency {
            id: id.into(),
            message: message.into(),
        }
    }

    /// 错误类别（稳定机器名）
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::InvalidBundle { .. } => "invalid_bundle",
            ImportError::ImporterNotFound(_) => "importer_not_found",
            ImportError::ConfigurationInconsistency { .. } => "configuration_inconsistency",
            ImportError::MissingSourceField { .. } => "missing_source_field",
            ImportError::FileUnreadable { .. } => "file_unreadable",
            ImportError::FileUnwritable { .. } => "file_unwritable",
            ImportError::CsvParseError { .. } => "csv_parse_error",
            ImportError::Repository(_) => "repository",
            ImportError::InternalError(_) => "internal",
            ImportError::Other(_) => "other",
        }
    }

    /// 出错对象的标识（bundle / 管道 ID / 文件路径）
    pub fn offending_id(&self) -> Option<&str> {
        match self {
            ImportError::InvalidBundle { bundle, .. } => Some(bundle),
            ImportError::ImporterNotFound(id) => Some(id),
            ImportError::ConfigurationInconsistency { id, .. } => Some(id),
            ImportError::MissingSourceField { pipeline_id, .. } => Some(pipeline_id),
            ImportError::FileUnreadable { path, .. } | ImportError::FileUnwritable { path, .. } => {
                Some(path)
            }
            ImportError::Repository(RepositoryError::NotFound { id, .. }) => Some(id),
            _ => None,
        }
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        ImportError::CsvParseError {
            line,
            message: err.to_string(),
        }
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_offending_id() {
        let err = ImportError::InvalidBundle {
            importer_id: "p1".to_string(),
            bundle: "blog".to_string(),
        };
        assert_eq!(err.kind(), "invalid_bundle");
        assert_eq!(err.offending_id(), Some("blog"));

        let err = ImportError::inconsistency("entity_import:p2:page", "导入配置不存在");
        assert_eq!(err.kind(), "configuration_inconsistency");
        assert_eq!(err.offending_id(), Some("entity_import:p2:page"));
    }

    #[test]
    fn test_repository_error_passes_through() {
        let err: ImportError = RepositoryError::LockError("poisoned".to_string()).into();
        assert_eq!(err.kind(), "repository");
        assert_eq!(err.to_string(), "数据库锁获取失败: poisoned");
        assert_eq!(err.offending_id(), None);
    }
}
