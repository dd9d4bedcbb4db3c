// ==========================================
// 实体导入系统 - 领域类型定义
// ==========================================
// 职责: 批处理动作 / 迁移状态 / 迁移结果 / 插件能力 枚举
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 批处理动作 (Batch Action)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchAction {
    Import,   // 导入
    Rollback, // 回滚
}

impl fmt::Display for BatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchAction::Import => write!(f, "import"),
            BatchAction::Rollback => write!(f, "rollback"),
        }
    }
}

// ==========================================
// 迁移状态 (Migration Status)
// ==========================================
// 执行前由批处理统一重置为 Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationStatus {
    Idle,
    Importing,
    RollingBack,
    Stopping,
    Disabled,
}

impl MigrationStatus {
    /// 面向操作员的状态标签
    pub fn label(&self) -> &'static str {
        match self {
            MigrationStatus::Idle => "Idle",
            MigrationStatus::Importing => "Importing",
            MigrationStatus::RollingBack => "Rolling back",
            MigrationStatus::Stopping => "Stopping",
            MigrationStatus::Disabled => "Disabled",
        }
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ==========================================
// 迁移结果 (Migration Result)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationResult {
    Completed,  // 全部记录处理完毕
    Incomplete, // 分段执行，尚有剩余记录
    Stopped,    // 被外部停止
    Failed,     // 执行失败
    Skipped,    // 缺少必需源配置，未执行
}

impl MigrationResult {
    /// 是否视为批处理失败
    pub fn is_failure(&self) -> bool {
        matches!(self, MigrationResult::Failed | MigrationResult::Stopped)
    }
}

impl fmt::Display for MigrationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationResult::Completed => write!(f, "COMPLETED"),
            MigrationResult::Incomplete => write!(f, "INCOMPLETE"),
            MigrationResult::Stopped => write!(f, "STOPPED"),
            MigrationResult::Failed => write!(f, "FAILED"),
            MigrationResult::Skipped => write!(f, "SKIPPED"),
        }
    }
}

// ==========================================
// 转换插件能力标签 (Plugin Capability)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginCapability {
    BuildsImportForm, // 可在字段映射中配置（出现在导入选项中）
    PlainTransform,   // 普通值转换
    Lookup,           // 查找其他管道产出的实体（产生管道依赖）
}

impl fmt::Display for PluginCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginCapability::BuildsImportForm => write!(f, "BUILDS_IMPORT_FORM"),
            PluginCapability::PlainTransform => write!(f, "PLAIN_TRANSFORM"),
            PluginCapability::Lookup => write!(f, "LOOKUP"),
        }
    }
}
