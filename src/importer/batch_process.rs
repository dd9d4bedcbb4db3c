// ==========================================
// 实体导入系统 - 批处理编排
// ==========================================
// 职责: 按依赖顺序逐个执行管道（导入 / 回滚），汇总结果
// 规则:
// - 执行前统一将管道状态重置为 Idle
// - 首个失败即停止，后续管道不再执行
// - 回滚按执行顺序的逆序进行（被依赖者最后回滚）
// 实际的逐记录执行由外部作业运行器（MigrationExecutor）负责
// ==========================================

use crate::domain::pipeline::PipelineDefinition;
use crate::domain::types::{BatchAction, MigrationResult, MigrationStatus};
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

// ==========================================
// MigrationExecutor Trait
// ==========================================
// 用途: 外部作业运行器边界
#[async_trait]
pub trait MigrationExecutor: Send + Sync {
    /// 执行导入
    ///
    /// # 参数
    /// - update: 是否重新处理已导入过的记录
    async fn import(&self, pipeline: &PipelineDefinition, update: bool)
        -> ImportResult<MigrationResult>;

    /// 执行回滚
    async fn rollback(&self, pipeline: &PipelineDefinition) -> ImportResult<MigrationResult>;

    /// 设置管道状态（默认无操作）
    async fn set_status(
        &self,
        _pipeline: &PipelineDefinition,
        _status: MigrationStatus,
    ) -> ImportResult<()> {
        Ok(())
    }
}

/// 单个批处理操作
#[derive(Debug, Clone)]
pub struct BatchOperation {
    pub pipeline: PipelineDefinition,
    pub update: bool,
}

/// 失败信息（错误类别 + 出错对象）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub pipeline_id: String,
    pub kind: String,
    pub offending_id: String,
    pub message: String,
}

/// 批处理汇总
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub action: BatchAction,
    pub success: bool,
    pub results: Vec<(String, MigrationResult)>, // 管道 ID → 结果（执行顺序）
    pub skipped: Vec<String>,                    // 缺少必需源配置而跳过的管道
    pub failure: Option<BatchFailure>,
    pub message: String,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: i64,
}

impl BatchFailure {
    fn from_error(pipeline_id: &str, err: &ImportError) -> Self {
        Self {
            pipeline_id: pipeline_id.to_string(),
            kind: err.kind().to_string(),
            offending_id: err.offending_id().unwrap_or(pipeline_id).to_string(),
            message: err.to_string(),
        }
    }
}

impl BatchSummary {
    /// 管道准备阶段（编译/依赖解析）失败时的汇总，不执行任何管道
    pub fn aborted(action: BatchAction, pipeline_id: &str, err: &ImportError) -> Self {
        error!(
            pipeline_id = %pipeline_id,
            kind = err.kind(),
            error = %err,
            "管道准备失败，批处理未执行"
        );
        Self {
            action,
            success: false,
            results: Vec::new(),
            skipped: Vec::new(),
            failure: Some(BatchFailure::from_error(pipeline_id, err)),
            message: finished_message(action, false, 0),
            finished_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    pub fn result_of(&self, pipeline_id: &str) -> Option<MigrationResult> {
        self.results
            .iter()
            .find(|(id, _)| id == pipeline_id)
            .map(|(_, result)| *result)
    }

    pub fn executed_count(&self) -> usize {
        self.results.len()
    }
}

/// 汇总消息
pub fn finished_message(action: BatchAction, success: bool, count: usize) -> String {
    if success {
        format!(
            "The system successfully executed {} for {} migrations.",
            action, count
        )
    } else {
        format!("The system experienced a problem when executing {}.", action)
    }
}

// ==========================================
// BatchProcess
// ==========================================
pub struct BatchProcess {
    action: BatchAction,
    operations: Vec<BatchOperation>,
    skipped: Vec<String>,
}

impl BatchProcess {
    /// 导入批处理（operations 为执行顺序，依赖在前）
    pub fn import(operations: Vec<BatchOperation>) -> Self {
        Self {
            action: BatchAction::Import,
            operations,
            skipped: Vec::new(),
        }
    }

    /// 回滚批处理（pipelines 为执行顺序，内部逆序回滚）
    pub fn rollback(pipelines: Vec<PipelineDefinition>) -> Self {
        let operations = pipelines
            .into_iter()
            .rev()
            .map(|pipeline| BatchOperation {
                pipeline,
                update: false,
            })
            .collect();

        Self {
            action: BatchAction::Rollback,
            operations,
            skipped: Vec::new(),
        }
    }

    /// 记录被跳过的管道（不计入执行数）
    pub fn with_skipped(mut self, skipped: Vec<String>) -> Self {
        self.skipped = skipped;
        self
    }

    pub fn action(&self) -> BatchAction {
        self.action
    }

    /// 实际执行顺序
    pub fn pipeline_ids(&self) -> Vec<&str> {
        self.operations
            .iter()
            .map(|op| op.pipeline.id.as_str())
            .collect()
    }

    /// 顺序执行全部操作
    #[instrument(skip(self, executor), fields(action = %self.action, operations = self.operations.len()))]
    pub async fn run(self, executor: &dyn MigrationExecutor) -> BatchSummary {
        let action = self.action;
        let started_at = Utc::now();
        let mut results: Vec<(String, MigrationResult)> = Vec::new();
        let mut failure: Option<BatchFailure> = None;

        for operation in &self.operations {
            let pipeline = &operation.pipeline;
            info!(
                pipeline_id = %pipeline.id,
                label = %pipeline.label,
                status = %MigrationStatus::Idle,
                "{}",
                match action {
                    BatchAction::Import => "Running migration",
                    BatchAction::Rollback => "Rolling back migration",
                }
            );

            let outcome = match executor.set_status(pipeline, MigrationStatus::Idle).await {
                Err(err) => Err(err),
                Ok(()) => match action {
                    BatchAction::Import => executor.import(pipeline, operation.update).await,
                    BatchAction::Rollback => executor.rollback(pipeline).await,
                },
            };

            match outcome {
                Ok(result) => {
                    results.push((pipeline.id.clone(), result));
                    if result.is_failure() {
                        warn!(pipeline_id = %pipeline.id, result = %result, "管道执行未成功，批处理停止");
                        failure = Some(BatchFailure {
                            pipeline_id: pipeline.id.clone(),
                            kind: format!("migration_{}", result.to_string().to_lowercase()),
                            offending_id: pipeline.id.clone(),
                            message: format!("{} {}", action, result),
                        });
                        break;
                    }
                }
                Err(err) => {
                    error!(
                        pipeline_id = %pipeline.id,
                        kind = err.kind(),
                        error = %err,
                        "管道执行失败，批处理停止"
                    );
                    results.push((pipeline.id.clone(), MigrationResult::Failed));
                    failure = Some(BatchFailure::from_error(&pipeline.id, &err));
                    break;
                }
            }
        }

        let success = failure.is_none();
        let message = finished_message(action, success, results.len());
        let finished_at = Utc::now();
        let elapsed_ms = (finished_at - started_at).num_milliseconds();
        info!(success, executed = results.len(), elapsed_ms, "{}", message);

        BatchSummary {
            action,
            success,
            results,
            skipped: self.skipped,
            failure,
            message,
            finished_at,
            elapsed_ms,
        }
    }
}
