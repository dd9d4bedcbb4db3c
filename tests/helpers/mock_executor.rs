// ==========================================
// Mock 作业运行器 - 用于批处理测试
// ==========================================
// 记录调用顺序；可按管道 ID 预设结果或错误
// ==========================================
#![allow(dead_code)]

use async_trait::async_trait;
use entity_import::domain::{MigrationResult, MigrationStatus, PipelineDefinition};
use entity_import::importer::{ImportError, ImportResult, MigrationExecutor};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MockExecutor {
    results: HashMap<String, MigrationResult>,
    errors: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
    statuses: Mutex<Vec<(String, MigrationStatus)>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预设某管道的执行结果（默认 Completed）
    pub fn with_result(mut self, pipeline_id: &str, result: MigrationResult) -> Self {
        self.results.insert(pipeline_id.to_string(), result);
        self
    }

    /// 预设某管道执行时报错
    pub fn with_error(mut self, pipeline_id: &str, message: &str) -> Self {
        self.errors
            .insert(pipeline_id.to_string(), message.to_string());
        self
    }

    /// 调用记录: "{action}:{pipeline_id}"（执行顺序）
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<(String, MigrationStatus)> {
        self.statuses.lock().unwrap().clone()
    }

    fn execute(&self, action: &str, pipeline: &PipelineDefinition) -> ImportResult<MigrationResult> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", action, pipeline.id));

        if let Some(message) = self.errors.get(&pipeline.id) {
            return Err(ImportError::MissingSourceField {
                pipeline_id: pipeline.id.clone(),
                destination: message.clone(),
            });
        }
        Ok(self
            .results
            .get(&pipeline.id)
            .copied()
            .unwrap_or(MigrationResult::Completed))
    }
}

#[async_trait]
impl MigrationExecutor for MockExecutor {
    async fn import(
        &self,
        pipeline: &PipelineDefinition,
        _update: bool,
    ) -> ImportResult<MigrationResult> {
        self.execute("import", pipeline)
    }

    async fn rollback(&self, pipeline: &PipelineDefinition) -> ImportResult<MigrationResult> {
        self.execute("rollback", pipeline)
    }

    async fn set_status(
        &self,
        pipeline: &PipelineDefinition,
        status: MigrationStatus,
    ) -> ImportResult<()> {
        self.statuses
            .lock()
            .unwrap()
            .push((pipeline.id.clone(), status));
        Ok(())
    }
}
