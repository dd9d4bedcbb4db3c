// ==========================================
// 实体导入系统 - 管道发现缓存
// ==========================================
// 职责: 进程级发现纪元 + 已编译管道缓存
// 失效: 导入配置、字段映射、映射选项任一保存/删除即推进纪元，整体失效（不做单条失效）
// ==========================================

use crate::domain::pipeline::PipelineDefinition;
use crate::importer::error::ImportResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

static DISCOVERY_EPOCH: AtomicU64 = AtomicU64::new(0);

/// 当前发现纪元
pub fn discovery_epoch() -> u64 {
    DISCOVERY_EPOCH.load(Ordering::SeqCst)
}

/// 使发现缓存整体失效
pub fn invalidate_discovery() -> u64 {
    let epoch = DISCOVERY_EPOCH.fetch_add(1, Ordering::SeqCst) + 1;
    debug!(epoch, "管道发现缓存已失效");
    epoch
}

type CacheKey = (String, String, u64);

// ==========================================
// PipelineCache - (importer_id, bundle, epoch) → 管道定义
// ==========================================
// 只缓存无覆写片段的编译结果
#[derive(Debug, Default)]
pub struct PipelineCache {
    entries: Mutex<HashMap<CacheKey, PipelineDefinition>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取当前纪元的缓存，未命中时编译并写入
    ///
    /// 纪元变化后旧条目不再命中，写入时一并清理
    pub fn get_or_compile<F>(
        &self,
        importer_id: &str,
        bundle: &str,
        compile: F,
    ) -> ImportResult<PipelineDefinition>
    where
        F: FnOnce() -> ImportResult<PipelineDefinition>,
    {
        self.get_or_compile_at(discovery_epoch(), importer_id, bundle, compile)
    }

    /// 以指定纪元读取/写入缓存
    pub fn get_or_compile_at<F>(
        &self,
        epoch: u64,
        importer_id: &str,
        bundle: &str,
        compile: F,
    ) -> ImportResult<PipelineDefinition>
    where
        F: FnOnce() -> ImportResult<PipelineDefinition>,
    {
        let key: CacheKey = (importer_id.to_string(), bundle.to_string(), epoch);

        if let Some(hit) = self.lock().get(&key) {
            return Ok(hit.clone());
        }

        let definition = compile()?;
        let mut entries = self.lock();
        entries.retain(|(_, _, cached_epoch), _| *cached_epoch == epoch);
        entries.insert(key, definition.clone());
        Ok(definition)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // 缓存内容可重建，锁中毒时沿用内部数据
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, PipelineDefinition>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
