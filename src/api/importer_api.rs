// ==========================================
// 实体导入系统 - 导入配置 API
// ==========================================
// 职责: 组装 存储 + 配置 + 编译器 + 依赖解析器 + 批处理，
//       对外提供管道编译、依赖列表、导入 / 回滚入口
// 错误: ImportError → ApiError（保留 kind 与 offending_id）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportSettings};
use crate::db::open_sqlite_connection;
use crate::domain::importer::EntityImporter;
use crate::domain::pipeline::PipelineDefinition;
use crate::domain::types::BatchAction;
use crate::importer::batch_process::{
    BatchOperation, BatchProcess, BatchSummary, MigrationExecutor,
};
use crate::importer::dependency_resolver::{DependencyResolver, ImporterPipelineFactory};
use crate::importer::discovery_cache::PipelineCache;
use crate::importer::error::ImportResult;
use crate::importer::pipeline_compiler::PipelineCompiler;
use crate::importer::process_registry::ProcessPluginRegistry;
use crate::importer::source_plugin::SourcePluginManager;
use crate::repository::error::RepositoryError;
use crate::repository::importer_store::ImporterStore;
use crate::repository::importer_store_impl::SqliteImporterStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

/// 单个管道的执行选项（按管道 ID 索引）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRunOptions {
    /// 重新处理已导入过的记录
    #[serde(default)]
    pub update: bool,
    /// 源配置（作为 source 覆写合并进管道定义）
    #[serde(default)]
    pub configuration: Option<Map<String, Value>>,
}

// ==========================================
// EntityImporterApi
// ==========================================
pub struct EntityImporterApi {
    store: Arc<dyn ImporterStore>,
    settings: ImportSettings,
    registry: ProcessPluginRegistry,
    cache: PipelineCache,
}

impl EntityImporterApi {
    pub fn new(store: Arc<dyn ImporterStore>, settings: ImportSettings) -> Self {
        let registry = ProcessPluginRegistry::with_defaults(&settings.lookup_plugin_id);
        Self {
            store,
            settings,
            registry,
            cache: PipelineCache::new(),
        }
    }

    /// 基于 SQLite 数据库创建（存储与 config_kv 共用同一连接）
    pub async fn from_db_path(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(RepositoryError::from)?;
        let conn = Arc::new(Mutex::new(conn));

        let store = SqliteImporterStore::from_connection(conn.clone())?;
        let settings = {
            let config = ConfigManager::from_connection(conn)
                .map_err(|e| ApiError::ConfigError(e.to_string()))?;
            ImportSettings::load(&config)
                .await
                .map_err(|e| ApiError::ConfigError(e.to_string()))?
        };

        info!(db_path = %db_path, lookup_plugin_id = %settings.lookup_plugin_id, "导入 API 已初始化");
        Ok(Self::new(Arc::new(store), settings))
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ProcessPluginRegistry {
        &self.registry
    }

    /// 可在字段映射中配置的转换插件（ID → 标签）
    pub fn import_process_options(&self) -> Vec<(String, String)> {
        self.registry.import_process_options()
    }

    /// 加载导入配置
    pub fn load_importer(&self, importer_id: &str) -> ApiResult<EntityImporter> {
        self.store
            .load_importer(importer_id)?
            .ok_or_else(|| ApiError::NotFound(format!("导入配置(id={})不存在", importer_id)))
    }

    /// 编译单个管道
    ///
    /// # 参数
    /// - bundle: 为空时取导入配置的第一个 bundle
    /// - overrides: 覆写片段；有覆写时不读写缓存
    pub fn compile_pipeline(
        &self,
        importer_id: &str,
        bundle: Option<&str>,
        overrides: Option<&Value>,
    ) -> ApiResult<PipelineDefinition> {
        let importer = self.load_importer(importer_id)?;
        let bundle = resolve_bundle(&importer, bundle)?;
        Ok(self.compile(&importer, &bundle, overrides)?)
    }

    /// 根管道及其依赖管道
    ///
    /// # 参数
    /// - ordered: true 时按执行顺序（依赖在前），false 时按发现顺序（根管道在前）
    /// - overrides: 根管道的覆写片段
    /// - dependency_config: 按依赖管道 ID 索引的源配置
    #[instrument(skip(self, overrides, dependency_config))]
    pub fn dependency_pipelines(
        &self,
        importer_id: &str,
        bundle: Option<&str>,
        ordered: bool,
        overrides: Option<&Value>,
        dependency_config: &Map<String, Value>,
    ) -> ApiResult<Vec<PipelineDefinition>> {
        let importer = self.load_importer(importer_id)?;
        let bundle = resolve_bundle(&importer, bundle)?;
        Ok(self.discover(&importer, &bundle, ordered, overrides, dependency_config)?)
    }

    /// 回滚表单的候选管道（ID → 标签，执行顺序）
    pub fn rollback_candidates(
        &self,
        importer_id: &str,
        bundle: Option<&str>,
    ) -> ApiResult<Vec<(String, String)>> {
        Ok(self
            .dependency_pipelines(importer_id, bundle, true, None, &Map::new())?
            .into_iter()
            .map(|pipeline| (pipeline.id, pipeline.label))
            .collect())
    }

    /// 执行导入批处理
    ///
    /// # 参数
    /// - options: 按管道 ID 索引的执行选项；根管道的 configuration 作为其源覆写
    ///
    /// # 返回
    /// - Ok(BatchSummary): 编译 / 依赖解析失败同样以失败汇总返回
    /// - Err(ApiError): 导入配置不存在、bundle 无法确定、存储不可用
    pub async fn run_import(
        &self,
        executor: &dyn MigrationExecutor,
        importer_id: &str,
        bundle: Option<&str>,
        options: &HashMap<String, PipelineRunOptions>,
    ) -> ApiResult<BatchSummary> {
        let importer = self.load_importer(importer_id)?;
        let bundle = resolve_bundle(&importer, bundle)?;
        let root_id = importer.migration_plugin_id(&bundle);

        let root_overrides = options
            .get(&root_id)
            .and_then(|o| o.configuration.as_ref())
            .map(|cfg| json!({ "source": cfg }));
        let dependency_config: Map<String, Value> = options
            .iter()
            .filter(|(id, _)| **id != root_id)
            .filter_map(|(id, o)| {
                o.configuration
                    .as_ref()
                    .map(|cfg| (id.clone(), Value::Object(cfg.clone())))
            })
            .collect();

        let pipelines = match self.discover(
            &importer,
            &bundle,
            true,
            root_overrides.as_ref(),
            &dependency_config,
        ) {
            Ok(pipelines) => pipelines,
            Err(err) => return Ok(BatchSummary::aborted(BatchAction::Import, &root_id, &err)),
        };

        let mut operations = Vec::new();
        let mut skipped = Vec::new();
        for pipeline in pipelines {
            let ready = match SourcePluginManager::create_source(
                &pipeline.source,
                self.store.as_ref(),
                &self.settings,
            ) {
                Ok(source) => source.has_required_configs(),
                Err(err) => {
                    return Ok(BatchSummary::aborted(BatchAction::Import, &pipeline.id, &err))
                }
            };

            if ready {
                let update = options.get(&pipeline.id).map(|o| o.update).unwrap_or(false);
                operations.push(BatchOperation { pipeline, update });
            } else {
                debug!(pipeline_id = %pipeline.id, "缺少必需源配置，跳过");
                skipped.push(pipeline.id);
            }
        }

        Ok(BatchProcess::import(operations)
            .with_skipped(skipped)
            .run(executor)
            .await)
    }

    /// 执行回滚批处理
    ///
    /// # 参数
    /// - selected: 只回滚选中的管道；为空时回滚全部依赖管道
    pub async fn run_rollback(
        &self,
        executor: &dyn MigrationExecutor,
        importer_id: &str,
        bundle: Option<&str>,
        selected: Option<&[String]>,
    ) -> ApiResult<BatchSummary> {
        let importer = self.load_importer(importer_id)?;
        let bundle = resolve_bundle(&importer, bundle)?;
        let root_id = importer.migration_plugin_id(&bundle);

        let pipelines = match self.discover(&importer, &bundle, true, None, &Map::new()) {
            Ok(pipelines) => pipelines,
            Err(err) => return Ok(BatchSummary::aborted(BatchAction::Rollback, &root_id, &err)),
        };

        let pipelines = match selected {
            Some(ids) => pipelines
                .into_iter()
                .filter(|p| ids.iter().any(|id| *id == p.id))
                .collect(),
            None => pipelines,
        };

        Ok(BatchProcess::rollback(pipelines).run(executor).await)
    }

    // 无覆写时走发现缓存
    fn compile(
        &self,
        importer: &EntityImporter,
        bundle: &str,
        overrides: Option<&Value>,
    ) -> ImportResult<PipelineDefinition> {
        let compiler = PipelineCompiler::new(self.store.as_ref(), &self.registry, &self.settings);
        match overrides {
            Some(fragment) => compiler.compile(importer, bundle, Some(fragment)),
            None => self
                .cache
                .get_or_compile(&importer.id, bundle, || compiler.compile(importer, bundle, None)),
        }
    }

    fn discover(
        &self,
        importer: &EntityImporter,
        bundle: &str,
        ordered: bool,
        overrides: Option<&Value>,
        dependency_config: &Map<String, Value>,
    ) -> ImportResult<Vec<PipelineDefinition>> {
        let root = self.compile(importer, bundle, overrides)?;

        let compiler = PipelineCompiler::new(self.store.as_ref(), &self.registry, &self.settings);
        let factory = ImporterPipelineFactory::new(&compiler);
        let resolver = DependencyResolver::new(&factory);

        if ordered {
            resolver.resolve(root, dependency_config)
        } else {
            resolver.resolve_chain(root, dependency_config)
        }
    }
}

fn resolve_bundle(importer: &EntityImporter, bundle: Option<&str>) -> ApiResult<String> {
    match bundle {
        Some(bundle) => Ok(bundle.to_string()),
        None => importer.first_bundle().map(str::to_string).ok_or_else(|| {
            ApiError::InvalidInput(format!("导入配置 {} 未定义任何 bundle", importer.id))
        }),
    }
}
