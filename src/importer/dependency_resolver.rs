// ==========================================
// 实体导入系统 - 管道依赖解析器
// ==========================================
// 职责: 沿 migration_dependencies.optional 逐级实例化依赖管道，
//       输出"依赖在前、被依赖者在后"的执行顺序
// 限制: 每个管道只跟随第一个可选依赖（线性链，不是 DAG 拓扑排序）
// 环路: 依赖链中重复出现的管道 ID 视为配置错误
// ==========================================

use crate::domain::importer::parse_migration_plugin_id;
use crate::domain::pipeline::PipelineDefinition;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::pipeline_compiler::PipelineCompiler;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

// ==========================================
// PipelineFactory Trait
// ==========================================
// 用途: 按管道 ID 实例化依赖管道
// 实现者: ImporterPipelineFactory（基于导入配置编译）
pub trait PipelineFactory {
    /// 实例化管道
    ///
    /// # 参数
    /// - pipeline_id: 管道 ID
    /// - configuration: 调用方按 ID 传入的源配置（可选）
    ///
    /// # 错误
    /// - ConfigurationInconsistency: 管道无法实例化
    fn create_pipeline(
        &self,
        pipeline_id: &str,
        configuration: Option<&Value>,
    ) -> ImportResult<PipelineDefinition>;
}

// ==========================================
// ImporterPipelineFactory
// ==========================================
pub struct ImporterPipelineFactory<'a> {
    compiler: &'a PipelineCompiler<'a>,
}

impl<'a> ImporterPipelineFactory<'a> {
    pub fn new(compiler: &'a PipelineCompiler<'a>) -> Self {
        Self { compiler }
    }
}

impl PipelineFactory for ImporterPipelineFactory<'_> {
    fn create_pipeline(
        &self,
        pipeline_id: &str,
        configuration: Option<&Value>,
    ) -> ImportResult<PipelineDefinition> {
        let (importer_id, bundle) = parse_migration_plugin_id(pipeline_id)
            .ok_or_else(|| ImportError::inconsistency(pipeline_id, "不是导入管道 ID"))?;

        let importer = self
            .compiler
            .store()
            .load_importer(importer_id)?
            .ok_or_else(|| {
                ImportError::inconsistency(pipeline_id, format!("导入配置不存在: {}", importer_id))
            })?;

        // 调用方配置作为依赖管道的源配置覆写
        let overrides = configuration.map(|cfg| json!({ "source": cfg }));

        match self.compiler.compile(&importer, bundle, overrides.as_ref()) {
            Err(ImportError::InvalidBundle { bundle, .. }) => Err(ImportError::inconsistency(
                pipeline_id,
                format!("bundle 不属于导入配置: {}", bundle),
            )),
            other => other,
        }
    }
}

// ==========================================
// DependencyResolver
// ==========================================
pub struct DependencyResolver<'a> {
    factory: &'a dyn PipelineFactory,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(factory: &'a dyn PipelineFactory) -> Self {
        Self { factory }
    }

    /// 解析依赖链（依赖在前）
    ///
    /// # 参数
    /// - root: 已编译的根管道
    /// - configuration: 按依赖管道 ID 索引的源配置
    ///
    /// # 返回
    /// - 无依赖时: [root]
    /// - A → B → C 时: [C, B, A]
    pub fn resolve(
        &self,
        root: PipelineDefinition,
        configuration: &Map<String, Value>,
    ) -> ImportResult<Vec<PipelineDefinition>> {
        let mut chain = self.resolve_chain(root, configuration)?;
        chain.reverse();
        Ok(chain)
    }

    /// 解析依赖链（根管道在前，发现顺序）
    #[instrument(skip(self, root, configuration), fields(root = %root.id))]
    pub fn resolve_chain(
        &self,
        root: PipelineDefinition,
        configuration: &Map<String, Value>,
    ) -> ImportResult<Vec<PipelineDefinition>> {
        let mut chain: Vec<PipelineDefinition> = Vec::new();
        let mut current = root;

        loop {
            let dependencies = current.optional_dependencies();
            let next_id = dependencies.first().cloned();
            if dependencies.len() > 1 {
                warn!(
                    pipeline_id = %current.id,
                    followed = ?next_id,
                    ignored = ?&dependencies[1..],
                    "存在多个可选依赖，仅跟随第一个"
                );
            }
            chain.push(current);

            let Some(next_id) = next_id else {
                break;
            };
            if chain.iter().any(|p| p.id == next_id) {
                return Err(ImportError::inconsistency(
                    next_id,
                    "管道依赖成环".to_string(),
                ));
            }

            current = self
                .factory
                .create_pipeline(&next_id, configuration.get(&next_id))?;
            debug!(pipeline_id = %current.id, depth = chain.len(), "依赖管道已实例化");
        }

        Ok(chain)
    }
}
