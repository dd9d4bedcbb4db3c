// ==========================================
// 实体导入系统 - 迁移管道编译器
// ==========================================
// 职责: 导入配置 + bundle + 字段映射 → 迁移管道定义
// 流程: source → process → destination → migration_dependencies → 覆写合并
// 规则: 字段映射按存储自然顺序归约，目标路径冲突时后者覆盖前者；
//       依赖列表只保留最后一个查找映射的配置（覆盖而非累加）
// ==========================================

use crate::config::ImportSettings;
use crate::domain::field_mapping::{FieldMapping, ProcessPluginConfig};
use crate::domain::importer::EntityImporter;
use crate::domain::pipeline::{
    DependencySpec, DestinationSpec, PipelineDefinition, ProcessEntry, ProcessSpec, ProcessStep,
    SourceSpec,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapping_resolver::FieldMappingResolver;
use crate::importer::process_registry::ProcessPluginRegistry;
use crate::repository::importer_store::ImporterStore;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

/// 查找插件中指向依赖管道的设置键
pub const LOOKUP_MIGRATION_SETTING: &str = "migration";

// 源定义 / 转换步骤中由编译器固定写入的键
const SOURCE_RESERVED_KEYS: [&str; 2] = ["plugin", "importer_id"];
const STEP_RESERVED_KEYS: [&str; 2] = ["plugin", "source"];

// ==========================================
// PipelineCompiler
// ==========================================
pub struct PipelineCompiler<'a> {
    store: &'a dyn ImporterStore,
    registry: &'a ProcessPluginRegistry,
    lookup_plugin_id: String,
}

impl<'a> PipelineCompiler<'a> {
    pub fn new(
        store: &'a dyn ImporterStore,
        registry: &'a ProcessPluginRegistry,
        settings: &ImportSettings,
    ) -> Self {
        Self {
            store,
            registry,
            lookup_plugin_id: settings.lookup_plugin_id.clone(),
        }
    }

    pub fn store(&self) -> &'a dyn ImporterStore {
        self.store
    }

    /// 编译迁移管道定义
    ///
    /// # 参数
    /// - importer: 已加载的导入配置
    /// - bundle: 必须属于导入配置允许的 bundle
    /// - overrides: 深度合并到结果上的定义片段（数组拼接）
    ///
    /// # 错误
    /// - InvalidBundle: bundle 不在允许列表中
    /// - Repository: 存储读取失败（原样透传）
    /// - ConfigurationInconsistency: 覆写片段合并后无法构成合法定义
    #[instrument(skip(self, importer, overrides), fields(importer_id = %importer.id))]
    pub fn compile(
        &self,
        importer: &EntityImporter,
        bundle: &str,
        overrides: Option<&Value>,
    ) -> ImportResult<PipelineDefinition> {
        if !importer.has_bundle(bundle) {
            return Err(ImportError::InvalidBundle {
                importer_id: importer.id.clone(),
                bundle: bundle.to_string(),
            });
        }

        let mappings = FieldMappingResolver::new(self.store).mappings_for_bundle(importer, bundle)?;
        let pipeline_id = importer.migration_plugin_id(bundle);

        let definition = PipelineDefinition {
            id: pipeline_id.clone(),
            label: importer.migration_label(bundle),
            source: build_source_spec(importer),
            process: self.build_process_spec(&mappings),
            destination: DestinationSpec::for_entity(importer.entity_type(), bundle),
            dependencies: self.build_dependency_spec(&mappings),
            extra: Map::new(),
        };

        let definition = match overrides {
            Some(fragment) => definition.merge_overrides(fragment).map_err(|e| {
                ImportError::inconsistency(&pipeline_id, format!("覆写片段无法合并: {}", e))
            })?,
            None => definition,
        };

        debug!(
            pipeline_id = %definition.id,
            process_entries = definition.process.len(),
            optional_dependencies = definition.dependencies.optional.len(),
            "迁移管道已编译"
        );
        Ok(definition)
    }

    /// 构建 process 定义（后写覆盖）
    fn build_process_spec(&self, mappings: &[FieldMapping]) -> ProcessSpec {
        let mut process = ProcessSpec::new();

        for mapping in mappings {
            let entry = if mapping.processing.is_empty() {
                ProcessEntry::Field(mapping.source_field().to_string())
            } else {
                let steps = mapping
                    .processing
                    .plugins
                    .iter()
                    .enumerate()
                    .map(|(index, plugin)| {
                        self.warn_if_unregistered(mapping, plugin);
                        ProcessStep {
                            plugin: plugin.plugin_id.clone(),
                            settings: filter_step_settings(&plugin.settings),
                            source: (index == 0).then(|| mapping.source_field().to_string()),
                        }
                    })
                    .collect();
                ProcessEntry::Chain(steps)
            };

            if process.insert(mapping.destination.clone(), entry).is_some() {
                debug!(
                    destination = %mapping.destination,
                    mapping_id = %mapping.id,
                    "目标路径重复，后出现的字段映射覆盖前者"
                );
            }
        }

        process
    }

    /// 构建依赖定义（最后一个查找映射生效）
    fn build_dependency_spec(&self, mappings: &[FieldMapping]) -> DependencySpec {
        let optional = mappings
            .iter()
            .filter_map(|m| m.processing.plugin(&self.lookup_plugin_id))
            .map(|lookup| lookup_dependencies(&lookup.settings))
            .last()
            .unwrap_or_default();

        DependencySpec {
            optional,
            required: Vec::new(),
        }
    }

    fn warn_if_unregistered(&self, mapping: &FieldMapping, plugin: &ProcessPluginConfig) {
        if !self.registry.contains(&plugin.plugin_id) {
            warn!(
                plugin_id = %plugin.plugin_id,
                mapping_id = %mapping.id,
                "转换插件未注册，按原样输出"
            );
        }
    }
}

/// 构建源定义（固定键覆盖源配置中的同名键）
fn build_source_spec(importer: &EntityImporter) -> SourceSpec {
    let configuration = importer
        .source_configuration()
        .iter()
        .filter(|(key, _)| !SOURCE_RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    SourceSpec {
        plugin: importer.source_plugin_id().to_string(),
        importer_id: importer.id.clone(),
        configuration,
    }
}

/// 查找插件设置中的依赖管道 ID（单个字符串或字符串数组）
fn lookup_dependencies(settings: &Map<String, Value>) -> Vec<String> {
    match settings.get(LOOKUP_MIGRATION_SETTING) {
        Some(Value::String(id)) if !id.is_empty() => vec![id.clone()],
        Some(Value::Array(ids)) => ids
            .iter()
            .filter_map(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn filter_step_settings(settings: &Map<String, Value>) -> Map<String, Value> {
    filter_empty_settings(settings)
        .into_iter()
        .filter(|(key, _)| !STEP_RESERVED_KEYS.contains(&key.as_str()))
        .collect()
}

/// 过滤空设置项（null / false / 0 / "" / "0" / [] / {}），保持原有顺序
pub fn filter_empty_settings(settings: &Map<String, Value>) -> Map<String, Value> {
    settings
        .iter()
        .filter(|(_, value)| !is_empty_setting(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn is_empty_setting(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
