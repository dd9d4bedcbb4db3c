// ==========================================
// 实体导入系统 - 转换插件注册表
// ==========================================
// 职责: 以显式能力标签登记转换插件（id → 标签 + 能力集合）
// 说明: 编译器只输出插件 ID，不执行插件；注册表供编译期校验
//       与字段映射表单选项使用
// ==========================================

use crate::domain::types::PluginCapability;
use std::collections::{BTreeMap, BTreeSet};

/// 转换插件登记信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessPluginDefinition {
    pub id: String,
    pub label: String,
    pub capabilities: BTreeSet<PluginCapability>,
}

impl ProcessPluginDefinition {
    pub fn has_capability(&self, capability: PluginCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

// ==========================================
// ProcessPluginRegistry
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ProcessPluginRegistry {
    plugins: BTreeMap<String, ProcessPluginDefinition>,
}

impl ProcessPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 默认注册表：查找插件 + 常用值转换插件
    ///
    /// # 参数
    /// - lookup_plugin_id: 查找插件 ID（来自配置）
    pub fn with_defaults(lookup_plugin_id: &str) -> Self {
        use PluginCapability::{BuildsImportForm, Lookup, PlainTransform};

        let mut registry = Self::new();
        registry.register(lookup_plugin_id, "Migrate lookup", &[BuildsImportForm, Lookup]);
        registry.register("entity_import_default_value", "Default value", &[BuildsImportForm, PlainTransform]);
        registry.register("entity_import_explode", "Explode", &[BuildsImportForm, PlainTransform]);
        registry.register("entity_import_callback", "Callback", &[BuildsImportForm, PlainTransform]);
        registry.register("entity_import_format_date", "Format date", &[BuildsImportForm, PlainTransform]);
        registry.register("get", "Get", &[PlainTransform]);
        registry.register("skip_on_empty", "Skip on empty", &[PlainTransform]);
        registry.register("static_map", "Static map", &[PlainTransform]);
        registry
    }

    /// 登记插件（同 ID 重复登记时覆盖）
    pub fn register(&mut self, id: &str, label: &str, capabilities: &[PluginCapability]) {
        self.plugins.insert(
            id.to_string(),
            ProcessPluginDefinition {
                id: id.to_string(),
                label: label.to_string(),
                capabilities: capabilities.iter().copied().collect(),
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&ProcessPluginDefinition> {
        self.plugins.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.plugins.contains_key(id)
    }

    pub fn has_capability(&self, id: &str, capability: PluginCapability) -> bool {
        self.get(id)
            .map(|p| p.has_capability(capability))
            .unwrap_or(false)
    }

    /// 具备指定能力的插件 ID（按 ID 排序）
    pub fn plugins_with(&self, capability: PluginCapability) -> Vec<&str> {
        self.plugins
            .values()
            .filter(|p| p.has_capability(capability))
            .map(|p| p.id.as_str())
            .collect()
    }

    /// 字段映射表单可选的转换插件（ID → 标签）
    pub fn import_process_options(&self) -> Vec<(String, String)> {
        self.plugins
            .values()
            .filter(|p| p.has_capability(PluginCapability::BuildsImportForm))
            .map(|p| (p.id.clone(), p.label.clone()))
            .collect()
    }
}
