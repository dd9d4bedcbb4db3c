// ==========================================
// 实体导入系统 - 字段映射 (Field Mapping)
// ==========================================
// 职责: 源字段 → 目标属性 的映射配置，携带有序的转换插件列表
// 作用域: 一个字段映射只属于一个导入配置下的一个 bundle
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ==========================================
// ProcessPluginConfig - 单个转换插件配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessPluginConfig {
    pub plugin_id: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

// ==========================================
// ProcessingConfiguration - 转换插件列表（有序）
// ==========================================
// 同一插件 ID 在一个映射内只出现一次，重复配置原位覆盖
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfiguration {
    #[serde(default)]
    pub plugins: Vec<ProcessPluginConfig>,
}

impl ProcessingConfiguration {
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn has_plugin(&self, plugin_id: &str) -> bool {
        self.plugin(plugin_id).is_some()
    }

    pub fn plugin(&self, plugin_id: &str) -> Option<&ProcessPluginConfig> {
        self.plugins.iter().find(|p| p.plugin_id == plugin_id)
    }

    /// 设置插件配置（已存在则原位替换 settings，保持原有顺序）
    pub fn set_plugin(&mut self, plugin_id: impl Into<String>, settings: Map<String, Value>) {
        let plugin_id = plugin_id.into();
        match self.plugins.iter_mut().find(|p| p.plugin_id == plugin_id) {
            Some(existing) => existing.settings = settings,
            None => self.plugins.push(ProcessPluginConfig {
                plugin_id,
                settings,
            }),
        }
    }
}

// ==========================================
// UniqueIdentifier - 记录唯一键
// ==========================================
// identifier_settings 为 JSON 对象字符串（如 {"max_length": 64}）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniqueIdentifier {
    #[serde(default)]
    pub identifier_name: Option<String>,
    #[serde(default)]
    pub identifier_type: Option<String>,
    #[serde(default)]
    pub identifier_settings: Option<String>,
}

impl UniqueIdentifier {
    pub fn new(name: impl Into<String>, identifier_type: impl Into<String>) -> Self {
        Self {
            identifier_name: Some(name.into()),
            identifier_type: Some(identifier_type.into()),
            identifier_settings: None,
        }
    }

    pub fn with_settings(mut self, settings_json: impl Into<String>) -> Self {
        self.identifier_settings = Some(settings_json.into());
        self
    }
}

// ==========================================
// FieldMapping - 字段映射
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub id: String,               // {importer_id}.{bundle}.{name}
    pub label: String,
    pub name: String,             // 源字段名
    pub destination: String,      // 目标属性路径
    pub importer_id: String,      // 所属导入配置
    pub importer_bundle: String,  // 所属 bundle
    #[serde(default)]
    pub processing: ProcessingConfiguration,
    #[serde(default)]
    pub unique_identifier: Option<UniqueIdentifier>,
}

impl FieldMapping {
    /// 创建字段映射（无转换插件）
    pub fn new(
        importer_id: impl Into<String>,
        importer_bundle: impl Into<String>,
        name: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        let importer_id = importer_id.into();
        let importer_bundle = importer_bundle.into();
        let name = name.into();

        Self {
            id: format!("{}.{}.{}", importer_id, importer_bundle, name),
            label: name.clone(),
            name,
            destination: destination.into(),
            importer_id,
            importer_bundle,
            processing: ProcessingConfiguration::default(),
            unique_identifier: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// 追加转换插件（settings 非对象时按空配置处理）
    pub fn with_plugin(mut self, plugin_id: impl Into<String>, settings: Value) -> Self {
        let settings = match settings {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.processing.set_plugin(plugin_id, settings);
        self
    }

    pub fn with_unique_identifier(mut self, identifier: UniqueIdentifier) -> Self {
        self.unique_identifier = Some(identifier);
        self
    }

    /// 源字段名（process 的 source 指令）
    pub fn source_field(&self) -> &str {
        &self.name
    }

    pub fn has_processing_plugin(&self, plugin_id: &str) -> bool {
        self.processing.has_plugin(plugin_id)
    }

    pub fn is_unique_identifier(&self) -> bool {
        self.unique_identifier.is_some()
    }
}

// ==========================================
// FieldMappingOptions - 跨字段选项（每个导入配置一份）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMappingOptions {
    pub importer_id: String,
    #[serde(default)]
    pub unique_identifiers: Vec<UniqueIdentifier>,
}

impl FieldMappingOptions {
    pub fn new(importer_id: impl Into<String>) -> Self {
        Self {
            importer_id: importer_id.into(),
            unique_identifiers: Vec::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: UniqueIdentifier) -> Self {
        self.unique_identifiers.push(identifier);
        self
    }
}
