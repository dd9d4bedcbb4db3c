// ==========================================
// 实体导入系统 - 迁移管道定义 (Pipeline Definition)
// ==========================================
// 职责: 编译产物（值对象，不落库）
// 结构: source + process + destination + migration_dependencies
// ==========================================
// process 映射按插入顺序序列化（目标路径冲突时原位覆盖）
// ==========================================

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// 目标插件前缀: entity:{entity_type}
pub const DESTINATION_PLUGIN_PREFIX: &str = "entity";

// ==========================================
// SourceSpec - 源定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub plugin: String,
    pub importer_id: String,
    #[serde(flatten)]
    pub configuration: Map<String, Value>,
}

impl SourceSpec {
    /// 读取源配置项
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.configuration.get(key)
    }
}

// ==========================================
// ProcessStep - 转换链中的一步
// ==========================================
// source 只出现在链的第一步，后续步骤消费上一步输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub plugin: String,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

// ==========================================
// ProcessEntry - 单个目标路径的处理定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessEntry {
    /// 直接引用源字段（未配置转换）
    Field(String),
    /// 有序转换链
    Chain(Vec<ProcessStep>),
    /// 单步简写（仅可能来自覆写片段）
    Step(ProcessStep),
}

impl ProcessEntry {
    pub fn as_field(&self) -> Option<&str> {
        match self {
            ProcessEntry::Field(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_chain(&self) -> Option<&[ProcessStep]> {
        match self {
            ProcessEntry::Chain(steps) => Some(steps),
            _ => None,
        }
    }
}

// ==========================================
// ProcessSpec - 目标路径 → 处理定义（有序）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessSpec {
    entries: Vec<(String, ProcessEntry)>,
}

impl ProcessSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入目标路径；已存在时原位替换并返回旧值
    pub fn insert(&mut self, destination: impl Into<String>, entry: ProcessEntry) -> Option<ProcessEntry> {
        let destination = destination.into();
        match self.entries.iter_mut().find(|(d, _)| *d == destination) {
            Some((_, existing)) => Some(std::mem::replace(existing, entry)),
            None => {
                self.entries.push((destination, entry));
                None
            }
        }
    }

    pub fn get(&self, destination: &str) -> Option<&ProcessEntry> {
        self.entries
            .iter()
            .find(|(d, _)| d == destination)
            .map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProcessEntry)> {
        self.entries.iter().map(|(d, e)| (d.as_str(), e))
    }

    pub fn destinations(&self) -> Vec<&str> {
        self.entries.iter().map(|(d, _)| d.as_str()).collect()
    }
}

impl Serialize for ProcessSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (destination, entry) in &self.entries {
            map.serialize_entry(destination, entry)?;
        }
        map.end()
    }
}

struct ProcessSpecVisitor;

impl<'de> Visitor<'de> for ProcessSpecVisitor {
    type Value = ProcessSpec;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of destination path to process definition")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut spec = ProcessSpec::new();
        while let Some((destination, entry)) = access.next_entry::<String, ProcessEntry>()? {
            spec.insert(destination, entry);
        }
        Ok(spec)
    }
}

impl<'de> Deserialize<'de> for ProcessSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ProcessSpecVisitor)
    }
}

// ==========================================
// DestinationSpec - 目标定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationSpec {
    pub plugin: String,          // entity:{entity_type}
    pub default_bundle: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DestinationSpec {
    pub fn for_entity(entity_type: &str, bundle: &str) -> Self {
        Self {
            plugin: format!("{}:{}", DESTINATION_PLUGIN_PREFIX, entity_type),
            default_bundle: bundle.to_string(),
            extra: Map::new(),
        }
    }
}

// ==========================================
// DependencySpec - 管道依赖
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencySpec {
    #[serde(default)]
    pub optional: Vec<String>,
    #[serde(default)]
    pub required: Vec<String>,
}

// ==========================================
// PipelineDefinition - 迁移管道定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub id: String,
    pub label: String,
    pub source: SourceSpec,
    #[serde(default)]
    pub process: ProcessSpec,
    pub destination: DestinationSpec,
    #[serde(rename = "migration_dependencies", default)]
    pub dependencies: DependencySpec,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PipelineDefinition {
    pub fn importer_id(&self) -> &str {
        &self.source.importer_id
    }

    pub fn bundle(&self) -> &str {
        &self.destination.default_bundle
    }

    pub fn optional_dependencies(&self) -> &[String] {
        &self.dependencies.optional
    }

    pub fn has_optional_dependencies(&self) -> bool {
        !self.dependencies.optional.is_empty()
    }

    /// 在当前定义上深度合并覆写片段
    ///
    /// # 合并规则
    /// - 对象: 逐键递归合并
    /// - 数组: 追加拼接（不替换）
    /// - 其他: 覆写值替换原值
    pub fn merge_overrides(self, overrides: &Value) -> serde_json::Result<Self> {
        if is_empty_fragment(overrides) {
            return Ok(self);
        }
        let mut base = serde_json::to_value(&self)?;
        deep_merge(&mut base, overrides);
        serde_json::from_value(base)
    }
}

fn is_empty_fragment(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// 递归合并 JSON（数组拼接，对象递归，标量替换）
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(base_items), Value::Array(overlay_items)) => {
            base_items.extend(overlay_items.iter().cloned());
        }
        (base, overlay) => *base = overlay.clone(),
    }
}
