// ==========================================
// 实体导入系统 - 导入配置 (Import Profile)
// ==========================================
// 职责: 导入配置实体定义（源插件 + 目标实体类型 + 允许的 bundle）
// 红线: 不含数据访问逻辑，不含编译逻辑
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 迁移管道 ID 前缀: entity_import:{importer_id}:{bundle}
pub const MIGRATION_PLUGIN_PREFIX: &str = "entity_import";

// ==========================================
// SourceInfo - 源插件信息
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub plugin_id: String,                  // 源插件 ID（如 entity_import_csv）
    #[serde(default)]
    pub configuration: Map<String, Value>,  // 源插件配置（任意键值）
}

impl SourceInfo {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            configuration: Map::new(),
        }
    }

    /// 追加一项源配置
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.configuration.insert(key.into(), value);
        self
    }
}

// ==========================================
// EntityInfo - 目标实体信息
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    #[serde(rename = "type")]
    pub entity_type: String,    // 目标实体类型（如 node）
    #[serde(default)]
    pub bundles: Vec<String>,   // 允许的 bundle（有序）
}

// ==========================================
// EntityImporter - 导入配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityImporter {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_page: bool,     // 是否提供独立导入页面（路由由外部负责）
    pub source: SourceInfo,
    pub entity: EntityInfo,
}

impl EntityImporter {
    /// 创建导入配置
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        source: SourceInfo,
        entity_type: impl Into<String>,
        bundles: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            display_page: false,
            source,
            entity: EntityInfo {
                entity_type: entity_type.into(),
                bundles,
            },
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_display_page(mut self, display_page: bool) -> Self {
        self.display_page = display_page;
        self
    }

    /// 指定 bundle 对应的迁移管道 ID
    pub fn migration_plugin_id(&self, bundle: &str) -> String {
        format!("{}:{}:{}", MIGRATION_PLUGIN_PREFIX, self.id, bundle)
    }

    /// 指定 bundle 对应的管道标签（"标签: bundle"）
    pub fn migration_label(&self, bundle: &str) -> String {
        format!("{}: {}", self.label, bundle)
    }

    pub fn source_plugin_id(&self) -> &str {
        &self.source.plugin_id
    }

    pub fn source_configuration(&self) -> &Map<String, Value> {
        &self.source.configuration
    }

    pub fn entity_type(&self) -> &str {
        &self.entity.entity_type
    }

    pub fn bundles(&self) -> &[String] {
        &self.entity.bundles
    }

    pub fn has_bundle(&self, bundle: &str) -> bool {
        self.entity.bundles.iter().any(|b| b == bundle)
    }

    pub fn first_bundle(&self) -> Option<&str> {
        self.entity.bundles.first().map(String::as_str)
    }

    pub fn has_multiple_bundles(&self) -> bool {
        self.entity.bundles.len() > 1
    }

    /// 页面展示开关是否发生变化
    ///
    /// # 参数
    /// - original: 存储中的原始版本（None 表示新建）
    ///
    /// # 规则
    /// - 新建: display_page 为 true 即视为变化
    /// - 更新: 与原始版本的 display_page 不同即视为变化
    pub fn has_page_display_changed(&self, original: Option<&EntityImporter>) -> bool {
        match original {
            None => self.display_page,
            Some(orig) => self.display_page != orig.display_page,
        }
    }
}

/// 解析迁移管道 ID
///
/// # 返回
/// - Some((importer_id, bundle)): 格式为 entity_import:{importer_id}:{bundle}
/// - None: 前缀不匹配或缺少 bundle
pub fn parse_migration_plugin_id(plugin_id: &str) -> Option<(&str, &str)> {
    let rest = plugin_id
        .strip_prefix(MIGRATION_PLUGIN_PREFIX)?
        .strip_prefix(':')?;
    let (importer_id, bundle) = rest.split_once(':')?;

    if importer_id.is_empty() || bundle.is_empty() {
        return None;
    }
    Some((importer_id, bundle))
}
