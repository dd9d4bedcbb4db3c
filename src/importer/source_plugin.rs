// ==========================================
// 实体导入系统 - 源插件
// ==========================================
// 职责: 按 source 定义实例化记录源（当前提供 CSV）
// 说明: CSV 合并在首次访问时执行一次，之后复用合并文件
// ==========================================

use crate::config::ImportSettings;
use crate::domain::pipeline::SourceSpec;
use crate::importer::csv_merge::{CsvMergeReport, CsvMerger};
use crate::importer::csv_source::{release_merged_file, CsvRecordReader, SourceRecord};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::importer_store::ImporterStore;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tracing::{debug, warn};

/// CSV 源插件 ID
pub const CSV_SOURCE_PLUGIN_ID: &str = "entity_import_csv";

/// 记录迭代器
pub type RecordIterator<'s> = Box<dyn Iterator<Item = ImportResult<SourceRecord>> + 's>;

// ==========================================
// ImportSource Trait
// ==========================================
// 用途: 管道 source 阶段的记录来源
// 实现者: CsvImportSource
pub trait ImportSource {
    fn plugin_id(&self) -> &str;

    /// 面向操作员的插件标签
    fn label(&self) -> &str;

    /// 必需配置是否齐全（缺失时批处理跳过该管道）
    fn has_required_configs(&self) -> bool;

    /// 源字段列表
    fn fields(&mut self) -> ImportResult<Vec<String>>;

    /// 记录唯一键定义: identifier_name → {type, ...settings}
    fn ids(&self) -> ImportResult<Map<String, Value>>;

    /// 从头开始的记录迭代器
    fn initialize_iterator(&mut self) -> ImportResult<RecordIterator<'_>>;

    /// 删除导入工作文件
    fn unlink_import_file(&mut self) -> ImportResult<()>;
}

// ==========================================
// CsvSourceConfiguration
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CsvSourceConfiguration {
    #[serde(default)]
    pub file_id: Vec<PathBuf>,
    #[serde(default)]
    pub has_header: bool,
    #[serde(default)]
    pub upload_multiple: bool,
}

// ==========================================
// CsvImportSource
// ==========================================
pub struct CsvImportSource<'a> {
    importer_id: String,
    configuration: CsvSourceConfiguration,
    store: &'a dyn ImporterStore,
    merger: CsvMerger,
    merged: Option<CsvMergeReport>,
}

impl<'a> CsvImportSource<'a> {
    pub fn new(
        importer_id: impl Into<String>,
        configuration: CsvSourceConfiguration,
        store: &'a dyn ImporterStore,
        merger: CsvMerger,
    ) -> Self {
        Self {
            importer_id: importer_id.into(),
            configuration,
            store,
            merger,
            merged: None,
        }
    }

    pub fn configuration(&self) -> &CsvSourceConfiguration {
        &self.configuration
    }

    /// 合并结果（首次访问时执行合并）
    pub fn merge_report(&mut self) -> ImportResult<&CsvMergeReport> {
        if self.merged.is_none() {
            let report = self
                .merger
                .merge(&self.configuration.file_id, self.configuration.has_header)?;
            self.merged = Some(report);
        }
        self.merged
            .as_ref()
            .ok_or_else(|| ImportError::InternalError("合并结果缺失".to_string()))
    }

    fn open_reader(&mut self) -> ImportResult<CsvRecordReader> {
        let has_header = self.configuration.has_header;
        let path = self.merge_report()?.path.clone();
        CsvRecordReader::open(path, has_header)
    }
}

impl ImportSource for CsvImportSource<'_> {
    fn plugin_id(&self) -> &str {
        CSV_SOURCE_PLUGIN_ID
    }

    fn label(&self) -> &str {
        "CSV"
    }

    fn has_required_configs(&self) -> bool {
        !self.configuration.file_id.is_empty()
    }

    fn fields(&mut self) -> ImportResult<Vec<String>> {
        let mut reader = self.open_reader()?;
        Ok(reader.headers()?.map(|h| h.to_vec()).unwrap_or_default())
    }

    fn ids(&self) -> ImportResult<Map<String, Value>> {
        if self.importer_id.is_empty() {
            return Err(ImportError::inconsistency(
                CSV_SOURCE_PLUGIN_ID,
                "源配置缺少 importer_id",
            ));
        }
        let options = self.store.load_field_mapping_options(&self.importer_id)?;

        let mut ids = Map::new();
        for identifier in options.map(|o| o.unique_identifiers).unwrap_or_default() {
            let (Some(name), Some(identifier_type)) =
                (identifier.identifier_name, identifier.identifier_type)
            else {
                continue;
            };

            let mut definition = Map::new();
            definition.insert("type".to_string(), json!(identifier_type));

            if let Some(raw) = identifier.identifier_settings.filter(|s| !s.trim().is_empty()) {
                match serde_json::from_str::<Map<String, Value>>(&raw) {
                    Ok(settings) => {
                        for (key, value) in settings {
                            definition.entry(key).or_insert(value);
                        }
                    }
                    Err(e) => warn!(
                        importer_id = %self.importer_id,
                        identifier = %name,
                        error = %e,
                        "唯一键设置不是合法的 JSON 对象，已忽略"
                    ),
                }
            }
            ids.insert(name, Value::Object(definition));
        }
        Ok(ids)
    }

    fn initialize_iterator(&mut self) -> ImportResult<RecordIterator<'_>> {
        Ok(Box::new(self.open_reader()?))
    }

    fn unlink_import_file(&mut self) -> ImportResult<()> {
        if let Some(report) = self.merged.take() {
            release_merged_file(&report.path)?;
        }
        Ok(())
    }
}

// ==========================================
// SourcePluginManager
// ==========================================
pub struct SourcePluginManager;

impl SourcePluginManager {
    /// 可用源插件（ID → 标签）
    pub fn definitions() -> Vec<(&'static str, &'static str)> {
        vec![(CSV_SOURCE_PLUGIN_ID, "CSV")]
    }

    /// 按 source 定义实例化源插件
    ///
    /// # 错误
    /// - ConfigurationInconsistency: 插件 ID 未知或配置无法解析
    pub fn create_source<'a>(
        spec: &SourceSpec,
        store: &'a dyn ImporterStore,
        settings: &ImportSettings,
    ) -> ImportResult<Box<dyn ImportSource + 'a>> {
        match spec.plugin.as_str() {
            CSV_SOURCE_PLUGIN_ID => {
                let configuration: CsvSourceConfiguration =
                    serde_json::from_value(Value::Object(spec.configuration.clone())).map_err(
                        |e| ImportError::inconsistency(&spec.plugin, format!("源配置无法解析: {}", e)),
                    )?;
                debug!(
                    importer_id = %spec.importer_id,
                    files = configuration.file_id.len(),
                    has_header = configuration.has_header,
                    "CSV 源插件已创建"
                );
                Ok(Box::new(CsvImportSource::new(
                    spec.importer_id.clone(),
                    configuration,
                    store,
                    CsvMerger::from_settings(settings),
                )))
            }
            other => Err(ImportError::inconsistency(other, "源插件未注册")),
        }
    }
}
