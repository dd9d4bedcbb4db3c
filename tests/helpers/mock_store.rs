// ==========================================
// Mock 配置存储 - 用于集成测试
// ==========================================
// 内存实现，字段映射按插入顺序返回（模拟存储自然顺序）
// ==========================================
#![allow(dead_code)]

use entity_import::domain::{EntityImporter, FieldMapping, FieldMappingOptions};
use entity_import::repository::{ImporterStore, RepositoryError, RepositoryResult};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MockImporterStore {
    importers: HashMap<String, EntityImporter>,
    mappings: Vec<FieldMapping>,
    options: HashMap<String, FieldMappingOptions>,
    fail_mappings: bool,
}

impl MockImporterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_importer(mut self, importer: EntityImporter) -> Self {
        self.importers.insert(importer.id.clone(), importer);
        self
    }

    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    pub fn with_options(mut self, options: FieldMappingOptions) -> Self {
        self.options.insert(options.importer_id.clone(), options);
        self
    }

    /// 读取字段映射时模拟存储故障
    pub fn failing_mappings(mut self) -> Self {
        self.fail_mappings = true;
        self
    }
}

impl ImporterStore for MockImporterStore {
    fn load_importer(&self, importer_id: &str) -> RepositoryResult<Option<EntityImporter>> {
        Ok(self.importers.get(importer_id).cloned())
    }

    fn load_field_mappings(&self, importer_id: &str) -> RepositoryResult<Vec<FieldMapping>> {
        if self.fail_mappings {
            return Err(RepositoryError::DatabaseQueryError(
                "mock store unavailable".to_string(),
            ));
        }
        Ok(self
            .mappings
            .iter()
            .filter(|m| m.importer_id == importer_id)
            .cloned()
            .collect())
    }

    fn load_field_mapping_options(
        &self,
        importer_id: &str,
    ) -> RepositoryResult<Option<FieldMappingOptions>> {
        Ok(self.options.get(importer_id).cloned())
    }
}
