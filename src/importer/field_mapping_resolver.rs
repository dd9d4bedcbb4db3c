// ==========================================
// 实体导入系统 - 字段映射解析器
// ==========================================
// 职责: 按 导入配置 + bundle 过滤字段映射
// 顺序: 保持存储自然加载顺序（不额外排序），编译器的"后写覆盖"规则依赖此顺序
// ==========================================

use crate::domain::field_mapping::{FieldMapping, UniqueIdentifier};
use crate::domain::importer::EntityImporter;
use crate::importer::error::ImportResult;
use crate::repository::importer_store::ImporterStore;
use tracing::debug;

pub struct FieldMappingResolver<'a> {
    store: &'a dyn ImporterStore,
}

impl<'a> FieldMappingResolver<'a> {
    pub fn new(store: &'a dyn ImporterStore) -> Self {
        Self { store }
    }

    /// 导入配置下的全部字段映射（所有 bundle）
    pub fn mappings(&self, importer: &EntityImporter) -> ImportResult<Vec<FieldMapping>> {
        let mappings = self
            .store
            .load_field_mappings(&importer.id)?
            .into_iter()
            .filter(|m| m.importer_id == importer.id)
            .collect();
        Ok(mappings)
    }

    /// 指定 bundle 的字段映射
    ///
    /// 导入配置 ID 与 bundle 名均按精确相等匹配
    pub fn mappings_for_bundle(
        &self,
        importer: &EntityImporter,
        bundle: &str,
    ) -> ImportResult<Vec<FieldMapping>> {
        let mappings: Vec<FieldMapping> = self
            .mappings(importer)?
            .into_iter()
            .filter(|m| m.importer_bundle == bundle)
            .collect();

        debug!(
            importer_id = %importer.id,
            bundle = %bundle,
            count = mappings.len(),
            "字段映射已解析"
        );
        Ok(mappings)
    }

    pub fn has_field_mappings(&self, importer: &EntityImporter) -> ImportResult<bool> {
        Ok(!self.mappings(importer)?.is_empty())
    }

    /// 字段映射选项（源字段名 → 标签），同名映射后者覆盖前者
    pub fn field_mapping_options(
        &self,
        importer: &EntityImporter,
    ) -> ImportResult<Vec<(String, String)>> {
        let mut options: Vec<(String, String)> = Vec::new();
        for mapping in self.mappings(importer)? {
            match options.iter_mut().find(|(name, _)| *name == mapping.name) {
                Some((_, label)) => *label = mapping.label,
                None => options.push((mapping.name, mapping.label)),
            }
        }
        Ok(options)
    }

    /// 记录唯一键配置（来自映射选项，不存在时为空）
    pub fn unique_identifiers(
        &self,
        importer: &EntityImporter,
    ) -> ImportResult<Vec<UniqueIdentifier>> {
        Ok(self
            .store
            .load_field_mapping_options(&importer.id)?
            .map(|options| options.unique_identifiers)
            .unwrap_or_default())
    }
}
