// ==========================================
// 实体导入系统 - 配置存储 Trait
// ==========================================
// 职责: 定义管道编译所需的配置读取接口（不包含实现）
// 红线: 只读；不包含编译逻辑
// ==========================================

use crate::domain::field_mapping::{FieldMapping, FieldMappingOptions};
use crate::domain::importer::EntityImporter;
use crate::repository::error::RepositoryResult;

// ==========================================
// ImporterStore Trait
// ==========================================
// 用途: 管道编译器 / 字段映射解析器 / 源插件的数据来源
// 实现者: SqliteImporterStore（rusqlite），测试中的内存 Mock
pub trait ImporterStore: Send + Sync {
    /// 按 id 加载导入配置
    ///
    /// # 返回
    /// - Ok(None): 导入配置不存在
    fn load_importer(&self, importer_id: &str) -> RepositoryResult<Option<EntityImporter>>;

    /// 加载导入配置下的全部字段映射
    ///
    /// 返回顺序即存储自然加载顺序，编译器的"后写覆盖"规则依赖该顺序
    fn load_field_mappings(&self, importer_id: &str) -> RepositoryResult<Vec<FieldMapping>>;

    /// 加载导入配置的映射选项（不存在时返回 None）
    fn load_field_mapping_options(
        &self,
        importer_id: &str,
    ) -> RepositoryResult<Option<FieldMappingOptions>>;
}
