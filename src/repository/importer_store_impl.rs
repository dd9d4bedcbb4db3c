// ==========================================
// 实体导入系统 - 配置存储实现
// ==========================================
// 职责: 组合三个仓储，实现 ImporterStore（共享同一连接）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::field_mapping::{FieldMapping, FieldMappingOptions};
use crate::domain::importer::EntityImporter;
use crate::repository::error::RepositoryResult;
use crate::repository::field_mapping_option_repo::FieldMappingOptionRepository;
use crate::repository::field_mapping_repo::FieldMappingRepository;
use crate::repository::importer_repo::EntityImporterRepository;
use crate::repository::importer_store::ImporterStore;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub struct SqliteImporterStore {
    importers: EntityImporterRepository,
    mappings: FieldMappingRepository,
    options: FieldMappingOptionRepository,
}

impl SqliteImporterStore {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        Ok(Self {
            importers: EntityImporterRepository::from_connection(conn.clone())?,
            mappings: FieldMappingRepository::from_connection(conn.clone())?,
            options: FieldMappingOptionRepository::from_connection(conn)?,
        })
    }

    pub fn importers(&self) -> &EntityImporterRepository {
        &self.importers
    }

    pub fn mappings(&self) -> &FieldMappingRepository {
        &self.mappings
    }

    pub fn options(&self) -> &FieldMappingOptionRepository {
        &self.options
    }
}

impl ImporterStore for SqliteImporterStore {
    fn load_importer(&self, importer_id: &str) -> RepositoryResult<Option<EntityImporter>> {
        self.importers.find_by_id(importer_id)
    }

    fn load_field_mappings(&self, importer_id: &str) -> RepositoryResult<Vec<FieldMapping>> {
        self.mappings.find_by_importer(importer_id)
    }

    fn load_field_mapping_options(
        &self,
        importer_id: &str,
    ) -> RepositoryResult<Option<FieldMappingOptions>> {
        self.options.find(importer_id)
    }
}
