// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时测试数据库、CSV 文件与测试数据种子
// ==========================================
#![allow(dead_code)]

use entity_import::domain::{EntityImporter, FieldMapping, SourceInfo};
use entity_import::repository::SqliteImporterStore;
use rusqlite::Connection;
use serde_json::json;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是合法 UTF-8")?
        .to_string();

    let conn = open_test_connection(&db_path)?;
    entity_import::db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试连接（统一 PRAGMA）
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    Ok(entity_import::db::open_sqlite_connection(db_path)?)
}

/// 在目录中写入 CSV 文件
pub fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("写入测试 CSV 失败");
    path
}

/// CSV 导入配置（has_header = true）
pub fn csv_importer(id: &str, label: &str, bundles: &[&str]) -> EntityImporter {
    EntityImporter::new(
        id,
        label,
        SourceInfo::new("entity_import_csv").with_config("has_header", json!(true)),
        "node",
        bundles.iter().map(|b| b.to_string()).collect(),
    )
}

/// 查找映射: 通过查找插件引用另一个管道
pub fn lookup_mapping(
    importer_id: &str,
    bundle: &str,
    name: &str,
    destination: &str,
    dependency_pipeline: &str,
) -> FieldMapping {
    FieldMapping::new(importer_id, bundle, name, destination).with_plugin(
        "entity_import_migrate_lookup",
        json!({ "migration": dependency_pipeline }),
    )
}

/// 种子数据: p1(article) 查找 p2(page)，p2 无依赖
///
/// - p1/article: full_name → title，author_ref → uid（查找 entity_import:p2:page）
/// - p2/page: page_title → title
pub fn seed_people_and_pages(store: &SqliteImporterStore) -> Result<(), Box<dyn Error>> {
    store
        .importers()
        .save(&csv_importer("p1", "People", &["article", "blog"]))?;
    store.importers().save(&csv_importer("p2", "Pages", &["page"]))?;

    store
        .mappings()
        .save(&FieldMapping::new("p1", "article", "full_name", "title"))?;
    store.mappings().save(&lookup_mapping(
        "p1",
        "article",
        "author_ref",
        "uid",
        "entity_import:p2:page",
    ))?;
    store
        .mappings()
        .save(&FieldMapping::new("p2", "page", "page_title", "title"))?;
    Ok(())
}
