// ==========================================
// 配置存储集成测试
// ==========================================
// 测试目标: SQLite 存储的 upsert、自然顺序、级联删除、发现纪元
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

use entity_import::config::{config_keys, ConfigManager, ImportConfigReader};
use entity_import::domain::{FieldMapping, FieldMappingOptions, UniqueIdentifier};
use entity_import::importer::discovery_epoch;
use entity_import::repository::{ImporterStore, RepositoryError, SqliteImporterStore};
use serde_json::json;
use test_helpers::{create_test_db, csv_importer, open_test_connection, seed_people_and_pages};

#[test]
fn test_importer_upsert_reports_new_and_display_change() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let store = SqliteImporterStore::new(&db_path).unwrap();

    let importer = csv_importer("p1", "People", &["article"]).with_display_page(true);
    let first = store.importers().save(&importer).unwrap();
    assert!(first.is_new);
    assert!(first.page_display_changed);

    let relabeled = importer.clone().with_description("people import");
    let second = store.importers().save(&relabeled).unwrap();
    assert!(!second.is_new);
    assert!(!second.page_display_changed);

    let hidden = relabeled.with_display_page(false);
    let third = store.importers().save(&hidden).unwrap();
    assert!(third.page_display_changed);

    let loaded = store.load_importer("p1").unwrap().unwrap();
    assert_eq!(loaded, hidden);
    assert_eq!(store.importers().list_all().unwrap().len(), 1);
}

#[test]
fn test_importer_roundtrip_keeps_source_configuration_and_bundle_order() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let store = SqliteImporterStore::new(&db_path).unwrap();

    let importer = csv_importer("p1", "People", &["blog", "article"]);
    store.importers().save(&importer).unwrap();

    let loaded = store.load_importer("p1").unwrap().unwrap();
    assert_eq!(loaded.bundles(), &["blog".to_string(), "article".to_string()]);
    assert_eq!(loaded.first_bundle(), Some("blog"));
    assert_eq!(loaded.source_configuration().get("has_header"), Some(&json!(true)));
    assert!(store.load_importer("missing").unwrap().is_none());
}

#[test]
fn test_empty_importer_id_is_rejected() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let store = SqliteImporterStore::new(&db_path).unwrap();

    let err = store
        .importers()
        .save(&csv_importer(" ", "Blank", &["page"]))
        .unwrap_err();

    assert!(matches!(err, RepositoryError::ValidationError(_)));
}

#[test]
fn test_field_mappings_keep_natural_order_on_update() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let store = SqliteImporterStore::new(&db_path).unwrap();
    store
        .importers()
        .save(&csv_importer("p1", "People", &["article"]))
        .unwrap();

    let zeta = FieldMapping::new("p1", "article", "zeta", "title");
    let alpha = FieldMapping::new("p1", "article", "alpha", "body");
    store.mappings().save(&zeta).unwrap();
    store.mappings().save(&alpha).unwrap();

    // 更新第一个映射不改变加载顺序
    store
        .mappings()
        .save(&zeta.clone().with_label("Zeta (renamed)"))
        .unwrap();

    let loaded = store.load_field_mappings("p1").unwrap();
    let names: Vec<&str> = loaded.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["zeta", "alpha"]);
    assert_eq!(loaded[0].label, "Zeta (renamed)");
}

#[test]
fn test_field_mapping_processing_roundtrip() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let store = SqliteImporterStore::new(&db_path).unwrap();
    seed_people_and_pages(&store).unwrap();

    let lookup = store
        .mappings()
        .find_by_id("p1.article.author_ref")
        .unwrap()
        .unwrap();
    assert_eq!(
        lookup
            .processing
            .plugin("entity_import_migrate_lookup")
            .and_then(|p| p.settings.get("migration")),
        Some(&json!("entity_import:p2:page"))
    );

    let by_bundle = store
        .mappings()
        .find_by_importer_bundle("p1", "article")
        .unwrap();
    assert_eq!(by_bundle.len(), 2);
    assert!(store
        .mappings()
        .find_by_importer_bundle("p1", "blog")
        .unwrap()
        .is_empty());
}

#[test]
fn test_mapping_for_unknown_importer_violates_foreign_key() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let store = SqliteImporterStore::new(&db_path).unwrap();

    let err = store
        .mappings()
        .save(&FieldMapping::new("ghost", "page", "name", "title"))
        .unwrap_err();

    assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)));
}

#[test]
fn test_delete_importer_cascades_to_mappings_and_options() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let store = SqliteImporterStore::new(&db_path).unwrap();
    seed_people_and_pages(&store).unwrap();
    store
        .options()
        .save(&FieldMappingOptions::new("p1").with_identifier(UniqueIdentifier::new("id", "integer")))
        .unwrap();

    assert!(store.importers().delete("p1").unwrap());
    assert!(!store.importers().delete("p1").unwrap());

    assert!(store.load_importer("p1").unwrap().is_none());
    assert!(store.load_field_mappings("p1").unwrap().is_empty());
    assert!(store.load_field_mapping_options("p1").unwrap().is_none());
    // 其他导入配置不受影响
    assert_eq!(store.load_field_mappings("p2").unwrap().len(), 1);
}

#[test]
fn test_field_mapping_options_upsert() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let store = SqliteImporterStore::new(&db_path).unwrap();
    store
        .importers()
        .save(&csv_importer("p1", "People", &["article"]))
        .unwrap();

    store
        .options()
        .save(&FieldMappingOptions::new("p1").with_identifier(UniqueIdentifier::new("id", "integer")))
        .unwrap();
    let replaced = FieldMappingOptions::new("p1")
        .with_identifier(UniqueIdentifier::new("email", "string").with_settings(r#"{"max_length":255}"#));
    store.options().save(&replaced).unwrap();

    assert_eq!(store.load_field_mapping_options("p1").unwrap(), Some(replaced));
    assert!(store.options().delete("p1").unwrap());
    assert!(store.load_field_mapping_options("p1").unwrap().is_none());
}

#[test]
fn test_save_and_delete_bump_discovery_epoch() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let store = SqliteImporterStore::new(&db_path).unwrap();

    let before_save = discovery_epoch();
    store
        .importers()
        .save(&csv_importer("p1", "People", &["article"]))
        .unwrap();
    let after_save = discovery_epoch();
    assert!(after_save > before_save);

    store.importers().delete("p1").unwrap();
    assert!(discovery_epoch() > after_save);
}

#[test]
fn test_mapping_save_and_delete_bump_discovery_epoch() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let store = SqliteImporterStore::new(&db_path).unwrap();
    store
        .importers()
        .save(&csv_importer("p1", "People", &["article"]))
        .unwrap();

    let before_save = discovery_epoch();
    store
        .mappings()
        .save(&FieldMapping::new("p1", "article", "full_name", "title"))
        .unwrap();
    let after_save = discovery_epoch();
    assert!(after_save > before_save);

    assert!(store.mappings().delete("p1.article.full_name").unwrap());
    let after_delete = discovery_epoch();
    assert!(after_delete > after_save);

    store
        .options()
        .save(&FieldMappingOptions::new("p1"))
        .unwrap();
    assert!(discovery_epoch() > after_delete);
}

#[tokio::test]
async fn test_config_manager_reads_overrides_and_defaults() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    conn.execute(
        "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)",
        rusqlite::params![config_keys::MERGE_FILE_PREFIX, "UPLOAD_"],
    )
    .unwrap();
    drop(conn);

    let config = ConfigManager::new(&db_path).unwrap();

    assert_eq!(config.get_merge_file_prefix().await.unwrap(), "UPLOAD_");
    assert_eq!(
        config.get_lookup_plugin_id().await.unwrap(),
        "entity_import_migrate_lookup"
    );
    assert_eq!(
        config.get_merge_directory().await.unwrap(),
        std::env::temp_dir()
    );
}
