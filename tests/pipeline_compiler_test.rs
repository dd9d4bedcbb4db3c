// ==========================================
// 管道编译器集成测试
// ==========================================
// 测试目标: 导入配置 + 字段映射 → 管道定义
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[path = "helpers/mock_store.rs"]
mod mock_store;

use entity_import::config::ImportSettings;
use entity_import::domain::{FieldMapping, ProcessEntry};
use entity_import::importer::{ImportError, PipelineCompiler, ProcessPluginRegistry};
use mock_store::MockImporterStore;
use serde_json::json;
use test_helpers::{csv_importer, lookup_mapping};

fn compile(
    store: &MockImporterStore,
    importer_id: &str,
    bundle: &str,
    overrides: Option<&serde_json::Value>,
) -> Result<entity_import::domain::PipelineDefinition, ImportError> {
    let settings = ImportSettings::default();
    let registry = ProcessPluginRegistry::with_defaults(&settings.lookup_plugin_id);
    let compiler = PipelineCompiler::new(store, &registry, &settings);
    let importer = csv_importer(importer_id, "People", &["article", "blog"]);
    compiler.compile(&importer, bundle, overrides)
}

#[test]
fn test_bare_field_reference_for_mapping_without_plugins() {
    let store = MockImporterStore::new()
        .with_mapping(FieldMapping::new("p1", "article", "full_name", "title"));

    let definition = compile(&store, "p1", "article", None).unwrap();

    assert_eq!(definition.id, "entity_import:p1:article");
    assert_eq!(definition.label, "People: article");
    assert_eq!(
        serde_json::to_value(&definition.process).unwrap(),
        json!({ "title": "full_name" })
    );
    assert_eq!(definition.destination.plugin, "entity:node");
    assert_eq!(definition.destination.default_bundle, "article");
    assert_eq!(definition.source.plugin, "entity_import_csv");
    assert_eq!(definition.source.importer_id, "p1");
    assert!(definition.optional_dependencies().is_empty());
}

#[test]
fn test_invalid_bundle_is_rejected() {
    let store = MockImporterStore::new()
        .with_mapping(FieldMapping::new("p1", "article", "full_name", "title"));

    let err = compile(&store, "p1", "page", None).unwrap_err();

    assert!(matches!(err, ImportError::InvalidBundle { ref bundle, .. } if bundle == "page"));
    assert_eq!(err.kind(), "invalid_bundle");
}

#[test]
fn test_chain_carries_source_on_first_step_only() {
    let mapping = FieldMapping::new("p1", "article", "tags", "field_tags")
        .with_plugin("entity_import_explode", json!({ "delimiter": ",", "limit": 0 }))
        .with_plugin("entity_import_default_value", json!({ "default_value": "none" }))
        .with_plugin("static_map", json!({ "map": { "a": "b" } }));
    let store = MockImporterStore::new().with_mapping(mapping);

    let definition = compile(&store, "p1", "article", None).unwrap();
    let chain = definition
        .process
        .get("field_tags")
        .and_then(ProcessEntry::as_chain)
        .expect("field_tags 应为转换链");

    assert_eq!(chain.len(), 3);
    assert_eq!(chain[0].source.as_deref(), Some("tags"));
    assert!(chain[1..].iter().all(|step| step.source.is_none()));
    // 空设置项被过滤
    assert!(!chain[0].settings.contains_key("limit"));
    assert_eq!(
        serde_json::to_value(&chain[0]).unwrap(),
        json!({ "plugin": "entity_import_explode", "delimiter": ",", "source": "tags" })
    );
}

#[test]
fn test_later_mapping_overwrites_same_destination() {
    let store = MockImporterStore::new()
        .with_mapping(FieldMapping::new("p1", "article", "full_name", "title"))
        .with_mapping(
            FieldMapping::new("p1", "article", "headline", "title")
                .with_plugin("entity_import_callback", json!({ "callable": "trim" })),
        );

    let definition = compile(&store, "p1", "article", None).unwrap();
    let chain = definition
        .process
        .get("title")
        .and_then(ProcessEntry::as_chain)
        .expect("title 应反映第二个映射");

    assert_eq!(definition.process.len(), 1);
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].plugin, "entity_import_callback");
    assert_eq!(chain[0].source.as_deref(), Some("headline"));
}

#[test]
fn test_mappings_of_other_bundles_and_importers_are_ignored() {
    let store = MockImporterStore::new()
        .with_mapping(FieldMapping::new("p1", "article", "full_name", "title"))
        .with_mapping(FieldMapping::new("p1", "blog", "blog_title", "title"))
        .with_mapping(FieldMapping::new("p9", "article", "other", "body"));

    let definition = compile(&store, "p1", "blog", None).unwrap();

    assert_eq!(
        serde_json::to_value(&definition.process).unwrap(),
        json!({ "title": "blog_title" })
    );
}

#[test]
fn test_lookup_mapping_declares_optional_dependency() {
    let store = MockImporterStore::new().with_mapping(lookup_mapping(
        "p1",
        "article",
        "author_ref",
        "uid",
        "entity_import:p2:page",
    ));

    let definition = compile(&store, "p1", "article", None).unwrap();

    assert_eq!(
        definition.optional_dependencies(),
        &["entity_import:p2:page".to_string()]
    );
    assert!(definition.dependencies.required.is_empty());
}

#[test]
fn test_last_lookup_mapping_wins_for_dependencies() {
    let store = MockImporterStore::new()
        .with_mapping(lookup_mapping("p1", "article", "a", "uid", "entity_import:p2:page"))
        .with_mapping(lookup_mapping("p1", "article", "b", "field_ref", "entity_import:p3:tag"));

    let definition = compile(&store, "p1", "article", None).unwrap();

    assert_eq!(
        definition.optional_dependencies(),
        &["entity_import:p3:tag".to_string()]
    );
}

#[test]
fn test_overrides_are_deep_merged_with_array_concatenation() {
    let store = MockImporterStore::new()
        .with_mapping(lookup_mapping("p1", "article", "a", "uid", "entity_import:p2:page"));
    let overrides = json!({
        "source": { "file_id": ["/tmp/upload.csv"] },
        "migration_dependencies": { "optional": ["entity_import:p3:tag"] }
    });

    let definition = compile(&store, "p1", "article", Some(&overrides)).unwrap();

    assert_eq!(
        definition.source.config_value("file_id"),
        Some(&json!(["/tmp/upload.csv"]))
    );
    assert_eq!(definition.source.config_value("has_header"), Some(&json!(true)));
    assert_eq!(
        definition.optional_dependencies(),
        &[
            "entity_import:p2:page".to_string(),
            "entity_import:p3:tag".to_string()
        ]
    );
}

#[test]
fn test_compile_is_deterministic() {
    let store = MockImporterStore::new()
        .with_mapping(FieldMapping::new("p1", "article", "full_name", "title"))
        .with_mapping(lookup_mapping("p1", "article", "a", "uid", "entity_import:p2:page"));

    let first = compile(&store, "p1", "article", None).unwrap();
    let second = compile(&store, "p1", "article", None).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_storage_failure_propagates_without_partial_definition() {
    let store = MockImporterStore::new().failing_mappings();

    let err = compile(&store, "p1", "article", None).unwrap_err();

    assert!(matches!(err, ImportError::Repository(_)));
}
