// ==========================================
// 依赖解析器集成测试
// ==========================================
// 测试目标: 依赖链实例化顺序、环路检测、依赖配置传递
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[path = "helpers/mock_store.rs"]
mod mock_store;

use entity_import::config::ImportSettings;
use entity_import::domain::{FieldMapping, PipelineDefinition};
use entity_import::importer::{
    DependencyResolver, ImportError, ImporterPipelineFactory, PipelineCompiler,
    ProcessPluginRegistry,
};
use mock_store::MockImporterStore;
use serde_json::{json, Map, Value};
use test_helpers::{csv_importer, lookup_mapping};

/// 构建 a → b → c 形式的导入配置，每个导入配置只有一个 bundle
fn chain_store(links: &[(&str, Option<&str>)]) -> MockImporterStore {
    let mut store = MockImporterStore::new();
    for (importer_id, dependency) in links {
        store = store.with_importer(csv_importer(importer_id, importer_id, &["page"]));
        store = store.with_mapping(FieldMapping::new(*importer_id, "page", "name", "title"));
        if let Some(dependency) = dependency {
            store = store.with_mapping(lookup_mapping(
                importer_id,
                "page",
                "ref",
                "field_ref",
                &format!("entity_import:{}:page", dependency),
            ));
        }
    }
    store
}

fn resolve_ids(
    store: &MockImporterStore,
    root_importer: &str,
    configuration: &Map<String, Value>,
) -> Result<Vec<PipelineDefinition>, ImportError> {
    let settings = ImportSettings::default();
    let registry = ProcessPluginRegistry::with_defaults(&settings.lookup_plugin_id);
    let compiler = PipelineCompiler::new(store, &registry, &settings);
    let importer = csv_importer(root_importer, root_importer, &["page"]);
    let root = compiler.compile(&importer, "page", None)?;

    let factory = ImporterPipelineFactory::new(&compiler);
    DependencyResolver::new(&factory).resolve(root, configuration)
}

fn ids(pipelines: &[PipelineDefinition]) -> Vec<&str> {
    pipelines.iter().map(|p| p.id.as_str()).collect()
}

#[test]
fn test_pipeline_without_dependency_resolves_to_itself() {
    let store = chain_store(&[("a", None)]);

    let pipelines = resolve_ids(&store, "a", &Map::new()).unwrap();

    assert_eq!(ids(&pipelines), vec!["entity_import:a:page"]);
}

#[test]
fn test_chain_resolves_dependencies_first() {
    let store = chain_store(&[("a", Some("b")), ("b", Some("c")), ("c", None)]);

    let pipelines = resolve_ids(&store, "a", &Map::new()).unwrap();

    assert_eq!(
        ids(&pipelines),
        vec![
            "entity_import:c:page",
            "entity_import:b:page",
            "entity_import:a:page"
        ]
    );
}

#[test]
fn test_cycle_fails_with_repeated_pipeline_id() {
    let store = chain_store(&[("a", Some("b")), ("b", Some("a"))]);

    let err = resolve_ids(&store, "a", &Map::new()).unwrap_err();

    assert_eq!(err.kind(), "configuration_inconsistency");
    assert_eq!(err.offending_id(), Some("entity_import:a:page"));
}

#[test]
fn test_unknown_dependency_importer_is_inconsistency() {
    let store = chain_store(&[("a", Some("ghost"))]);

    let err = resolve_ids(&store, "a", &Map::new()).unwrap_err();

    assert_eq!(err.kind(), "configuration_inconsistency");
    assert_eq!(err.offending_id(), Some("entity_import:ghost:page"));
}

#[test]
fn test_dependency_bundle_outside_profile_is_inconsistency() {
    let store = MockImporterStore::new()
        .with_importer(csv_importer("a", "a", &["page"]))
        .with_importer(csv_importer("b", "b", &["page"]))
        .with_mapping(lookup_mapping("a", "page", "ref", "uid", "entity_import:b:article"));

    let err = resolve_ids(&store, "a", &Map::new()).unwrap_err();

    assert!(matches!(err, ImportError::ConfigurationInconsistency { .. }));
    assert_eq!(err.offending_id(), Some("entity_import:b:article"));
}

#[test]
fn test_only_first_optional_dependency_is_followed() {
    let store = MockImporterStore::new()
        .with_importer(csv_importer("a", "a", &["page"]))
        .with_importer(csv_importer("b", "b", &["page"]))
        .with_importer(csv_importer("c", "c", &["page"]))
        .with_mapping(
            FieldMapping::new("a", "page", "ref", "uid").with_plugin(
                "entity_import_migrate_lookup",
                json!({ "migration": ["entity_import:b:page", "entity_import:c:page"] }),
            ),
        );

    let pipelines = resolve_ids(&store, "a", &Map::new()).unwrap();

    assert_eq!(
        ids(&pipelines),
        vec!["entity_import:b:page", "entity_import:a:page"]
    );
}

#[test]
fn test_dependency_configuration_becomes_source_override() {
    let store = chain_store(&[("a", Some("b")), ("b", None)]);
    let mut configuration = Map::new();
    configuration.insert(
        "entity_import:b:page".to_string(),
        json!({ "file_id": ["/uploads/b.csv"] }),
    );

    let pipelines = resolve_ids(&store, "a", &configuration).unwrap();

    assert_eq!(
        pipelines[0].source.config_value("file_id"),
        Some(&json!(["/uploads/b.csv"]))
    );
    assert_eq!(pipelines[1].source.config_value("file_id"), None);
}
