// ==========================================
// 实体导入系统 - 命令行入口
// ==========================================
// 用法: entity-import [db_path] <importer_id> [bundle]
// 输出: 依赖在前的管道定义列表（JSON，stdout）
// 环境变量:
// - ENTITY_IMPORT_DB_PATH: 数据库路径（优先于参数）
// - ENTITY_IMPORT_LOG_FORMAT=json: JSON 日志
// - RUST_LOG: 日志级别
// ==========================================

use anyhow::{bail, Context};
use entity_import::api::EntityImporterApi;
use entity_import::logging;
use serde_json::Map;
use std::path::PathBuf;

const DB_PATH_ENV: &str = "ENTITY_IMPORT_DB_PATH";
const LOG_FORMAT_ENV: &str = "ENTITY_IMPORT_LOG_FORMAT";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => logging::init_json(),
        _ => logging::init(),
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (db_arg, importer_id, bundle) = match args.as_slice() {
        [importer_id] => (None, importer_id.as_str(), None),
        [first, second] if db_path_from_env().is_some() => {
            (None, first.as_str(), Some(second.as_str()))
        }
        [db_path, importer_id] => (Some(db_path.as_str()), importer_id.as_str(), None),
        [db_path, importer_id, bundle] => {
            (Some(db_path.as_str()), importer_id.as_str(), Some(bundle.as_str()))
        }
        _ => bail!("用法: entity-import [db_path] <importer_id> [bundle]"),
    };

    let db_path = resolve_db_path(db_arg)?;
    tracing::info!(version = entity_import::VERSION, db_path = %db_path, "实体导入系统启动");

    let api = EntityImporterApi::from_db_path(&db_path)
        .await
        .with_context(|| format!("无法打开数据库: {}", db_path))?;

    let pipelines = api
        .dependency_pipelines(importer_id, bundle, true, None, &Map::new())
        .with_context(|| format!("管道解析失败: {}", importer_id))?;

    println!("{}", serde_json::to_string_pretty(&pipelines)?);
    Ok(())
}

/// 数据库路径: 环境变量 > 命令行参数 > 用户数据目录
fn resolve_db_path(arg: Option<&str>) -> anyhow::Result<String> {
    if let Some(path) = db_path_from_env() {
        return Ok(path);
    }

    if let Some(path) = arg {
        return Ok(path.to_string());
    }

    let mut path = PathBuf::from("./entity_import.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("entity-import");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("无法创建数据目录: {}", dir.display()))?;
        path = dir.join("entity_import.db");
    }
    Ok(path.to_string_lossy().into_owned())
}

/// 环境变量中的数据库路径（空白视为未设置）
fn db_path_from_env() -> Option<String> {
    non_blank(std::env::var(DB_PATH_ENV).ok())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
