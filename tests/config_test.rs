// ==========================================
// 配置集成测试
// ==========================================
// 测试目标: config_kv 与命令行参数的合并，以及配置与对象存储共用一个库
// ==========================================

mod test_helpers;

use sheet_importer::config::{config_keys, CliOverrides, ConfigManager, ImportSettings};
use sheet_importer::domain::SchemaRegistry;
use sheet_importer::importer::{ModelOrder, SheetSelector};
use sheet_importer::SqliteObjectStore;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use test_helpers::BOOK_SCHEMA;

fn stored_config(db_path: &str) -> ConfigManager {
    let config = ConfigManager::new(db_path).unwrap();
    config
        .set_global_config_value(config_keys::SCHEMA_PATH, "/etc/sheet-importer/models.json")
        .unwrap();
    config
        .set_global_config_value(config_keys::MODEL_ORDER, "dependency")
        .unwrap();
    config
        .set_global_config_value(config_keys::DEFAULT_SHEET, "Books")
        .unwrap();
    config
        .set_global_config_value(config_keys::ASSUME_YES, "true")
        .unwrap();
    config
}

#[test]
fn test_stored_config_applies_without_cli_values() {
    let db = NamedTempFile::new().unwrap();
    let db_path = db.path().to_string_lossy().to_string();
    let config = stored_config(&db_path);

    let settings = ImportSettings::resolve(CliOverrides::default(), &config).unwrap();

    assert_eq!(
        settings.schema_path,
        PathBuf::from("/etc/sheet-importer/models.json")
    );
    assert_eq!(settings.order, ModelOrder::Dependency);
    assert_eq!(settings.sheet, SheetSelector::Name("Books".to_string()));
    assert!(settings.assume_yes);
    assert_eq!(settings.locale, "zh-CN");
}

#[test]
fn test_cli_values_override_stored_config() {
    let db = NamedTempFile::new().unwrap();
    let db_path = db.path().to_string_lossy().to_string();
    let config = stored_config(&db_path);

    let cli = CliOverrides {
        schema_path: Some(PathBuf::from("models.json")),
        sheet: Some("1".to_string()),
        order: Some(ModelOrder::Declaration),
        locale: Some("en".to_string()),
        ..Default::default()
    };
    let settings = ImportSettings::resolve(cli, &config).unwrap();

    assert_eq!(settings.schema_path, PathBuf::from("models.json"));
    assert_eq!(settings.sheet, SheetSelector::Index(1));
    assert_eq!(settings.order, ModelOrder::Declaration);
    assert_eq!(settings.locale, "en");
    // --yes 为开关参数，未给出时沿用配置
    assert!(settings.assume_yes);
}

#[test]
fn test_config_and_object_store_share_database() {
    let db = NamedTempFile::new().unwrap();
    let db_path = db.path().to_string_lossy().to_string();
    drop(stored_config(&db_path));

    let schema = SchemaRegistry::from_json_str(BOOK_SCHEMA).unwrap();
    let store = SqliteObjectStore::open(&db_path, schema).unwrap();
    let stored: String = store
        .connection()
        .query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            [config_keys::MODEL_ORDER],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, "dependency");
}
