// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的对象存储初始化、CSV 文件生成、确认桩等功能
// ==========================================

#![allow(dead_code)]

use serde_json::Value as Json;
use sheet_importer::domain::{FieldMap, ObjectRecord, SchemaRegistry};
use sheet_importer::importer::{
    run_import, ConsoleReporter, ImportRequest, ImportResult, UserConfirmation,
};
use sheet_importer::{ImportSummary, ObjectStore, SqliteObjectStore};
use std::cell::Cell;
use std::error::Error;
use std::io::{self, Write};
use tempfile::{Builder, NamedTempFile};

/// 图书示例的对象模型
pub const BOOK_SCHEMA: &str = r#"{
    "models": {
        "example.Publisher": { "fields": {
            "name": { "kind": "scalar" },
            "country": { "kind": "scalar" }
        } },
        "example.Author": { "fields": {
            "email": { "kind": "scalar" },
            "first_name": { "kind": "scalar" }
        } },
        "example.Book": { "fields": {
            "title": { "kind": "scalar" },
            "price": { "kind": "scalar" },
            "publisher": { "kind": "reference", "target": "example.Publisher" },
            "authors": { "kind": "many_to_many", "target": "example.Author" },
            "chapters": { "kind": "one_to_many", "target": "example.Chapter", "remote_field": "book" }
        } },
        "example.Chapter": { "fields": {
            "name": { "kind": "scalar" },
            "book": { "kind": "reference", "target": "example.Book" }
        } }
    }
}"#;

/// 创建临时数据库上的对象存储
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - SqliteObjectStore: 已初始化表结构的对象存储
pub fn create_test_store() -> Result<(NamedTempFile, SqliteObjectStore), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_string_lossy().to_string();

    let schema = SchemaRegistry::from_json_str(BOOK_SCHEMA)?;
    let store = SqliteObjectStore::open(&db_path, schema)?;

    Ok((temp_file, store))
}

/// 写入临时 CSV 文件
pub fn write_csv(content: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = Builder::new().suffix(".csv").tempfile()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// 构建导入参数
pub fn request(ranges: &[&str], fields: &[&str]) -> ImportRequest {
    ImportRequest {
        ranges: ranges.iter().map(|s| s.to_string()).collect(),
        fields: fields.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

/// 固定应答的确认桩（记录询问次数）
pub struct ScriptedConfirmation {
    answer: bool,
    asked: Cell<usize>,
}

impl ScriptedConfirmation {
    pub fn accept() -> Self {
        Self {
            answer: true,
            asked: Cell::new(0),
        }
    }

    pub fn decline() -> Self {
        Self {
            answer: false,
            asked: Cell::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.get()
    }
}

impl UserConfirmation for ScriptedConfirmation {
    fn confirm(&self, _prompt: &str) -> io::Result<bool> {
        self.asked.set(self.asked.get() + 1);
        Ok(self.answer)
    }
}

/// 执行导入并返回结果与报告文本
pub fn import_csv(
    store: &SqliteObjectStore,
    csv: &NamedTempFile,
    request: &ImportRequest,
    confirmation: &ScriptedConfirmation,
) -> (ImportResult<ImportSummary>, String) {
    let mut reporter = ConsoleReporter::new(Vec::new());
    let result = run_import(store, csv.path(), request, &mut reporter, confirmation);
    let report = String::from_utf8_lossy(&reporter.into_inner()).to_string();
    (result, report)
}

/// 按单个字段查找对象
pub fn find_by(
    store: &SqliteObjectStore,
    model_path: &str,
    field: &str,
    value: Json,
) -> Option<ObjectRecord> {
    let (app, model) = model_path.split_once('.')?;
    let meta = store.schema().resolve(app, model)?;
    let mut filters = FieldMap::new();
    filters.insert(field.to_string(), value);
    store.find_one(meta, &filters).ok().flatten()
}

/// 统计某模型的对象数
pub fn count_objects(store: &SqliteObjectStore, model_path: &str) -> i64 {
    store
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM object_record WHERE model = ?1",
            [model_path],
            |row| row.get(0),
        )
        .unwrap_or(-1)
}

/// 统计已记录的导入会话数
pub fn count_sessions(store: &SqliteObjectStore) -> i64 {
    store
        .connection()
        .query_row("SELECT COUNT(*) FROM import_session", [], |row| row.get(0))
        .unwrap_or(-1)
}

/// 预置一个对象（不经过导入会话）
pub fn seed(store: &SqliteObjectStore, model_path: &str, fields: &[(&str, Json)]) -> ObjectRecord {
    let (app, model) = model_path.split_once('.').expect("model path");
    let meta = store.schema().resolve(app, model).expect("model exists");
    let key: FieldMap = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    store
        .upsert(meta, &key, &FieldMap::new())
        .expect("seed object")
        .0
}
