// ==========================================
// 表格数据导入工具 - 对象模型元数据
// ==========================================
// 职责: 描述可导入的模型及其字段类型（标量/引用/集合）
// 来源: JSON 模型定义文件
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// 模型定义文件错误
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("模型定义文件读取失败 ({path}): {message}")]
    ReadError { path: String, message: String },

    #[error("模型定义文件格式错误: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("模型路径无效: {0}（期望 app.Model）")]
    InvalidModelPath(String),

    #[error("字段名 id 为保留字段: {model}")]
    ReservedField { model: String },

    #[error("字段 {model}.{field} 引用了不存在的模型 {target}")]
    UnknownTarget {
        model: String,
        field: String,
        target: String,
    },

    #[error("字段 {model}.{field} 的 remote_field={remote_field} 必须是 {target} 上指向 {model} 的引用字段")]
    InvalidRemoteField {
        model: String,
        field: String,
        target: String,
        remote_field: String,
    },
}

// ==========================================
// FieldKind - 字段类型
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// 标量字段（文本/数值/布尔/日期）
    Scalar,
    /// 单值引用（外键）
    Reference { target: String },
    /// 一对多反向集合：子对象的 remote_field 指向本对象
    OneToMany { target: String, remote_field: String },
    /// 多对多集合
    ManyToMany { target: String },
}

impl FieldKind {
    /// 是否为集合字段（一对多 / 多对多）
    pub fn is_collection(&self) -> bool {
        matches!(self, FieldKind::OneToMany { .. } | FieldKind::ManyToMany { .. })
    }

    /// 关联的目标模型路径
    pub fn target(&self) -> Option<&str> {
        match self {
            FieldKind::Scalar => None,
            FieldKind::Reference { target }
            | FieldKind::OneToMany { target, .. }
            | FieldKind::ManyToMany { target } => Some(target),
        }
    }
}

// ==========================================
// ModelMeta - 模型元数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMeta {
    pub app: String,                         // 应用名
    pub name: String,                        // 模型名
    pub fields: BTreeMap<String, FieldKind>, // 字段名 → 字段类型
}

impl ModelMeta {
    /// 模型路径 `app.Model`
    pub fn path(&self) -> String {
        format!("{}.{}", self.app, self.name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldKind> {
        self.fields.get(name)
    }

    /// 多对多字段名列表（按名称排序）
    pub fn many_to_many_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, kind)| matches!(kind, FieldKind::ManyToMany { .. }))
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Deserialize)]
struct SchemaDocument {
    models: BTreeMap<String, ModelDocument>,
}

#[derive(Deserialize)]
struct ModelDocument {
    #[serde(default)]
    fields: BTreeMap<String, FieldKind>,
}

// ==========================================
// SchemaRegistry - 模型注册表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    models: BTreeMap<String, ModelMeta>, // 模型路径 → 元数据
}

impl SchemaRegistry {
    /// 从 JSON 文本加载并校验
    pub fn from_json_str(raw: &str) -> Result<Self, SchemaError> {
        let document: SchemaDocument = serde_json::from_str(raw)?;

        let mut models = BTreeMap::new();
        for (path, model_doc) in document.models {
            let (app, name) = split_model_path(&path)?;
            if model_doc.fields.contains_key("id") {
                return Err(SchemaError::ReservedField { model: path });
            }
            let meta = ModelMeta {
                app: app.to_string(),
                name: name.to_string(),
                fields: model_doc.fields,
            };
            models.insert(meta.path(), meta);
        }

        let registry = Self { models };
        registry.validate()?;
        Ok(registry)
    }

    /// 从文件加载
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| SchemaError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    /// 按 app + 模型名查找（模型名精确匹配优先，其次忽略大小写）
    pub fn resolve(&self, app: &str, model: &str) -> Option<&ModelMeta> {
        self.models.get(&format!("{}.{}", app, model)).or_else(|| {
            self.models
                .values()
                .find(|m| m.app == app && m.name.eq_ignore_ascii_case(model))
        })
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelMeta> {
        self.models.values()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for meta in self.models.values() {
            for (field, kind) in &meta.fields {
                let Some(target) = kind.target() else {
                    continue;
                };
                let target_meta = self.models.get(target).ok_or_else(|| SchemaError::UnknownTarget {
                    model: meta.path(),
                    field: field.clone(),
                    target: target.to_string(),
                })?;

                if let FieldKind::OneToMany { remote_field, .. } = kind {
                    let points_back = matches!(
                        target_meta.field(remote_field),
                        Some(FieldKind::Reference { target }) if *target == meta.path()
                    );
                    if !points_back {
                        return Err(SchemaError::InvalidRemoteField {
                            model: meta.path(),
                            field: field.clone(),
                            target: target.to_string(),
                            remote_field: remote_field.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// 拆分 `app.Model` 模型路径
pub fn split_model_path(path: &str) -> Result<(&str, &str), SchemaError> {
    match path.split_once('.') {
        Some((app, name)) if !app.is_empty() && !name.is_empty() && !name.contains('.') => {
            Ok((app, name))
        }
        _ => Err(SchemaError::InvalidModelPath(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY_SCHEMA: &str = r#"{
        "models": {
            "example.Publisher": { "fields": { "name": { "kind": "scalar" } } },
            "example.Book": { "fields": {
                "title": { "kind": "scalar" },
                "publisher": { "kind": "reference", "target": "example.Publisher" },
                "chapters": { "kind": "one_to_many", "target": "example.Chapter", "remote_field": "book" }
            } },
            "example.Chapter": { "fields": {
                "name": { "kind": "scalar" },
                "book": { "kind": "reference", "target": "example.Book" }
            } }
        }
    }"#;

    #[test]
    fn test_load_schema() {
        let registry = SchemaRegistry::from_json_str(LIBRARY_SCHEMA).unwrap();
        let book = registry.resolve("example", "Book").unwrap();
        assert_eq!(book.path(), "example.Book");
        assert_eq!(
            book.field("publisher"),
            Some(&FieldKind::Reference {
                target: "example.Publisher".to_string()
            })
        );
        assert!(book.field("chapters").unwrap().is_collection());
    }

    #[test]
    fn test_resolve_model_name_ignores_case() {
        let registry = SchemaRegistry::from_json_str(LIBRARY_SCHEMA).unwrap();
        assert_eq!(registry.resolve("example", "book").unwrap().name, "Book");
        assert!(registry.resolve("Example", "Book").is_none());
    }

    #[test]
    fn test_unknown_target_rejected() {
        let raw = r#"{"models": {"a.B": {"fields": {"c": {"kind": "reference", "target": "a.Missing"}}}}}"#;
        let err = SchemaRegistry::from_json_str(raw).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownTarget { .. }));
    }

    #[test]
    fn test_remote_field_must_point_back() {
        let raw = r#"{"models": {
            "a.Parent": {"fields": {"kids": {"kind": "one_to_many", "target": "a.Kid", "remote_field": "name"}}},
            "a.Kid": {"fields": {"name": {"kind": "scalar"}}}
        }}"#;
        let err = SchemaRegistry::from_json_str(raw).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidRemoteField { .. }));
    }

    #[test]
    fn test_reserved_id_field() {
        let raw = r#"{"models": {"a.B": {"fields": {"id": {"kind": "scalar"}}}}}"#;
        assert!(matches!(
            SchemaRegistry::from_json_str(raw),
            Err(SchemaError::ReservedField { .. })
        ));
    }

    #[test]
    fn test_split_model_path() {
        assert_eq!(split_model_path("example.Book").unwrap(), ("example", "Book"));
        assert!(split_model_path("Book").is_err());
        assert!(split_model_path("a.b.c").is_err());
        assert!(split_model_path(".Book").is_err());
    }
}
