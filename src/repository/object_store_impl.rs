// ==========================================
// 表格数据导入工具 - 对象存储实现（SQLite）
// ==========================================
// 职责: 实现 ObjectStore（使用 rusqlite）
// 存储: object_record（JSON 文档）/ object_relation（多对多）/ import_session
// 红线: Repository 不含映射规则，只做数据 CRUD
// ==========================================

use crate::db;
use crate::domain::schema::{FieldKind, ModelMeta, SchemaRegistry};
use crate::domain::{FieldMap, ImportSummary, ObjectRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::object_store::{ModelCatalog, ObjectStore};
use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value as Json;
use std::collections::HashSet;
use tracing::debug;

/// 字段名 → SQLite JSON 路径
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

/// JSON 值 → SQLite 绑定值（与 json_extract 的返回类型对齐）
fn json_to_sql(value: &Json) -> SqlValue {
    match value {
        Json::Null => SqlValue::Null,
        Json::Bool(b) => SqlValue::Integer(*b as i64),
        Json::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

// ==========================================
// SqliteObjectStore
// ==========================================
pub struct SqliteObjectStore {
    conn: Connection,
    schema: SchemaRegistry,
}

impl SqliteObjectStore {
    /// 基于已有连接创建（会应用统一 PRAGMA 并建表）
    pub fn new(conn: Connection, schema: SchemaRegistry) -> RepositoryResult<Self> {
        db::configure_sqlite_connection(&conn)?;
        db::init_schema(&conn)?;
        Ok(Self { conn, schema })
    }

    /// 打开数据库文件
    pub fn open(db_path: &str, schema: SchemaRegistry) -> RepositoryResult<Self> {
        Self::new(db::open_sqlite_connection(db_path)?, schema)
    }

    /// 打开内存数据库
    pub fn open_in_memory(schema: SchemaRegistry) -> RepositoryResult<Self> {
        Self::new(db::open_in_memory_connection()?, schema)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    fn meta_for(&self, object: &ObjectRecord) -> RepositoryResult<&ModelMeta> {
        self.model_by_path(&object.model)
            .ok_or_else(|| RepositoryError::UnknownModel(object.model.clone()))
    }

    fn relation_kind<'m>(meta: &'m ModelMeta, field: &str) -> RepositoryResult<&'m FieldKind> {
        match meta.field(field) {
            None => Err(RepositoryError::UnknownField {
                model: meta.path(),
                field: field.to_string(),
            }),
            Some(kind) if !kind.is_collection() => Err(RepositoryError::NotACollection {
                model: meta.path(),
                field: field.to_string(),
            }),
            Some(kind) => Ok(kind),
        }
    }

    /// 校验待写入字段：字段存在、非集合、引用目标存在且模型匹配
    fn validate_values(&self, meta: &ModelMeta, values: &FieldMap) -> RepositoryResult<()> {
        for (field, value) in values {
            match meta.field(field) {
                None => {
                    return Err(RepositoryError::UnknownField {
                        model: meta.path(),
                        field: field.clone(),
                    })
                }
                Some(kind) if kind.is_collection() => {
                    return Err(RepositoryError::FieldValueError {
                        field: format!("{}.{}", meta.path(), field),
                        message: "集合字段不能直接赋值".to_string(),
                    })
                }
                Some(FieldKind::Reference { target }) => {
                    self.check_reference(meta, field, target, value)?
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn check_reference(
        &self,
        meta: &ModelMeta,
        field: &str,
        target: &str,
        value: &Json,
    ) -> RepositoryResult<()> {
        if value.is_null() {
            return Ok(());
        }
        let field_name = format!("{}.{}", meta.path(), field);
        let id = value.as_i64().ok_or_else(|| RepositoryError::FieldValueError {
            field: field_name.clone(),
            message: format!("引用字段需要对象 id，实际为 {}", value),
        })?;

        let model: Option<String> = self
            .conn
            .query_row(
                "SELECT model FROM object_record WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match model {
            Some(model) if model == target => Ok(()),
            Some(model) => Err(RepositoryError::FieldValueError {
                field: field_name,
                message: format!("引用对象 {}#{} 不是 {}", model, id, target),
            }),
            None => Err(RepositoryError::ForeignKeyViolation(format!(
                "{} 引用的对象 {}#{} 不存在",
                field_name, target, id
            ))),
        }
    }

    fn select(
        &self,
        meta: &ModelMeta,
        filters: &FieldMap,
        limit: Option<usize>,
    ) -> RepositoryResult<Vec<ObjectRecord>> {
        let model_path = meta.path();
        let mut sql = String::from("SELECT id, data FROM object_record WHERE model = ?1");
        let mut values: Vec<SqlValue> = vec![SqlValue::Text(model_path.clone())];

        for (field, value) in filters {
            if field == "id" {
                values.push(json_to_sql(value));
                sql.push_str(&format!(" AND id IS ?{}", values.len()));
                continue;
            }
            match meta.field(field) {
                None => {
                    return Err(RepositoryError::UnknownField {
                        model: model_path,
                        field: field.clone(),
                    })
                }
                Some(kind) if kind.is_collection() => {
                    return Err(RepositoryError::InvalidFilter {
                        model: model_path,
                        field: field.clone(),
                    })
                }
                Some(_) => {}
            }
            values.push(SqlValue::Text(json_path(field)));
            let path_index = values.len();
            values.push(json_to_sql(value));
            sql.push_str(&format!(
                " AND json_extract(data, ?{}) IS ?{}",
                path_index,
                path_index + 1
            ));
        }

        sql.push_str(" ORDER BY id");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, data) = row?;
            records.push(ObjectRecord {
                id,
                model: model_path.clone(),
                fields: serde_json::from_str(&data)?,
            });
        }
        Ok(records)
    }

    fn insert_record(&self, meta: &ModelMeta, fields: FieldMap) -> RepositoryResult<ObjectRecord> {
        let now = Utc::now().to_rfc3339();
        let data = serde_json::to_string(&fields)?;
        self.conn.execute(
            "INSERT INTO object_record (model, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![meta.path(), data, now],
        )?;

        let record = ObjectRecord {
            id: self.conn.last_insert_rowid(),
            model: meta.path(),
            fields,
        };
        debug!(object = %record.label(), "对象已创建");
        Ok(record)
    }

    fn update_record(&self, record: &ObjectRecord) -> RepositoryResult<()> {
        let now = Utc::now().to_rfc3339();
        let data = serde_json::to_string(&record.fields)?;
        let affected = self.conn.execute(
            "UPDATE object_record SET data = ?1, updated_at = ?2 WHERE id = ?3",
            params![data, now, record.id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: record.model.clone(),
                id: record.id,
            });
        }
        Ok(())
    }

    fn load_record(&self, id: i64) -> RepositoryResult<ObjectRecord> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT model, data FROM object_record WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (model, data) = row.ok_or_else(|| RepositoryError::NotFound {
            entity: "object_record".to_string(),
            id,
        })?;
        Ok(ObjectRecord {
            id,
            model,
            fields: serde_json::from_str(&data)?,
        })
    }

    fn related_ids(&self, model: &str, field: &str, parent_id: i64) -> RepositoryResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT child_id FROM object_relation
             WHERE model = ?1 AND field = ?2 AND parent_id = ?3
             ORDER BY child_id",
        )?;
        let rows = stmt.query_map(params![model, field, parent_id], |row| row.get::<_, i64>(0))?;

        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }

    /// 建立多对多关联，返回是否为新关联
    fn link(&self, model: &str, field: &str, parent_id: i64, child_id: i64) -> RepositoryResult<bool> {
        let affected = self.conn.execute(
            "INSERT OR IGNORE INTO object_relation (model, field, parent_id, child_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![model, field, parent_id, child_id],
        )?;
        Ok(affected > 0)
    }

    fn ensure_child_model(child: &ObjectRecord, target: &str, field: &str) -> RepositoryResult<()> {
        if child.model != target {
            return Err(RepositoryError::FieldValueError {
                field: field.to_string(),
                message: format!("对象 {} 不是 {}", child.label(), target),
            });
        }
        Ok(())
    }
}

impl ModelCatalog for SqliteObjectStore {
    fn model(&self, app: &str, model: &str) -> Option<&ModelMeta> {
        self.schema.resolve(app, model)
    }
}

impl ObjectStore for SqliteObjectStore {
    fn find_one(
        &self,
        model: &ModelMeta,
        filters: &FieldMap,
    ) -> RepositoryResult<Option<ObjectRecord>> {
        Ok(self.select(model, filters, Some(1))?.into_iter().next())
    }

    fn find_all(&self, model: &ModelMeta, filters: &FieldMap) -> RepositoryResult<Vec<ObjectRecord>> {
        self.select(model, filters, None)
    }

    fn upsert(
        &self,
        model: &ModelMeta,
        key_filters: &FieldMap,
        defaults: &FieldMap,
    ) -> RepositoryResult<(ObjectRecord, bool)> {
        self.validate_values(model, key_filters)?;
        self.validate_values(model, defaults)?;

        match self.find_one(model, key_filters)? {
            Some(mut record) => {
                if !defaults.is_empty() {
                    for (field, value) in defaults {
                        record.fields.insert(field.clone(), value.clone());
                    }
                    self.update_record(&record)?;
                }
                Ok((record, false))
            }
            None => {
                let mut fields = key_filters.clone();
                for (field, value) in defaults {
                    fields.insert(field.clone(), value.clone());
                }
                Ok((self.insert_record(model, fields)?, true))
            }
        }
    }

    fn associate(
        &self,
        object: &ObjectRecord,
        relation_field: &str,
        children: &[i64],
    ) -> RepositoryResult<usize> {
        let meta = self.meta_for(object)?;
        let kind = Self::relation_kind(meta, relation_field)?;
        let field_name = format!("{}.{}", meta.path(), relation_field);

        let mut linked = 0;
        match kind {
            FieldKind::ManyToMany { target } => {
                for &child_id in children {
                    let child = self.load_record(child_id)?;
                    Self::ensure_child_model(&child, target, &field_name)?;
                    if self.link(&meta.path(), relation_field, object.id, child_id)? {
                        linked += 1;
                    }
                }
            }
            FieldKind::OneToMany {
                target,
                remote_field,
            } => {
                let parent = Json::from(object.id);
                for &child_id in children {
                    let mut child = self.load_record(child_id)?;
                    Self::ensure_child_model(&child, target, &field_name)?;
                    if child.fields.get(remote_field) != Some(&parent) {
                        child.fields.insert(remote_field.clone(), parent.clone());
                        self.update_record(&child)?;
                        linked += 1;
                    }
                }
            }
            _ => {
                return Err(RepositoryError::NotACollection {
                    model: meta.path(),
                    field: relation_field.to_string(),
                })
            }
        }
        Ok(linked)
    }

    fn create_if_absent(
        &self,
        object: &ObjectRecord,
        relation_field: &str,
        filters: &FieldMap,
        values: &FieldMap,
    ) -> RepositoryResult<(ObjectRecord, bool)> {
        let meta = self.meta_for(object)?;
        let kind = Self::relation_kind(meta, relation_field)?;
        let target_path = kind.target().unwrap_or_default();
        let target = self
            .model_by_path(target_path)
            .ok_or_else(|| RepositoryError::UnknownModel(target_path.to_string()))?;

        match kind {
            FieldKind::OneToMany { remote_field, .. } => {
                let parent = Json::from(object.id);
                let mut scoped = filters.clone();
                scoped.insert(remote_field.clone(), parent.clone());
                if let Some(existing) = self.find_one(target, &scoped)? {
                    return Ok((existing, false));
                }

                let mut fields = values.clone();
                fields.insert(remote_field.clone(), parent);
                self.validate_values(target, &fields)?;
                Ok((self.insert_record(target, fields)?, true))
            }
            _ => {
                let linked: HashSet<i64> = self
                    .related_ids(&meta.path(), relation_field, object.id)?
                    .into_iter()
                    .collect();
                if let Some(existing) = self
                    .find_all(target, filters)?
                    .into_iter()
                    .find(|candidate| linked.contains(&candidate.id))
                {
                    return Ok((existing, false));
                }

                self.validate_values(target, values)?;
                let child = self.insert_record(target, values.clone())?;
                self.link(&meta.path(), relation_field, object.id, child.id)?;
                Ok((child, true))
            }
        }
    }

    fn to_field_map(&self, object: &ObjectRecord) -> RepositoryResult<FieldMap> {
        let meta = self.meta_for(object)?;
        let mut map = self.load_record(object.id)?.fields;
        for field in meta.many_to_many_fields() {
            let ids = self.related_ids(&meta.path(), field, object.id)?;
            map.insert(field.to_string(), Json::from(ids));
        }
        Ok(map)
    }

    fn begin(&self) -> RepositoryResult<()> {
        self.conn
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    fn commit(&self) -> RepositoryResult<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    fn rollback(&self) -> RepositoryResult<()> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    fn record_session(&self, summary: &ImportSummary) -> RepositoryResult<()> {
        let summary_json = serde_json::to_string(&summary.models)?;
        self.conn.execute(
            "INSERT INTO import_session (
                session_id, source_file, sheet, rows_processed,
                started_at, finished_at, summary_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                summary.session_id,
                summary.source_file,
                summary.sheet,
                summary.rows_processed as i64,
                summary.started_at.to_rfc3339(),
                summary.finished_at.to_rfc3339(),
                summary_json,
            ],
        )?;
        Ok(())
    }
}
