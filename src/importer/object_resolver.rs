// ==========================================
// 表格数据导入工具 - 对象解析（按自然键 upsert）
// ==========================================
// 职责: 对单个模型定义在一行上求值并写入存储，产出新旧状态
// 流程:
//   1. 自然键求值（任一为假值 → 跳过，不访问存储写接口）
//   2. 其余非集合字段求值 → defaults
//   3. 集合字段求值（全部表达式在首次写入前完成）
//   4. 按自然键查找旧对象 → upsert → 关联集合 → 新状态快照
// 红线: noempty() 触发的忽略信号跳过整个对象，不产生部分写入
// ==========================================

use crate::domain::{FieldKind, FieldMap, ObjectChange, ObjectRecord};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::expression::{CompiledExpression, EvalError, Value};
use crate::importer::field_spec::{FieldDescriptor, ModelDefinition, ModelKey};
use crate::importer::row_context::RowContext;
use crate::repository::ObjectStore;
use serde_json::Value as Json;
use tracing::debug;

/// 集合字段的一个元素
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionItem {
    /// 已存在的对象（直接关联）
    Existing(i64),
    /// 字段取值（不存在时创建）
    New(FieldMap),
}

/// 解析完成的对象
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedObject {
    pub key: ModelKey,
    pub record: ObjectRecord,
    pub natural_key: FieldMap,
    pub defaults: FieldMap,
    pub old_state: Option<FieldMap>,
    pub new_state: FieldMap,
}

impl ResolvedObject {
    /// 生成报告行（含差异与分类）
    pub fn change(&self) -> ObjectChange {
        ObjectChange::new(
            self.key.to_string(),
            self.record.label(),
            self.natural_key.clone(),
            self.old_state.as_ref(),
            &self.new_state,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// 自然键为空或被忽略
    Skipped,
    Resolved(ResolvedObject),
}

/// 字段求值的中间结果
enum Evaluated<T> {
    Value(T),
    Ignored,
}

// ==========================================
// ObjectResolver
// ==========================================
pub struct ObjectResolver<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: ObjectStore + ?Sized> ObjectResolver<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// 在一行上解析一个模型定义
    ///
    /// # 返回
    /// - Resolution::Skipped: 自然键为假值或表达式触发忽略
    /// - Resolution::Resolved: 已写入存储的对象及其新旧状态
    pub fn resolve(
        &self,
        definition: &ModelDefinition,
        context: &RowContext,
    ) -> ImportResult<Resolution> {
        let row = context.row_number();

        // ===== 1. 自然键 =====
        let mut natural_key = FieldMap::new();
        let mut key_is_empty = false;
        for field in definition.natural_key_fields() {
            let value = match self.evaluate_single(definition, field, context)? {
                Evaluated::Value(value) => value,
                Evaluated::Ignored => return Ok(self.skipped(definition, row, "忽略")),
            };
            if !value.is_truthy() {
                key_is_empty = true;
            }
            natural_key.insert(
                field.name.clone(),
                self.field_value(definition, field, value, row)?,
            );
        }
        if key_is_empty {
            return Ok(self.skipped(definition, row, "自然键为空"));
        }

        // ===== 2. defaults =====
        let mut defaults = FieldMap::new();
        for field in definition.default_fields() {
            let value = match self.evaluate_single(definition, field, context)? {
                Evaluated::Value(value) => value,
                Evaluated::Ignored => return Ok(self.skipped(definition, row, "忽略")),
            };
            defaults.insert(
                field.name.clone(),
                self.field_value(definition, field, value, row)?,
            );
        }

        // ===== 3. 集合字段 =====
        let mut collections: Vec<(&FieldDescriptor, Vec<CollectionItem>)> = Vec::new();
        for field in definition.collection_fields() {
            let mut items = Vec::new();
            for expression in &field.expressions {
                match self.evaluate(definition, field, expression, context)? {
                    Evaluated::Value(value) => {
                        items.extend(self.collection_items(definition, field, value, row)?)
                    }
                    Evaluated::Ignored => return Ok(self.skipped(definition, row, "忽略")),
                }
            }
            collections.push((field, items));
        }

        // ===== 4. 写入 =====
        let old_record = self.store.find_one(&definition.meta, &natural_key)?;
        let old_state = match &old_record {
            Some(record) => Some(self.store.to_field_map(record)?),
            None => None,
        };

        let (record, _created) = self.store.upsert(&definition.meta, &natural_key, &defaults)?;

        for (field, items) in &collections {
            let existing: Vec<i64> = items
                .iter()
                .filter_map(|item| match item {
                    CollectionItem::Existing(id) => Some(*id),
                    CollectionItem::New(_) => None,
                })
                .collect();
            if !existing.is_empty() {
                self.store.associate(&record, &field.name, &existing)?;
            }
            for item in items {
                if let CollectionItem::New(values) = item {
                    self.store
                        .create_if_absent(&record, &field.name, values, values)?;
                }
            }
        }

        let new_state = self.store.to_field_map(&record)?;
        debug!(
            row = row,
            model = %definition.key,
            object = %record.label(),
            "对象已解析"
        );

        Ok(Resolution::Resolved(ResolvedObject {
            key: definition.key.clone(),
            record,
            natural_key,
            defaults,
            old_state,
            new_state,
        }))
    }

    fn skipped(&self, definition: &ModelDefinition, row: usize, reason: &str) -> Resolution {
        debug!(row = row, model = %definition.key, reason = reason, "对象已跳过");
        Resolution::Skipped
    }

    fn expression_error(
        definition: &ModelDefinition,
        field: &FieldDescriptor,
        row: usize,
        message: String,
    ) -> ImportError {
        ImportError::ExpressionError {
            row,
            model: definition.key.to_string(),
            field: field.name.clone(),
            message,
        }
    }

    fn evaluate(
        &self,
        definition: &ModelDefinition,
        field: &FieldDescriptor,
        expression: &CompiledExpression,
        context: &RowContext,
    ) -> ImportResult<Evaluated<Value>> {
        match expression.evaluate(self.store, context) {
            Ok(value) => Ok(Evaluated::Value(value)),
            Err(EvalError::IgnoreObject) => Ok(Evaluated::Ignored),
            Err(e) => Err(Self::expression_error(
                definition,
                field,
                context.row_number(),
                format!("{} (表达式: {})", e, expression.source()),
            )),
        }
    }

    fn evaluate_single(
        &self,
        definition: &ModelDefinition,
        field: &FieldDescriptor,
        context: &RowContext,
    ) -> ImportResult<Evaluated<Value>> {
        match field.expressions.first() {
            Some(expression) => self.evaluate(definition, field, expression, context),
            None => Ok(Evaluated::Value(Value::None)),
        }
    }

    /// 表达式结果 → 字段取值
    fn field_value(
        &self,
        definition: &ModelDefinition,
        field: &FieldDescriptor,
        value: Value,
        row: usize,
    ) -> ImportResult<Json> {
        let invalid = |message: String| Self::expression_error(definition, field, row, message);

        match &field.kind {
            FieldKind::Reference { target } => match value {
                Value::None => Ok(Json::Null),
                Value::Object(object) if object.model == *target => Ok(Json::from(object.id)),
                Value::Object(object) => Err(invalid(format!(
                    "引用字段需要 {} 对象，实际为 {}",
                    target, object
                ))),
                other => Err(invalid(format!(
                    "引用字段需要 ref() 的结果，实际为 {}",
                    other.type_name()
                ))),
            },
            _ => match value {
                Value::Object(_) | Value::List(_) | Value::Tuple(_) | Value::Dict(_) => Err(
                    invalid(format!("标量字段不接受 {} 类型的值", value.type_name())),
                ),
                other => Ok(other.to_json()),
            },
        }
    }

    /// 集合字段表达式结果 → 元素列表
    fn collection_items(
        &self,
        definition: &ModelDefinition,
        field: &FieldDescriptor,
        value: Value,
        row: usize,
    ) -> ImportResult<Vec<CollectionItem>> {
        let invalid = |message: String| Self::expression_error(definition, field, row, message);
        let target = field.kind.target().unwrap_or_default();

        let items = match value {
            Value::None => return Ok(Vec::new()),
            Value::List(items) | Value::Tuple(items) => items,
            other => {
                return Err(invalid(format!(
                    "集合字段需要列表，实际为 {}",
                    other.type_name()
                )))
            }
        };

        let mut collected = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(object) if object.model == target => {
                    collected.push(CollectionItem::Existing(object.id))
                }
                Value::Object(object) => {
                    return Err(invalid(format!(
                        "集合元素需要 {} 对象，实际为 {}",
                        target, object
                    )))
                }
                Value::Dict(entries) => collected.push(CollectionItem::New(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k, v.to_json()))
                        .collect(),
                )),
                // ref() 未命中
                Value::None => {}
                other => {
                    return Err(invalid(format!(
                        "集合元素需要对象或字段字典，实际为 {}",
                        other.type_name()
                    )))
                }
            }
        }
        Ok(collected)
    }
}
