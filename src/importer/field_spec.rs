// ==========================================
// 表格数据导入工具 - 字段映射解析
// ==========================================
// 职责: 将 --field 参数解析为按 (app, model, group) 分组的模型定义
// 格式: [+]<app>.<Model>[.<group>].<field>:<表达式>
//   - 前缀 + 表示自然键组成字段（兼容 *）
//   - 同一字段仅能定义一次，集合字段（一对多/多对多）除外
// ==========================================

use crate::domain::{FieldKind, ModelMeta};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::expression::CompiledExpression;
use crate::repository::ModelCatalog;
use std::fmt;
use tracing::debug;

// ==========================================
// ModelKey - 模型定义键
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelKey {
    pub app: String,
    pub model: String,
    pub group: Option<String>,
}

impl ModelKey {
    /// 模型路径 `app.Model`（不含分组）
    pub fn model_path(&self) -> String {
        format!("{}.{}", self.app, self.model)
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}.{}.{}", self.app, self.model, group),
            None => write!(f, "{}.{}", self.app, self.model),
        }
    }
}

// ==========================================
// FieldDirective - 单条 --field 参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDirective {
    pub app: String,
    pub model: String,
    pub group: Option<String>,
    pub field: String,
    pub is_natural_key: bool,
    pub expression: String,
}

impl FieldDirective {
    /// 语法层面解析（不查询模型元数据）
    pub fn parse(raw: &str) -> ImportResult<Self> {
        let malformed = |message: &str| ImportError::MalformedDirective {
            directive: raw.to_string(),
            message: message.to_string(),
        };

        let (spec, expression) = raw
            .split_once(':')
            .ok_or_else(|| malformed("缺少 ':' 分隔的表达式"))?;
        if expression.trim().is_empty() {
            return Err(malformed("表达式为空"));
        }

        let spec = spec.trim();
        let (is_natural_key, spec) = match spec.strip_prefix('+').or_else(|| spec.strip_prefix('*')) {
            Some(rest) => (true, rest),
            None => (false, spec),
        };

        let (model_path, field) = spec
            .rsplit_once('.')
            .ok_or_else(|| malformed("期望 app.Model[.group].field"))?;

        let segments: Vec<&str> = model_path.split('.').collect();
        if field.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(malformed("存在空的路径段"));
        }

        let (app, model, group) = match segments.as_slice() {
            [app, model] => (*app, *model, None),
            [app, model, group] => (*app, *model, Some(group.to_string())),
            [_] => return Err(malformed("模型路径至少需要 app.Model 两段")),
            _ => return Err(malformed("模型路径段过多（最多 app.Model.group）")),
        };

        Ok(Self {
            app: app.to_string(),
            model: model.to_string(),
            group,
            field: field.to_string(),
            is_natural_key,
            expression: expression.to_string(),
        })
    }
}

// ==========================================
// FieldDescriptor / ModelDefinition
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub is_natural_key: bool,
    /// 集合字段可有多个表达式，其余字段恰好一个
    pub expressions: Vec<CompiledExpression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    pub key: ModelKey,
    pub meta: ModelMeta,
    pub fields: Vec<FieldDescriptor>, // 按首次出现顺序
}

impl ModelDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn natural_key_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_natural_key)
    }

    /// 非自然键、非集合字段（写入 defaults）
    pub fn default_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| !f.is_natural_key && !f.kind.is_collection())
    }

    pub fn collection_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.kind.is_collection())
    }

    /// 本定义中 ref() 引用到的模型路径
    pub fn referenced_models(&self) -> Vec<String> {
        let mut models: Vec<String> = Vec::new();
        for expression in self.fields.iter().flat_map(|f| &f.expressions) {
            for model in expression.referenced_models() {
                if !models.contains(&model) {
                    models.push(model);
                }
            }
        }
        models
    }
}

// ==========================================
// ModelRegistry - 模型定义集合（声明顺序）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRegistry {
    definitions: Vec<ModelDefinition>,
}

impl ModelRegistry {
    pub fn get(&self, key: &ModelKey) -> Option<&ModelDefinition> {
        self.definitions.iter().find(|d| d.key == *key)
    }

    pub fn definitions(&self) -> &[ModelDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// 未显式标记自然键的模型：全部非集合字段作为自然键
    fn promote_natural_keys(&mut self) -> ImportResult<()> {
        for definition in &mut self.definitions {
            if definition.fields.iter().any(|f| f.is_natural_key) {
                continue;
            }
            for field in &mut definition.fields {
                field.is_natural_key = !field.kind.is_collection();
            }
            if !definition.fields.iter().any(|f| f.is_natural_key) {
                return Err(ImportError::MalformedDirective {
                    directive: definition.key.to_string(),
                    message: "模型只有集合字段，无法确定自然键".to_string(),
                });
            }
        }
        Ok(())
    }
}

// ==========================================
// FieldSpecParser
// ==========================================
pub struct FieldSpecParser<'c, C: ModelCatalog + ?Sized> {
    catalog: &'c C,
}

impl<'c, C: ModelCatalog + ?Sized> FieldSpecParser<'c, C> {
    pub fn new(catalog: &'c C) -> Self {
        Self { catalog }
    }

    /// 解析全部 --field 参数
    ///
    /// # 返回
    /// - 模型定义集合（自然键已补全）
    pub fn parse<S: AsRef<str>>(&self, directives: &[S]) -> ImportResult<ModelRegistry> {
        let mut registry = ModelRegistry::default();
        for raw in directives {
            self.apply(&mut registry, raw.as_ref())?;
        }
        registry.promote_natural_keys()?;

        debug!(models = registry.len(), "字段映射解析完成");
        Ok(registry)
    }

    fn apply(&self, registry: &mut ModelRegistry, raw: &str) -> ImportResult<()> {
        let directive = FieldDirective::parse(raw)?;
        let malformed = |message: String| ImportError::MalformedDirective {
            directive: raw.to_string(),
            message,
        };

        let meta = self
            .catalog
            .model(&directive.app, &directive.model)
            .ok_or_else(|| ImportError::UnknownModel {
                directive: raw.to_string(),
                model: format!("{}.{}", directive.app, directive.model),
            })?;
        let kind = self
            .catalog
            .field(meta, &directive.field)
            .ok_or_else(|| ImportError::UnknownField {
                directive: raw.to_string(),
                model: meta.path(),
                field: directive.field.clone(),
            })?
            .clone();

        if directive.is_natural_key && kind.is_collection() {
            return Err(malformed("集合字段不能作为自然键".to_string()));
        }

        let expression = CompiledExpression::compile(&directive.expression)
            .map_err(|e| malformed(format!("表达式错误: {}", e)))?;

        let key = ModelKey {
            app: meta.app.clone(),
            model: meta.name.clone(),
            group: directive.group.clone(),
        };
        let position = match registry.definitions.iter().position(|d| d.key == key) {
            Some(position) => position,
            None => {
                registry.definitions.push(ModelDefinition {
                    key,
                    meta: meta.clone(),
                    fields: Vec::new(),
                });
                registry.definitions.len() - 1
            }
        };
        let definition = &mut registry.definitions[position];

        match definition.fields.iter_mut().find(|f| f.name == directive.field) {
            Some(existing) if kind.is_collection() => existing.expressions.push(expression),
            Some(_) => return Err(malformed("字段重复定义".to_string())),
            None => definition.fields.push(FieldDescriptor {
                name: directive.field,
                kind,
                is_natural_key: directive.is_natural_key,
                expressions: vec![expression],
            }),
        }
        Ok(())
    }
}
