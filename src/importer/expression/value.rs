// ==========================================
// 表格数据导入工具 - 表达式取值
// ==========================================
// 职责: 表达式求值的动态值类型及真值/相等/转换规则
// ==========================================

use crate::domain::types::DATETIME_FORMAT;
use crate::domain::CellValue;
use chrono::NaiveDateTime;
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// 对存储中对象的引用（ref() 的结果）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub model: String, // 模型路径（app.Model）
    pub id: i64,
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.model, self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(NaiveDateTime),
    Object(ObjectRef),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(BTreeMap<String, Value>),
}

/// 数值视图（布尔按整数参与运算）
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::DateTime(_) => "datetime",
            Value::Object(_) => "object",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
        }
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(*b as i64)),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// 真值判定：None / False / 0 / 0.0 / "" 与空集合为假
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::DateTime(_) | Value::Object(_) => true,
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.is_empty(),
        }
    }

    /// 相等判定（数值跨类型按大小比较，列表与元组互不相等）
    pub fn loose_eq(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return match (a, b) {
                (Number::Int(x), Number::Int(y)) => x == y,
                (x, y) => x.as_f64() == y.as_f64(),
            };
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, x)| b.get(k).map_or(false, |y| x.loose_eq(y)))
            }
            _ => false,
        }
    }

    /// 有序比较；类型不可比较时返回 None
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return match (a, b) {
                (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
                (x, y) => x.as_f64().partial_cmp(&y.as_f64()),
            };
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// 转为对象字段取值（对象引用转为其 id）
    pub fn to_json(&self) -> Json {
        match self {
            Value::None => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Str(s) => Json::String(s.clone()),
            Value::DateTime(dt) => Json::String(dt.format(DATETIME_FORMAT).to_string()),
            Value::Object(object) => Json::from(object.id),
            Value::List(items) | Value::Tuple(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Dict(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<CellValue> for Value {
    fn from(cell: CellValue) -> Self {
        match cell {
            CellValue::Empty => Value::None,
            CellValue::Bool(b) => Value::Bool(b),
            CellValue::Int(i) => Value::Int(i),
            CellValue::Float(f) => Value::Float(f),
            CellValue::Text(s) => Value::Str(s),
            CellValue::DateTime(dt) => Value::DateTime(dt),
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Str(s) => write!(f, "'{}'", s),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Object(object) => write!(f, "{}", object),
            Value::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Value::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::Dict(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{}': {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness_matches_falsy_set() {
        for falsy in [
            Value::None,
            Value::Bool(false),
            Value::Int(0),
            Value::Float(0.0),
            Value::Str(String::new()),
        ] {
            assert!(!falsy.is_truthy(), "{} should be falsy", falsy);
        }
        assert!(Value::Str(" ".to_string()).is_truthy());
        assert!(Value::Int(-1).is_truthy());
    }

    #[test]
    fn test_loose_eq_across_numeric_types() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Int(1)));
        assert!(!Value::Str("1".to_string()).loose_eq(&Value::Int(1)));
        assert!(!Value::List(vec![]).loose_eq(&Value::Tuple(vec![])));
    }

    #[test]
    fn test_to_json() {
        let object = Value::Object(ObjectRef {
            model: "example.Publisher".to_string(),
            id: 7,
        });
        assert_eq!(object.to_json(), json!(7));
        assert_eq!(
            Value::Tuple(vec![Value::Int(1), Value::None]).to_json(),
            json!([1, null])
        );
        assert_eq!(Value::Float(f64::NAN).to_json(), json!(null));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).to_string(), "(1,)");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Str("a".to_string()).to_string(), "'a'");
    }
}
