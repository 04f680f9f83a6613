// ==========================================
// 表格数据导入工具 - 领域类型定义
// ==========================================
// 职责: 单元格取值 / 对象字段映射 / 存储对象记录
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 对象字段映射（字段名 → JSON 值）
///
/// 存储层、差异比较与报告统一使用此结构。
/// 引用字段保存被引用对象的 id（整数）。
pub type FieldMap = BTreeMap<String, serde_json::Value>;

/// 日期时间统一格式（存储/展示）
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// 单元格取值 (Cell Value)
// ==========================================
// 由行数据源产生，行上下文构建器消费
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,                   // 空单元格
    Bool(bool),              // 布尔
    Int(i64),                // 整数
    Float(f64),              // 浮点数
    Text(String),            // 文本（未清洗）
    DateTime(NaiveDateTime), // 日期时间
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

// ==========================================
// ObjectRecord - 存储中的对象
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: i64,          // 存储分配的代理主键
    pub model: String,    // 模型路径（app.Model）
    pub fields: FieldMap, // 标量与引用字段
}

impl ObjectRecord {
    /// 报告中使用的对象标签，如 `example.Book#3`
    pub fn label(&self) -> String {
        format!("{}#{}", self.model, self.id)
    }
}

/// 两个 JSON 值是否视为相等
///
/// 数值按大小比较（`5` 与 `5.0` 相等），其余按结构比较。
pub fn json_values_equal(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    use serde_json::Value as Json;
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
        (Json::Array(xs), Json::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_values_equal(x, y))
        }
        (Json::Object(xs), Json::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).map_or(false, |y| json_values_equal(x, y)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_numbers_compare_by_value() {
        assert!(json_values_equal(&json!(5), &json!(5.0)));
        assert!(!json_values_equal(&json!(5), &json!(6)));
        assert!(!json_values_equal(&json!("5"), &json!(5)));
    }

    #[test]
    fn test_json_nested_compare() {
        assert!(json_values_equal(&json!([1, 2.0]), &json!([1.0, 2])));
        assert!(json_values_equal(&json!({"a": 1}), &json!({"a": 1.0})));
        assert!(!json_values_equal(&json!({"a": 1}), &json!({"b": 1})));
    }

    #[test]
    fn test_record_label() {
        let record = ObjectRecord {
            id: 3,
            model: "example.Book".to_string(),
            fields: FieldMap::new(),
        };
        assert_eq!(record.label(), "example.Book#3");
    }
}
