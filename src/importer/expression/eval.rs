// ==========================================
// 表格数据导入工具 - 表达式求值
// ==========================================
// 职责: 在行上下文中对字段表达式求值
// 环境: 行变量（列字母）+ 辅助函数 ref / vmap / noempty
// ==========================================

use super::ast::{BinaryOp, CompareOp, Expr, Helper, Literal, LogicalOp, UnaryOp};
use super::value::{Number, ObjectRef, Value};
use crate::domain::FieldMap;
use crate::importer::row_context::RowContext;
use crate::repository::{ObjectStore, RepositoryError};
use std::cmp::Ordering;
use thiserror::Error;

/// 表达式生成字符串的长度上限（字节）
pub const MAX_STRING_LEN: usize = 1 << 20;

/// 表达式运行期错误
#[derive(Error, Debug)]
pub enum EvalError {
    /// 跳过信号：当前对象在本行被忽略（不是错误）
    #[error("对象被忽略")]
    IgnoreObject,

    #[error("变量未定义: {0}")]
    UndefinedVariable(String),

    #[error("类型错误: {0}")]
    TypeError(String),

    #[error("除数为零")]
    DivisionByZero,

    #[error("{function}() 参数错误: {message}")]
    InvalidArguments { function: String, message: String },

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

// ==========================================
// RefResolver Trait
// ==========================================
// 用途: ref() 按条件查找对象
// 实现者: 所有 ObjectStore
pub trait RefResolver {
    fn resolve_ref(&self, model_path: &str, filters: &FieldMap)
        -> Result<Option<ObjectRef>, EvalError>;
}

impl<S: ObjectStore + ?Sized> RefResolver for S {
    fn resolve_ref(
        &self,
        model_path: &str,
        filters: &FieldMap,
    ) -> Result<Option<ObjectRef>, EvalError> {
        let meta = self
            .model_by_path(model_path)
            .ok_or_else(|| EvalError::InvalidArguments {
                function: Helper::Ref.name().to_string(),
                message: format!("模型不存在: {}", model_path),
            })?;

        Ok(self.find_one(meta, filters)?.map(|record| ObjectRef {
            model: record.model,
            id: record.id,
        }))
    }
}

// ==========================================
// Evaluator
// ==========================================
pub struct Evaluator<'a, R: RefResolver + ?Sized> {
    resolver: &'a R,
    context: &'a RowContext,
}

impl<'a, R: RefResolver + ?Sized> Evaluator<'a, R> {
    pub fn new(resolver: &'a R, context: &'a RowContext) -> Self {
        Self { resolver, context }
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::None => Value::None,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Str(s) => Value::Str(s.clone()),
            }),
            Expr::Name(name) => self
                .context
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
            Expr::List(items) => Ok(Value::List(self.evaluate_all(items)?)),
            Expr::Tuple(items) => Ok(Value::Tuple(self.evaluate_all(items)?)),
            Expr::Dict(entries) => {
                let mut dict = std::collections::BTreeMap::new();
                for (key, value) in entries {
                    dict.insert(key.clone(), self.evaluate(value)?);
                }
                Ok(Value::Dict(dict))
            }
            Expr::Unary { op, operand } => {
                let value = self.evaluate(operand)?;
                unary(*op, value)
            }
            Expr::Binary { op, left, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(*op, left, right)
            }
            Expr::Compare { op, left, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                compare(*op, &left, &right).map(Value::Bool)
            }
            Expr::Logical { op, left, right } => {
                let left = self.evaluate(left)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.evaluate(right),
                }
            }
            Expr::Conditional {
                then,
                condition,
                otherwise,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then)
                } else {
                    self.evaluate(otherwise)
                }
            }
            Expr::Call {
                helper,
                args,
                kwargs,
            } => self.call(*helper, args, kwargs),
        }
    }

    fn evaluate_all(&self, items: &[Expr]) -> Result<Vec<Value>, EvalError> {
        items.iter().map(|item| self.evaluate(item)).collect()
    }

    fn call(
        &self,
        helper: Helper,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> Result<Value, EvalError> {
        let invalid = |message: String| EvalError::InvalidArguments {
            function: helper.name().to_string(),
            message,
        };

        if helper != Helper::Ref && !kwargs.is_empty() {
            return Err(invalid("不接受关键字参数".to_string()));
        }
        let args = self.evaluate_all(args)?;

        match helper {
            Helper::Ref => {
                let model_path = match args.as_slice() {
                    [Value::Str(path)] => path,
                    _ => return Err(invalid("需要且仅需要一个模型路径字符串".to_string())),
                };
                let mut filters = FieldMap::new();
                for (field, expr) in kwargs {
                    filters.insert(field.clone(), self.evaluate(expr)?.to_json());
                }
                Ok(self
                    .resolver
                    .resolve_ref(model_path, &filters)?
                    .map_or(Value::None, Value::Object))
            }
            Helper::Vmap => {
                let Some((input, mappings)) = args.split_first() else {
                    return Err(invalid("缺少输入值".to_string()));
                };
                for mapping in mappings {
                    let pair = match mapping {
                        Value::Tuple(pair) | Value::List(pair) if pair.len() == 2 => pair,
                        other => {
                            return Err(invalid(format!("映射项必须是 (源, 目标)，实际为 {}", other)))
                        }
                    };
                    if input.loose_eq(&pair[0]) {
                        return Ok(pair[1].clone());
                    }
                }
                Ok(input.clone())
            }
            Helper::NoEmpty => match <[Value; 1]>::try_from(args) {
                Ok([Value::Str(s)]) if s.is_empty() => Err(EvalError::IgnoreObject),
                Ok([value]) => Ok(value),
                Err(_) => Err(invalid("需要且仅需要一个参数".to_string())),
            },
        }
    }
}

fn type_error(op: &str, left: &Value, right: &Value) -> EvalError {
    EvalError::TypeError(format!(
        "不支持的操作: {} {} {}",
        left.type_name(),
        op,
        right.type_name()
    ))
}

fn overflow() -> EvalError {
    EvalError::TypeError("整数溢出".to_string())
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Neg => match value.as_number() {
            Some(Number::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
            Some(Number::Float(f)) => Ok(Value::Float(-f)),
            None => Err(EvalError::TypeError(format!(
                "不支持的操作: -{}",
                value.type_name()
            ))),
        },
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
    };

    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return arithmetic(op, a, b);
    }

    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
            check_string_len(a.len().checked_add(b.len()))?;
            Ok(Value::Str(a + &b))
        }
        (BinaryOp::Add, Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (BinaryOp::Add, Value::Tuple(mut a), Value::Tuple(b)) => {
            a.extend(b);
            Ok(Value::Tuple(a))
        }
        (BinaryOp::Mul, Value::Str(s), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::Str(s)) => {
            let count = usize::try_from(n.max(0)).unwrap_or(usize::MAX);
            check_string_len(s.len().checked_mul(count))?;
            Ok(Value::Str(s.repeat(count)))
        }
        (_, left, right) => Err(type_error(symbol, &left, &right)),
    }
}

fn check_string_len(len: Option<usize>) -> Result<(), EvalError> {
    match len {
        Some(len) if len <= MAX_STRING_LEN => Ok(()),
        _ => Err(EvalError::TypeError(format!(
            "字符串长度超出上限 {} 字节",
            MAX_STRING_LEN
        ))),
    }
}

fn arithmetic(op: BinaryOp, a: Number, b: Number) -> Result<Value, EvalError> {
    if let (Number::Int(x), Number::Int(y)) = (a, b) {
        return match op {
            BinaryOp::Add => x.checked_add(y).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Sub => x.checked_sub(y).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mul => x.checked_mul(y).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Div if y == 0 => Err(EvalError::DivisionByZero),
            BinaryOp::Div => Ok(Value::Float(x as f64 / y as f64)),
            BinaryOp::Mod if y == 0 => Err(EvalError::DivisionByZero),
            BinaryOp::Mod => {
                let r = x.checked_rem(y).ok_or_else(overflow)?;
                // 余数符号跟随除数
                Ok(Value::Int(if r != 0 && (r < 0) != (y < 0) { r + y } else { r }))
            }
        };
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    match op {
        BinaryOp::Add => Ok(Value::Float(x + y)),
        BinaryOp::Sub => Ok(Value::Float(x - y)),
        BinaryOp::Mul => Ok(Value::Float(x * y)),
        BinaryOp::Div | BinaryOp::Mod if y == 0.0 => Err(EvalError::DivisionByZero),
        BinaryOp::Div => Ok(Value::Float(x / y)),
        BinaryOp::Mod => {
            let r = x % y;
            Ok(Value::Float(if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r }))
        }
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    let expect = |accepted: fn(Ordering) -> bool, symbol: &str| -> Result<bool, EvalError> {
        match left.compare(right) {
            Some(ordering) => Ok(accepted(ordering)),
            // NaN 参与比较
            None if left.as_number().is_some() && right.as_number().is_some() => Ok(false),
            None => Err(type_error(symbol, left, right)),
        }
    };

    match op {
        CompareOp::Eq => Ok(left.loose_eq(right)),
        CompareOp::NotEq => Ok(!left.loose_eq(right)),
        CompareOp::Lt => expect(Ordering::is_lt, "<"),
        CompareOp::Le => expect(Ordering::is_le, "<="),
        CompareOp::Gt => expect(Ordering::is_gt, ">"),
        CompareOp::Ge => expect(Ordering::is_ge, ">="),
    }
}
