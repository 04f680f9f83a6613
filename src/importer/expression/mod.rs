// ==========================================
// 表格数据导入工具 - 字段表达式
// ==========================================
// 职责: 受限表达式的解析与求值
// 语法: 字面量 / 列表 / 元组 / 字典 / 算术 / 比较 / 逻辑 / 条件表达式
// 调用: 仅允许 ref / vmap / noempty
// 红线: 不支持属性访问、下标与任意函数调用
// ==========================================

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{Expr, Helper};
pub use eval::{EvalError, Evaluator, RefResolver};
pub use value::{ObjectRef, Value};

use crate::importer::row_context::RowContext;
use thiserror::Error;

/// 表达式语法错误
#[derive(Error, Debug, Clone, PartialEq)]
#[error("第 {position} 个字符处: {message}")]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, message: String) -> Self {
        Self { position, message }
    }
}

// ==========================================
// CompiledExpression - 预编译表达式
// ==========================================
// 在解析 --field 参数时编译一次，每行重复求值
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    source: String,
    expr: Expr,
}

impl CompiledExpression {
    pub fn compile(source: &str) -> Result<Self, ParseError> {
        Ok(Self {
            source: source.to_string(),
            expr: parser::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// 在行上下文中求值
    pub fn evaluate<R: RefResolver + ?Sized>(
        &self,
        resolver: &R,
        context: &RowContext,
    ) -> Result<Value, EvalError> {
        Evaluator::new(resolver, context).evaluate(&self.expr)
    }

    /// ref() 中以字面量给出的模型路径
    pub fn referenced_models(&self) -> Vec<String> {
        self.expr.referenced_models()
    }
}
