// ==========================================
// 表格数据导入工具 - 表达式语法树
// ==========================================

use std::fmt;

/// 字面量
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// 可调用的辅助函数（白名单）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Helper {
    /// ref(模型路径, **条件) → 对象 | None
    Ref,
    /// vmap(输入, (源, 目标), ...) → 映射值
    Vmap,
    /// noempty(值) → 值；空字符串时忽略对象
    NoEmpty,
}

impl Helper {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ref" => Some(Helper::Ref),
            "vmap" => Some(Helper::Vmap),
            "noempty" => Some(Helper::NoEmpty),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Helper::Ref => "ref",
            Helper::Vmap => "vmap",
            Helper::NoEmpty => "noempty",
        }
    }
}

impl fmt::Display for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// 行变量（列字母）
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    /// 字典字面量（键为字符串，保持书写顺序）
    Dict(Vec<(String, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `then if condition else otherwise`
    Conditional {
        then: Box<Expr>,
        condition: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        helper: Helper,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
}

impl Expr {
    /// 收集 ref() 调用中以字符串字面量给出的模型路径
    pub fn referenced_models(&self) -> Vec<String> {
        let mut models = Vec::new();
        self.collect_refs(&mut models);
        models
    }

    fn collect_refs(&self, out: &mut Vec<String>) {
        match self {
            Expr::Literal(_) | Expr::Name(_) => {}
            Expr::List(items) | Expr::Tuple(items) => {
                items.iter().for_each(|item| item.collect_refs(out));
            }
            Expr::Dict(entries) => {
                entries.iter().for_each(|(_, value)| value.collect_refs(out));
            }
            Expr::Unary { operand, .. } => operand.collect_refs(out),
            Expr::Binary { left, right, .. }
            | Expr::Compare { left, right, .. }
            | Expr::Logical { left, right, .. } => {
                left.collect_refs(out);
                right.collect_refs(out);
            }
            Expr::Conditional {
                then,
                condition,
                otherwise,
            } => {
                then.collect_refs(out);
                condition.collect_refs(out);
                otherwise.collect_refs(out);
            }
            Expr::Call {
                helper,
                args,
                kwargs,
            } => {
                if *helper == Helper::Ref {
                    if let Some(Expr::Literal(Literal::Str(path))) = args.first() {
                        if !out.contains(path) {
                            out.push(path.clone());
                        }
                    }
                }
                args.iter().for_each(|arg| arg.collect_refs(out));
                kwargs.iter().for_each(|(_, value)| value.collect_refs(out));
            }
        }
    }
}
