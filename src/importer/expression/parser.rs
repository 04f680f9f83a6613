// ==========================================
// 表格数据导入工具 - 表达式语法分析
// ==========================================
// 职责: 递归下降解析字段表达式
//
// 优先级（由低到高）:
//   a if c else b
//   or
//   and
//   not
//   == != < <= > >=（不支持链式比较）
//   + -
//   * / %
//   一元 -
//   字面量 / 变量 / 辅助函数调用 / 括号 / 列表 / 字典
// ==========================================

use super::ast::{BinaryOp, CompareOp, Expr, Helper, Literal, LogicalOp, UnaryOp};
use super::lexer::{Lexer, PositionedToken, Token};
use super::ParseError;

/// 保留字：不能作为变量名
const RESERVED: &[&str] = &[
    "and", "or", "not", "if", "else", "None", "True", "False", "in", "is", "lambda", "for",
];

/// 嵌套层数上限（括号、一元运算、条件分支、调用参数以及二元运算链共同计数）
pub const MAX_DEPTH: usize = 64;

static EOF: Token = Token::Eof;

/// 解析完整表达式
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser {
        tokens,
        index: 0,
        depth: 0,
    };
    let expr = parser.expression()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(parser.error(format!("多余的输入 {:?}", other))),
    }
}

struct Parser {
    tokens: Vec<PositionedToken>,
    index: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.index + offset)
            .or_else(|| self.tokens.last())
            .map(|t| &t.token)
            .unwrap_or(&EOF)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map_or(0, |t| t.position)
    }

    fn error(&self, message: String) -> ParseError {
        ParseError::new(self.position(), message)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() {
            self.index += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ParseError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error(format!("期望 {}，实际为 {:?}", what, self.peek())))
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(name) if name == keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// 超过嵌套上限时报错
    fn check_depth(&self, extra: usize) -> Result<(), ParseError> {
        if self.depth + extra > MAX_DEPTH {
            return Err(self.error(format!("表达式嵌套过深（上限 {} 层）", MAX_DEPTH)));
        }
        Ok(())
    }

    /// 在加深一层的状态下执行规则
    fn nested<T>(
        &mut self,
        rule: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.check_depth(1)?;
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    // ===== 语法规则 =====

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let then = self.disjunction()?;
        if !self.eat_keyword("if") {
            return Ok(then);
        }
        let condition = self.disjunction()?;
        if !self.eat_keyword("else") {
            return Err(self.error("条件表达式缺少 else".to_string()));
        }
        let otherwise = self.expression()?;
        Ok(Expr::Conditional {
            then: Box::new(then),
            condition: Box::new(condition),
            otherwise: Box::new(otherwise),
        })
    }

    fn disjunction(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.conjunction()?;
        let mut links = 0;
        while self.eat_keyword("or") {
            links += 1;
            self.check_depth(links)?;
            let right = self.conjunction()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn conjunction(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.inversion()?;
        let mut links = 0;
        while self.eat_keyword("and") {
            links += 1;
            self.check_depth(links)?;
            let right = self.inversion()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn inversion(&mut self) -> Result<Expr, ParseError> {
        if self.eat_keyword("not") {
            let operand = self.nested(Self::inversion)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn compare_op(&self) -> Option<CompareOp> {
        match self.peek() {
            Token::EqEq => Some(CompareOp::Eq),
            Token::NotEq => Some(CompareOp::NotEq),
            Token::Lt => Some(CompareOp::Lt),
            Token::Le => Some(CompareOp::Le),
            Token::Gt => Some(CompareOp::Gt),
            Token::Ge => Some(CompareOp::Ge),
            _ => None,
        }
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.sum()?;
        let Some(op) = self.compare_op() else {
            return Ok(left);
        };
        self.advance();
        let right = self.sum()?;
        if self.compare_op().is_some() {
            return Err(self.error("不支持链式比较".to_string()));
        }
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn sum(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.term()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            links += 1;
            self.check_depth(links)?;
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.factor()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            links += 1;
            self.check_depth(links)?;
            let right = self.factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Minus) {
            let operand = self.nested(Self::factor)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position();
        match self.advance() {
            Token::Int(i) => Ok(Expr::Literal(Literal::Int(i))),
            Token::Float(f) => Ok(Expr::Literal(Literal::Float(f))),
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::Ident(name) => self.name_or_call(name, position),
            Token::LParen => self.parenthesized(),
            Token::LBracket => {
                let items = self.sequence(Token::RBracket, "]")?;
                Ok(Expr::List(items))
            }
            Token::LBrace => self.dict(),
            Token::Eof => Err(ParseError::new(position, "表达式不完整".to_string())),
            other => Err(ParseError::new(position, format!("意外的记号 {:?}", other))),
        }
    }

    fn name_or_call(&mut self, name: String, position: usize) -> Result<Expr, ParseError> {
        match name.as_str() {
            "None" => return Ok(Expr::Literal(Literal::None)),
            "True" => return Ok(Expr::Literal(Literal::Bool(true))),
            "False" => return Ok(Expr::Literal(Literal::Bool(false))),
            _ => {}
        }
        if RESERVED.contains(&name.as_str()) {
            return Err(ParseError::new(position, format!("不支持的语法 '{}'", name)));
        }

        if self.peek() != &Token::LParen {
            return Ok(Expr::Name(name));
        }

        let helper = Helper::from_name(&name).ok_or_else(|| {
            ParseError::new(
                position,
                format!("不支持的函数调用 '{}'（仅支持 ref / vmap / noempty）", name),
            )
        })?;
        self.advance();
        self.call_arguments(helper)
    }

    fn call_arguments(&mut self, helper: Helper) -> Result<Expr, ParseError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();

        while self.peek() != &Token::RParen {
            let is_keyword_arg = matches!(
                (self.peek(), self.peek_at(1)),
                (Token::Ident(_), Token::Assign)
            );

            if is_keyword_arg {
                let key_position = self.position();
                let Token::Ident(key) = self.advance() else {
                    return Err(ParseError::new(key_position, "期望参数名".to_string()));
                };
                self.advance();
                if kwargs.iter().any(|(existing, _)| *existing == key) {
                    return Err(ParseError::new(key_position, format!("重复的参数 '{}'", key)));
                }
                let value = self.expression()?;
                kwargs.push((key, value));
            } else {
                if !kwargs.is_empty() {
                    return Err(self.error("位置参数不能出现在关键字参数之后".to_string()));
                }
                args.push(self.expression()?);
            }

            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen, ")")?;

        Ok(Expr::Call {
            helper,
            args,
            kwargs,
        })
    }

    /// `(` 之后：空元组 / 括号表达式 / 元组
    fn parenthesized(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::RParen) {
            return Ok(Expr::Tuple(Vec::new()));
        }
        let first = self.expression()?;
        if self.eat(&Token::RParen) {
            return Ok(first);
        }
        self.expect(Token::Comma, ", 或 )")?;

        let mut items = vec![first];
        items.extend(self.sequence(Token::RParen, ")")?);
        Ok(Expr::Tuple(items))
    }

    /// 逗号分隔的表达式序列，允许末尾逗号，消费结束记号
    fn sequence(&mut self, close: Token, what: &str) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        while self.peek() != &close {
            items.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(close, what)?;
        Ok(items)
    }

    fn dict(&mut self) -> Result<Expr, ParseError> {
        let mut entries: Vec<(String, Expr)> = Vec::new();
        while self.peek() != &Token::RBrace {
            let key_position = self.position();
            let Token::Str(key) = self.advance() else {
                return Err(ParseError::new(
                    key_position,
                    "字典键必须是字符串字面量".to_string(),
                ));
            };
            self.expect(Token::Colon, ":")?;
            let value = self.expression()?;
            entries.retain(|(existing, _)| *existing != key);
            entries.push((key, value));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBrace, "}")?;
        Ok(Expr::Dict(entries))
    }
}
