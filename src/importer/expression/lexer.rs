// ==========================================
// 表格数据导入工具 - 表达式词法分析
// ==========================================
// 职责: 将字段表达式切分为带位置信息的记号
// ==========================================

use super::ParseError;

/// 记号
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    /// 标识符（含关键字 and/or/not/if/else/None/True/False）
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

/// 带位置信息的记号（position 为字符偏移）
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedToken {
    pub token: Token,
    pub position: usize,
}

pub struct Lexer {
    chars: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            position: 0,
        }
    }

    /// 切分全部输入，末尾追加 Eof
    pub fn tokenize(mut self) -> Result<Vec<PositionedToken>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.token == Token::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn next_token(&mut self) -> Result<PositionedToken, ParseError> {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.position += 1;
        }

        let start = self.position;
        let Some(ch) = self.peek() else {
            return Ok(PositionedToken {
                token: Token::Eof,
                position: start,
            });
        };

        let token = match ch {
            '0'..='9' => self.read_number()?,
            '.' if matches!(self.peek_next(), Some('0'..='9')) => self.read_number()?,
            '\'' | '"' => self.read_string(ch)?,
            c if c.is_alphabetic() || c == '_' => self.read_ident(),
            _ => self.read_symbol(ch)?,
        };

        Ok(PositionedToken {
            token,
            position: start,
        })
    }

    fn read_symbol(&mut self, ch: char) -> Result<Token, ParseError> {
        let two_char = |lexer: &mut Lexer, token: Token| {
            lexer.position += 2;
            token
        };
        let next = self.peek_next();
        let token = match (ch, next) {
            ('=', Some('=')) => two_char(self, Token::EqEq),
            ('!', Some('=')) => two_char(self, Token::NotEq),
            ('<', Some('=')) => two_char(self, Token::Le),
            ('>', Some('=')) => two_char(self, Token::Ge),
            _ => {
                let token = match ch {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    ',' => Token::Comma,
                    ':' => Token::Colon,
                    '=' => Token::Assign,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '<' => Token::Lt,
                    '>' => Token::Gt,
                    other => {
                        return Err(ParseError::new(
                            self.position,
                            format!("不支持的字符 '{}'", other),
                        ))
                    }
                };
                self.position += 1;
                token
            }
        };
        Ok(token)
    }

    fn read_ident(&mut self) -> Token {
        let start = self.position;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.position += 1;
        }
        Token::Ident(self.chars[start..self.position].iter().collect())
    }

    fn read_digits(&mut self, text: &mut String) {
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => text.push(c),
                '_' => {}
                _ => break,
            }
            self.position += 1;
        }
    }

    fn read_number(&mut self) -> Result<Token, ParseError> {
        let start = self.position;
        let mut text = String::new();
        let mut is_float = false;

        self.read_digits(&mut text);

        if self.peek() == Some('.') {
            is_float = true;
            text.push('.');
            self.position += 1;
            self.read_digits(&mut text);
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let mark = self.position;
            let mut exponent = String::from("e");
            self.position += 1;
            if let Some(sign @ ('+' | '-')) = self.peek() {
                exponent.push(sign);
                self.position += 1;
            }
            let digits_start = exponent.len();
            self.read_digits(&mut exponent);
            if exponent.len() == digits_start {
                // 不是指数，回退（如 `1e` 之后的标识符）
                self.position = mark;
            } else {
                is_float = true;
                text.push_str(&exponent);
            }
        }

        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| ParseError::new(start, format!("无效的数值 '{}'", text)))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| ParseError::new(start, format!("整数超出范围 '{}'", text)))
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, ParseError> {
        let start = self.position;
        self.position += 1;
        let mut value = String::new();

        loop {
            let Some(c) = self.peek() else {
                return Err(ParseError::new(start, "字符串未闭合".to_string()));
            };
            self.position += 1;

            if c == quote {
                return Ok(Token::Str(value));
            }
            if c != '\\' {
                value.push(c);
                continue;
            }

            let Some(escaped) = self.peek() else {
                return Err(ParseError::new(start, "字符串未闭合".to_string()));
            };
            self.position += 1;
            match escaped {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                '0' => value.push('\0'),
                '\\' | '\'' | '"' => value.push(escaped),
                other => {
                    value.push('\\');
                    value.push(other);
                }
            }
        }
    }
}
