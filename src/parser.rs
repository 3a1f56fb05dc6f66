//! Filter的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ 空输入 → Ok(None)  ("无Filter"，不同于非法输入)
//!   └─ parse_or() (递归下降解析)
//!        ├─ parse_and()
//!        │    ├─ parse_constraint()
//!        │    │    ├─ "(" → 分组表达式 (递归调用parse_or)
//!        │    │    └─ 比较表达式: 字段 比较符 参数
//!        │    │         ├─ =in= / =out= → "(" 字面值列表 ")"
//!        │    │         └─ 其他比较符 → 标量字面值
//!        │    └─ 遇到and时，继续解析右侧constraint
//!        └─ 遇到or时，继续解析右侧and表达式
//! ```
//!
//! ## 字面值类型判定
//!
//! 类型在这里一次性判定，后端编译器不再重新推断：
//! - 纯数字 → `Integer`
//! - 带一个小数点的数字 → `Double`
//! - `true` / `false`（不区分大小写）→ `Boolean`
//! - 匹配配置的日期/日期时间格式 → `DateTime`
//! - 其余（含引号字符串）→ `StringVal`

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::ast::{Expression, Operator, Value};
use crate::config::CompilerConfig;
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    fn at_position(message: String, span: Span) -> Self {
        Self { message, span: Some(span) }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.span {
            Some(span) => write!(f, "{} (位置 {}-{})", self.message, span.start, span.end),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// 解析一个Filter字符串
///
/// 空输入（或全空白）返回 `Ok(None)`，代表"无Filter"。
pub fn parse(input: &str, config: &CompilerConfig) -> Result<Option<Expression>, ParseError> {
    let tokens: Vec<Token> = Lexer::new(input).collect();
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut parser = Parser::new(&tokens, config);
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(ParseError::at_position(
            format!("Unexpected trailing input: {:?}", token.kind),
            token.span,
        ));
    }
    Ok(Some(expr))
}

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    config: &'a CompilerConfig,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>], config: &'a CompilerConfig) -> Self {
        Self { tokens, position: 0, config }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&Token<'a>> {
        if self.position < self.tokens.len() {
            let token = &self.tokens[self.position];
            self.position += 1;
            Some(token)
        } else {
            None
        }
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, expected: TokenKind) -> Result<&Token<'a>, ParseError> {
        match self.peek() {
            Some(token) if token.kind == expected => Ok(self.advance().unwrap()),
            Some(token) => Err(ParseError::at_position(
                format!("Expected {:?}, found {:?}", expected, token.kind),
                token.span,
            )),
            None => Err(ParseError::new(
                format!("Expected {:?}, but reached end of input", expected),
                None,
            )),
        }
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: &TokenKind) -> bool {
        matches!(self.peek(), Some(token) if token.kind == *kind)
    }

    /// 解析OR表达式 (最低优先级)
    ///
    /// 语法: `and_expr (or and_expr)*`
    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let mut items = vec![self.parse_and()?];

        while self.match_token(&TokenKind::Or) {
            self.advance(); // 消费 or
            items.push(self.parse_and()?);
        }

        if items.len() == 1 {
            Ok(items.pop().unwrap())
        } else {
            Ok(Expression::Or(items))
        }
    }

    /// 解析AND表达式
    ///
    /// 语法: `constraint (and constraint)*`
    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let mut items = vec![self.parse_constraint()?];

        while self.match_token(&TokenKind::And) {
            self.advance(); // 消费 and
            items.push(self.parse_constraint()?);
        }

        if items.len() == 1 {
            Ok(items.pop().unwrap())
        } else {
            Ok(Expression::And(items))
        }
    }

    /// 解析单个约束：分组表达式或比较表达式
    fn parse_constraint(&mut self) -> Result<Expression, ParseError> {
        if self.match_token(&TokenKind::LParen) {
            self.advance(); // 消费 (
            let expr = self.parse_or()?;
            self.expect(TokenKind::RParen)?;
            return Ok(expr);
        }
        self.parse_comparison()
    }

    /// 解析比较表达式: `字段 比较符 参数`
    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let field = match self.advance() {
            Some(Token { kind: TokenKind::Word(name), .. }) => name.to_string(),
            Some(token) => {
                return Err(ParseError::at_position(
                    format!("Expected field identifier, found {:?}", token.kind),
                    token.span,
                ));
            }
            None => {
                return Err(ParseError::new(
                    "Expected field identifier, but reached end of input".to_string(),
                    None,
                ));
            }
        };

        let operator = self.parse_operator()?;

        let value = if operator.takes_list() {
            self.parse_list_argument()?
        } else {
            self.parse_scalar_literal()?
        };

        Ok(Expression::Comparison { field, operator, value })
    }

    fn parse_operator(&mut self) -> Result<Operator, ParseError> {
        match self.advance() {
            Some(token) => match &token.kind {
                TokenKind::Eq => Ok(Operator::Equals),
                TokenKind::NotEq => Ok(Operator::NotEquals),
                TokenKind::Like => Ok(Operator::Like),
                TokenKind::NotLike => Ok(Operator::NotLike),
                TokenKind::Gt => Ok(Operator::GreaterThan),
                TokenKind::Gte => Ok(Operator::GreaterThanOrEquals),
                TokenKind::Lt => Ok(Operator::LessThan),
                TokenKind::Lte => Ok(Operator::LessThanOrEquals),
                TokenKind::In => Ok(Operator::In),
                TokenKind::Out => Ok(Operator::NotIn),
                TokenKind::Contains => Ok(Operator::Contains),
                TokenKind::NotContains => Ok(Operator::NotContains),
                TokenKind::Illegal(raw) => Err(ParseError::at_position(
                    format!("Unknown comparator `{}`", raw),
                    token.span,
                )),
                other => Err(ParseError::at_position(
                    format!("Expected comparator, found {:?}", other),
                    token.span,
                )),
            },
            None => Err(ParseError::new(
                "Expected comparator, but reached end of input".to_string(),
                None,
            )),
        }
    }

    /// 解析 `=in=` / `=out=` 的括号列表参数
    fn parse_list_argument(&mut self) -> Result<Value, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut values = Vec::new();

        if !self.match_token(&TokenKind::RParen) {
            loop {
                values.push(self.parse_scalar_literal()?);
                if self.match_token(&TokenKind::RParen) {
                    break;
                }
                self.expect(TokenKind::Comma)?;
            }
        }

        self.expect(TokenKind::RParen)?;
        Ok(Value::List(values))
    }

    /// 解析标量字面值并判定类型
    fn parse_scalar_literal(&mut self) -> Result<Value, ParseError> {
        // 克隆token，类型判定还要借用self上的配置
        match self.advance().cloned() {
            Some(token) => match token.kind {
                TokenKind::Word(w) => Ok(self.typed_word(w)),
                TokenKind::QuotedString(s) => Ok(self.typed_quoted(s)),
                TokenKind::LParen => Err(ParseError::at_position(
                    "List arguments are only allowed with =in= / =out=".to_string(),
                    token.span,
                )),
                TokenKind::Illegal(raw) => Err(ParseError::at_position(
                    format!("Malformed literal `{}`", raw),
                    token.span,
                )),
                other => Err(ParseError::at_position(
                    format!("Expected literal value, found {:?}", other),
                    token.span,
                )),
            },
            None => Err(ParseError::new(
                "Expected literal value, but reached end of input".to_string(),
                None,
            )),
        }
    }

    /// 裸词的类型判定
    fn typed_word(&self, w: &str) -> Value {
        if w.eq_ignore_ascii_case("true") {
            return Value::Boolean(true);
        }
        if w.eq_ignore_ascii_case("false") {
            return Value::Boolean(false);
        }
        if let Some(dt) = self.parse_date_shaped(w) {
            return Value::DateTime(dt);
        }
        if is_integer_shaped(w) {
            if let Ok(n) = w.parse::<i64>() {
                return Value::Integer(n);
            }
        }
        if is_double_shaped(w) {
            if let Ok(d) = w.parse::<f64>() {
                return Value::Double(d);
            }
        }
        Value::StringVal(w.to_string())
    }

    /// 引号字符串的类型判定：匹配日期格式的归为DateTime，其余为StringVal
    fn typed_quoted(&self, s: &str) -> Value {
        if let Some(dt) = self.parse_date_shaped(s) {
            return Value::DateTime(dt);
        }
        Value::StringVal(s.to_string())
    }

    fn parse_date_shaped(&self, s: &str) -> Option<NaiveDateTime> {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, &self.config.datetime_format) {
            return Some(dt);
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, &self.config.date_format) {
            return Some(d.and_time(NaiveTime::MIN));
        }
        None
    }
}

/// 纯数字（可带负号）
fn is_integer_shaped(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// 带且只带一个小数点的数字（可带负号）；`1.` 和 `.5` 也算数字
fn is_double_shaped(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    let Some((int_part, frac_part)) = body.split_once('.') else {
        return false;
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return false;
    }
    !frac_part.contains('.')
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.bytes().all(|b| b.is_ascii_digit())
}
