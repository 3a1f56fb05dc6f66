//! Filter的词法分析器
//!
//! 把RSQL风格的Filter字符串切分为token流。数字、布尔值和日期形状的
//! 裸词在这里一律作为 `Word` 输出，具体类型由语法分析器一次性判定。

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 跳过空白字符
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// 读取裸词（字段标识符或未加引号的字面值）
    ///
    /// 裸词可以包含字母、数字、下划线、连字符、点、冒号和星号，
    /// 因此 `sci-fi`、`1.5`、`2020-01-02` 和 `*Bale` 都是单个词。
    fn read_word(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '*') {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];
        let kind = match_keyword(literal);
        Token { kind, span: Span::new(start, self.position) }
    }

    /// 读取引号包围的字符串字面量（单引号或双引号）
    /// 注意：开始的引号已经被调用者消费
    fn read_string(&mut self, start: usize, quote: char) -> Token<'a> {
        let content_start = self.position;
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    let content = &self.input[content_start..self.position];
                    self.bump(); // 消费结束引号
                    return Token {
                        kind: TokenKind::QuotedString(content),
                        span: Span::new(start, self.position),
                    };
                }
                Some(_) => {
                    self.bump();
                }
                // 未闭合的字符串：整段输出为非法token，由语法分析器报错
                None => {
                    return Token {
                        kind: TokenKind::Illegal(&self.input[start..self.position]),
                        span: Span::new(start, self.position),
                    };
                }
            }
        }
    }

    /// 读取 `=` 开头的比较符
    ///
    /// 覆盖 `==`、`==~` 以及RSQL自定义比较符 `=in=`、`=out=`、
    /// `=contains=`、`=excludes=`
    fn read_eq_comparator(&mut self, start: usize) -> Token<'a> {
        if self.peek() == Some('=') {
            self.bump();
            if self.peek() == Some('~') {
                self.bump();
                return Token { kind: TokenKind::Like, span: Span::new(start, self.position) };
            }
            return Token { kind: TokenKind::Eq, span: Span::new(start, self.position) };
        }

        // `=word=` 形式的自定义比较符
        let word_start = self.position;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() {
                self.bump();
            } else {
                break;
            }
        }
        let word = &self.input[word_start..self.position];
        if !word.is_empty() && self.peek() == Some('=') {
            self.bump(); // 消费结尾的 '='
            let kind = match word {
                "in" => TokenKind::In,
                "out" => TokenKind::Out,
                "contains" => TokenKind::Contains,
                "excludes" => TokenKind::NotContains,
                _ => TokenKind::Illegal(&self.input[start..self.position]),
            };
            return Token { kind, span: Span::new(start, self.position) };
        }

        Token {
            kind: TokenKind::Illegal(&self.input[start..self.position]),
            span: Span::new(start, self.position),
        }
    }
}

fn match_keyword<'a>(s: &'a str) -> TokenKind<'a> {
    if s.eq_ignore_ascii_case("and") {
        TokenKind::And
    } else if s.eq_ignore_ascii_case("or") {
        TokenKind::Or
    } else {
        TokenKind::Word(s)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let start = self.position;

        let c = self.peek()?;

        let token = match c {
            '(' => {
                self.bump();
                Token { kind: TokenKind::LParen, span: Span::new(start, self.position) }
            }
            ')' => {
                self.bump();
                Token { kind: TokenKind::RParen, span: Span::new(start, self.position) }
            }
            ',' => {
                self.bump();
                Token { kind: TokenKind::Comma, span: Span::new(start, self.position) }
            }
            '=' => {
                self.bump();
                self.read_eq_comparator(start)
            }
            '!' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    if self.peek() == Some('~') {
                        self.bump();
                        Token { kind: TokenKind::NotLike, span: Span::new(start, self.position) }
                    } else {
                        Token { kind: TokenKind::NotEq, span: Span::new(start, self.position) }
                    }
                } else {
                    Token {
                        kind: TokenKind::Illegal(&self.input[start..self.position]),
                        span: Span::new(start, self.position),
                    }
                }
            }
            '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Token { kind: TokenKind::Gte, span: Span::new(start, self.position) }
                } else {
                    Token { kind: TokenKind::Gt, span: Span::new(start, self.position) }
                }
            }
            '<' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Token { kind: TokenKind::Lte, span: Span::new(start, self.position) }
                } else {
                    Token { kind: TokenKind::Lt, span: Span::new(start, self.position) }
                }
            }
            '\'' | '"' => {
                self.bump();
                self.read_string(start, c)
            }
            c if c.is_alphanumeric() || matches!(c, '_' | '*' | '-' | '.') => {
                self.bump();
                self.read_word(start)
            }
            _ => {
                self.bump();
                Token {
                    kind: TokenKind::Illegal(&self.input[start..self.position]),
                    span: Span::new(start, self.position),
                }
            }
        };
        Some(token)
    }
}
