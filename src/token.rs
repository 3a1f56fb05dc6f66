//! The token definition for the filter language.

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Keywords
    And, // "and"
    Or,  // "or"

    // Literals
    /// A bare word: a field identifier or an unquoted literal value.
    /// Numbers, booleans and date-shaped text are typed later, by the parser.
    Word(&'a str),
    /// The content of a quoted string, without the surrounding quotes.
    QuotedString(&'a str),

    // Comparators
    Eq,          // ==
    NotEq,       // !=
    Like,        // ==~
    NotLike,     // !=~
    Gt,          // >
    Gte,         // >=
    Lt,          // <
    Lte,         // <=
    In,          // =in=
    Out,         // =out=
    Contains,    // =contains=
    NotContains, // =excludes=

    // Punctuation
    LParen, // (
    RParen, // )
    Comma,  // ,

    // Special
    Illegal(&'a str), // An illegal/unknown character sequence
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
