//! Lexer for placeholder bodies using logos

use logos::Logos;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\x0B\x0C]+")]
pub enum Token {
    // Boolean literals take precedence over names
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Delimiters
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("|")]
    Pipe,
    #[token("=")]
    Equals,

    // Literals
    #[regex(
        r"-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?",
        |lex| lex.slice().parse::<f64>().ok(),
        priority = 3
    )]
    Number(f64),

    /// JSON string, already unescaped
    #[regex(r#""([^"\\]|\\.)*""#, |lex| serde_json::from_str::<String>(lex.slice()).ok())]
    String(String),

    /// One token of a qualified name
    #[regex(r"[A-Za-z0-9_\-]+", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),
}

/// Lex input string into tokens with spans
///
/// Unrecognized input is reported as `Err(())` with its span instead of
/// being skipped.
pub fn lex(input: &str) -> impl Iterator<Item = (Result<Token, ()>, Span)> + '_ {
    Token::lexer(input).spanned()
}

/// Whether `text` lexes as exactly one name token rather than a literal
pub fn is_ident(text: &str) -> bool {
    let mut tokens = lex(text);
    match (tokens.next(), tokens.next()) {
        (Some((Ok(Token::Ident(_)), span)), None) => span == (0..text.len()),
        _ => false,
    }
}
