//! Console tokenizer built on a `regal` generated lexer.

use core::fmt;
use core::ops::Range;

use heapless::Vec;
use regal::{IncrementalError, TokenCache};
use regal_macros::RegalLexer;

/// Byte range of a token inside the console line.
pub type Span = Range<usize>;

/// Longest line, in tokens, the console accepts.
pub const LINE_TOKEN_LIMIT: usize = 24;

#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// `150ms`, `20s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    #[regex(r"-?[0-9]+")]
    Number,
    /// Command names, keywords and help topics; matched case-insensitively.
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Word,
    #[token("=")]
    Assign,
    #[regex(r"[ \t]+", skip)]
    Blank,
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    LineEnd,
    /// Anything the console does not understand.
    #[default]
    #[regex(r".", priority = 1024)]
    Stray,
}

impl TokenKind {
    pub(crate) const fn describe(self) -> &'static str {
        match self {
            TokenKind::Duration => "duration",
            TokenKind::Number => "number",
            TokenKind::Word => "word",
            TokenKind::Assign => "`=`",
            TokenKind::Blank => "blank",
            TokenKind::LineEnd => "end of line",
            TokenKind::Stray => "symbol",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

pub type Tokens<'a> = Vec<Token<'a>, LINE_TOKEN_LIMIT>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexError {
    /// The line holds more than [`LINE_TOKEN_LIMIT`] tokens.
    Overflow,
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::Overflow => write!(f, "line longer than {LINE_TOKEN_LIMIT} tokens"),
            LexError::Engine => f.write_str("tokenizer failure"),
        }
    }
}

/// Splits `line` into tokens, dropping blanks.
///
/// Input the lexer cannot match is kept as a trailing [`TokenKind::Stray`]
/// token so the parser can point at it.
///
/// # Errors
///
/// [`LexError::Overflow`] for overly long lines, [`LexError::Engine`] when the
/// lexer itself fails.
pub fn tokenize(line: &str) -> Result<Tokens<'_>, LexError> {
    let mut cache: TokenCache<TokenKind, { LINE_TOKEN_LIMIT * 2 }> = TokenCache::new();
    let leftover = cache
        .rebuild(TokenKind::lexer(), line)
        .map_err(|error| match error {
            IncrementalError::TokenOverflow => LexError::Overflow,
            _ => LexError::Engine,
        })?;

    let mut tokens = Tokens::new();
    let mut keep = |kind, span: Span| {
        let text = &line[span.clone()];
        tokens
            .push(Token { kind, text, span })
            .map_err(|_| LexError::Overflow)
    };
    for record in cache.tokens() {
        if !record.skipped {
            keep(record.token, record.start..record.end)?;
        }
    }
    if let Some(partial) = leftover.filter(|partial| !partial.fragment.is_empty()) {
        keep(
            TokenKind::Stray,
            partial.start..partial.start + partial.fragment.len(),
        )?;
    }
    Ok(tokens)
}
