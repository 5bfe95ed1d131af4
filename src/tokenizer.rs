//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer knows nothing about the grammar beyond recognising
//! keywords, operators and literals. Multi-character punctuators are matched
//! before single-character ones to avoid ambiguity.

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Keyword,
  Ident,
  Punctuator,
  Num,
  Float,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  pub loc: usize,
  pub len: usize,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(kind: TokenKind, loc: usize, len: usize, value: Option<i64>) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
    }
  }
}

pub const KEYWORDS: [&str; 10] = [
  "int", "float", "return", "if", "else", "for", "while", "do", "break", "continue",
];

const PUNCTUATORS: [&str; 41] = [
  "<<=", ">>=", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "^=", "|=", "<<", ">>", "<=", ">=",
  "==", "!=", "&&", "||", "{", "}", "(", ")", ";", ",", "?", ":", "+", "-", "*", "/", "%", "&",
  "|", "^", "~", "!", "<", ">", "=",
];

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if input[i..].starts_with("//") {
      i = input[i..].find('\n').map_or(bytes.len(), |end| i + end);
      continue;
    }

    if input[i..].starts_with("/*") {
      let Some(end) = input[i + 2..].find("*/") else {
        return Err(CompileError::lex_at(input, i, "unterminated comment"));
      };
      i += end + 4;
      continue;
    }

    if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
      let start = i;
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
        i += 1;
      }
      let text = &input[start..i];
      tokens.push(lex_number(input, start, text)?);
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      let start = i;
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
      }
      let kind = if KEYWORDS.contains(&&input[start..i]) {
        TokenKind::Keyword
      } else {
        TokenKind::Ident
      };
      tokens.push(Token::new(kind, start, i - start, None));
      continue;
    }

    if let Some(op) = PUNCTUATORS.into_iter().find(|op| input[i..].starts_with(op)) {
      tokens.push(Token::new(TokenKind::Punctuator, i, op.len(), None));
      i += op.len();
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::lex_at(
      input,
      i,
      format!("invalid token: '{invalid_char}'"),
    ));
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, None));
  Ok(tokens)
}

/// Classify a numeric literal: float, hex, octal or decimal integer.
fn lex_number(input: &str, start: usize, text: &str) -> CompileResult<Token> {
  if text.contains('.') {
    let valid = text.chars().filter(|&ch| ch == '.').count() == 1
      && text.chars().all(|ch| ch.is_ascii_digit() || ch == '.');
    if !valid {
      return Err(CompileError::lex_at(
        input,
        start,
        format!("invalid float literal '{text}'"),
      ));
    }
    return Ok(Token::new(TokenKind::Float, start, text.len(), None));
  }

  let (digits, radix) = if let Some(hex) = text
    .strip_prefix("0x")
    .or_else(|| text.strip_prefix("0X"))
  {
    (hex, 16)
  } else if text.len() > 1 && text.starts_with('0') {
    (&text[1..], 8)
  } else {
    (text, 10)
  };

  let value = u32::from_str_radix(digits, radix).map_err(|err| {
    let message = match err.kind() {
      std::num::IntErrorKind::PosOverflow => format!("integer literal '{text}' out of range"),
      _ => format!("invalid integer literal '{text}'"),
    };
    CompileError::lex_at(input, start, message)
  })?;

  Ok(Token::new(
    TokenKind::Num,
    start,
    text.len(),
    Some(i64::from(value)),
  ))
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}
