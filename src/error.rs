//! Shared error utilities used across the compilation pipeline.
//!
//! Every stage fails fast: the first error aborts compilation and travels
//! back to the driver as a `CompileError`. Syntax errors point at the
//! offending token with a caret; declaration and control-flow errors carry
//! the names involved instead of a position.

use snafu::Snafu;

use crate::ty::TypeKind;

pub type CompileResult<T> = Result<T, CompileError>;

/// Broad classes of failure, matching the stage that detects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
  Lex,
  Parse,
  Declaration,
  ControlFlow,
  Unsupported,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display("{line}:{column}: {message}\n{source_line}\n{marker}"))]
  Lex {
    line: usize,
    column: usize,
    source_line: String,
    marker: String,
    message: String,
  },

  #[snafu(display("{line}:{column}: {message}\n{source_line}\n{marker}"))]
  Parse {
    line: usize,
    column: usize,
    source_line: String,
    marker: String,
    message: String,
  },

  #[snafu(display("variable '{name}' already declared in this scope (in function '{function}')"))]
  Redeclaration { name: String, function: String },

  #[snafu(display("multiple definitions for function '{name}'"))]
  FunctionRedefinition { name: String },

  #[snafu(display(
    "conflicting types for function '{name}': previously declared as ({}), now ({})",
    join_types(expected),
    join_types(found)
  ))]
  ConflictingTypes {
    name: String,
    expected: Vec<TypeKind>,
    found: Vec<TypeKind>,
  },

  #[snafu(display("identifier '{name}' not declared in this scope (in function '{function}')"))]
  UndeclaredIdentifier { name: String, function: String },

  #[snafu(display("call to undeclared function '{name}' (in function '{function}')"))]
  UndeclaredFunction { name: String, function: String },

  #[snafu(display(
    "too {} arguments to function '{name}': expected {expected}, got {found}",
    if found > expected { "many" } else { "few" }
  ))]
  ArgumentCount {
    name: String,
    expected: usize,
    found: usize,
  },

  #[snafu(display("'{keyword}' statement not within a loop (in function '{function}')"))]
  LoopControl { keyword: String, function: String },

  #[snafu(display("{feature} is not supported by the code generator"))]
  Unsupported { feature: String },
}

fn join_types(types: &[TypeKind]) -> String {
  types
    .iter()
    .map(|ty| ty.to_string())
    .collect::<Vec<_>>()
    .join(", ")
}

/// Line, column and caret rendering for a byte offset into the source.
struct Location {
  line: usize,
  column: usize,
  source_line: String,
  marker: String,
}

impl Location {
  fn find(source: &str, loc: usize) -> Self {
    let safe_loc = floor_char_boundary(source, loc.min(source.len()));
    let line_start = source[..safe_loc].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[safe_loc..]
      .find('\n')
      .map_or(source.len(), |i| safe_loc + i);
    let line = source[..line_start].matches('\n').count() + 1;
    let column = source[line_start..safe_loc].chars().count() + 1;
    let marker = format!("{}^", " ".repeat(column - 1));
    Self {
      line,
      column,
      source_line: source[line_start..line_end].to_string(),
      marker,
    }
  }
}

fn floor_char_boundary(source: &str, mut loc: usize) -> usize {
  while !source.is_char_boundary(loc) {
    loc -= 1;
  }
  loc
}

impl CompileError {
  /// Construct a syntax error anchored at a specific byte offset in the source.
  pub fn at(source: &str, loc: usize, message: impl Into<String>) -> Self {
    let Location {
      line,
      column,
      source_line,
      marker,
    } = Location::find(source, loc);
    Self::Parse {
      line,
      column,
      source_line,
      marker,
      message: message.into(),
    }
  }

  /// Like [`CompileError::at`] but for malformed tokens.
  pub fn lex_at(source: &str, loc: usize, message: impl Into<String>) -> Self {
    let Location {
      line,
      column,
      source_line,
      marker,
    } = Location::find(source, loc);
    Self::Lex {
      line,
      column,
      source_line,
      marker,
      message: message.into(),
    }
  }

  pub fn category(&self) -> ErrorCategory {
    match self {
      Self::Lex { .. } => ErrorCategory::Lex,
      Self::Parse { .. } => ErrorCategory::Parse,
      Self::Redeclaration { .. }
      | Self::FunctionRedefinition { .. }
      | Self::ConflictingTypes { .. }
      | Self::UndeclaredIdentifier { .. }
      | Self::UndeclaredFunction { .. }
      | Self::ArgumentCount { .. } => ErrorCategory::Declaration,
      Self::LoopControl { .. } => ErrorCategory::ControlFlow,
      Self::Unsupported { .. } => ErrorCategory::Unsupported,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn caret_points_at_column_on_second_line() {
    let source = "int main() {\n  return $;\n}";
    let loc = source.find('$').unwrap();
    let err = CompileError::at(source, loc, "unexpected token");
    match &err {
      CompileError::Parse {
        line,
        column,
        source_line,
        marker,
        ..
      } => {
        assert_eq!(*line, 2);
        assert_eq!(*column, 10);
        assert_eq!(source_line, "  return $;");
        assert_eq!(marker, "         ^");
      }
      other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(
      err.to_string(),
      "2:10: unexpected token\n  return $;\n         ^"
    );
  }

  #[test]
  fn location_past_end_is_clamped() {
    let err = CompileError::lex_at("int", 99, "unexpected end of input");
    assert!(err.to_string().starts_with("1:4: unexpected end of input"));
    assert_eq!(err.category(), ErrorCategory::Lex);
  }

  #[test]
  fn argument_count_message_says_many_or_few() {
    let many = CompileError::ArgumentCount {
      name: "f".into(),
      expected: 1,
      found: 3,
    };
    let few = CompileError::ArgumentCount {
      name: "f".into(),
      expected: 2,
      found: 0,
    };
    assert_eq!(
      many.to_string(),
      "too many arguments to function 'f': expected 1, got 3"
    );
    assert!(few.to_string().starts_with("too few arguments"));
    assert_eq!(many.category(), ErrorCategory::Declaration);
  }

  #[test]
  fn conflicting_types_lists_both_signatures() {
    let err = CompileError::ConflictingTypes {
      name: "g".into(),
      expected: vec![TypeKind::Int, TypeKind::Int],
      found: vec![TypeKind::Int, TypeKind::Float],
    };
    assert_eq!(
      err.to_string(),
      "conflicting types for function 'g': previously declared as (int, int), now (int, float)"
    );
  }
}
