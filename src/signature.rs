//! Function signature registry shared by the parser and the code generator.

use std::collections::HashMap;

use crate::ast::Function;
use crate::error::{CompileError, CompileResult};
use crate::ty::TypeKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
  pub return_type: TypeKind,
  pub params: Vec<TypeKind>,
  pub defined: bool,
}

impl Signature {
  pub fn of(func: &Function) -> Self {
    Self {
      return_type: func.return_type,
      params: func.param_types(),
      defined: func.is_defined(),
    }
  }

  pub fn arity(&self) -> usize {
    self.params.len()
  }
}

/// Every function seen so far, keyed by name.
///
/// Grows monotonically: a failed declaration leaves earlier entries intact.
#[derive(Debug, Default)]
pub struct FunctionTable {
  signatures: HashMap<String, Signature>,
}

impl FunctionTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a declaration or definition, checking it against any earlier
  /// declaration of the same name.
  ///
  /// Parameter count and per-position types must agree, and at most one
  /// declaration may carry a body.
  pub fn declare(&mut self, func: &Function) -> CompileResult<()> {
    let incoming = Signature::of(func);

    if let Some(existing) = self.signatures.get_mut(&func.name) {
      if existing.params != incoming.params {
        return Err(CompileError::ConflictingTypes {
          name: func.name.clone(),
          expected: existing.params.clone(),
          found: incoming.params,
        });
      }
      if existing.defined && incoming.defined {
        return Err(CompileError::FunctionRedefinition {
          name: func.name.clone(),
        });
      }
      existing.defined |= incoming.defined;
      return Ok(());
    }

    self.signatures.insert(func.name.clone(), incoming);
    Ok(())
  }

  pub fn get(&self, name: &str) -> Option<&Signature> {
    self.signatures.get(name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::Param;

  fn func(name: &str, params: &[TypeKind], defined: bool) -> Function {
    Function {
      return_type: TypeKind::Int,
      name: name.to_string(),
      params: params
        .iter()
        .map(|&ty| Param { ty, name: None })
        .collect(),
      body: defined.then(Vec::new),
    }
  }

  #[test]
  fn prototype_then_definition_is_accepted() {
    let mut table = FunctionTable::new();
    table.declare(&func("f", &[TypeKind::Int], false)).unwrap();
    table.declare(&func("f", &[TypeKind::Int], true)).unwrap();
    table.declare(&func("f", &[TypeKind::Int], false)).unwrap();
    let sig = table.get("f").unwrap();
    assert!(sig.defined);
    assert_eq!(sig.arity(), 1);
  }

  #[test]
  fn second_body_is_rejected() {
    let mut table = FunctionTable::new();
    table.declare(&func("f", &[], true)).unwrap();
    let err = table.declare(&func("f", &[], true)).unwrap_err();
    assert!(matches!(err, CompileError::FunctionRedefinition { name } if name == "f"));
  }

  #[test]
  fn arity_or_type_mismatch_is_rejected() {
    let mut table = FunctionTable::new();
    table.declare(&func("f", &[TypeKind::Int], false)).unwrap();

    let err = table
      .declare(&func("f", &[TypeKind::Int, TypeKind::Int], false))
      .unwrap_err();
    assert!(matches!(err, CompileError::ConflictingTypes { .. }));

    let err = table
      .declare(&func("f", &[TypeKind::Float], true))
      .unwrap_err();
    assert!(matches!(
      err,
      CompileError::ConflictingTypes { expected, found, .. }
        if expected == [TypeKind::Int] && found == [TypeKind::Float]
    ));

    assert!(!table.get("f").unwrap().defined);
  }
}
