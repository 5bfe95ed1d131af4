use std::fmt;

/// Type tags the grammar recognises. Code generation treats every value as
/// a 4-byte `int`; `Float` only exists so declarations and signatures can
/// carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
  Int,
  Float,
}

impl TypeKind {
  pub fn from_keyword(word: &str) -> Option<Self> {
    match word {
      "int" => Some(Self::Int),
      "float" => Some(Self::Float),
      _ => None,
    }
  }

  pub fn keyword(&self) -> &'static str {
    match self {
      Self::Int => "int",
      Self::Float => "float",
    }
  }

  /// Size of a stack slot holding a value of this type.
  pub fn size(&self) -> i32 {
    4
  }
}

impl fmt::Display for TypeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.keyword())
  }
}
