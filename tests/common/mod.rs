#![allow(dead_code)]

pub mod machine;

use ccx86::{Assembly, compile};

/// Compile `source` with default options, panicking on any diagnostic.
pub fn compile_ok(source: &str) -> Assembly {
  match compile(source) {
    Ok(assembly) => assembly,
    Err(err) => panic!("compile failed:\n{err}\n--- source ---\n{source}"),
  }
}

/// Compile and run `_main`, returning its `%eax`.
pub fn run(source: &str) -> i32 {
  let assembly = compile_ok(source);
  machine::Machine::load(&assembly.text).call("_main", &[])
}
