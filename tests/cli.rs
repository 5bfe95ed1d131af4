use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
  let p = dir.path().join(name);
  fs::write(&p, contents).expect("write file ok");
  p
}

#[test]
fn assembly_goes_to_stdout_by_default() {
  let dir = tempdir().unwrap();
  let main_c = write_file(&dir, "main.c", "int main(){ return 2 + 3 * 4; }\n");

  let mut cmd = Command::cargo_bin("ccx86").unwrap();
  cmd.arg(&main_c);
  cmd
    .assert()
    .success()
    .stdout(
      predicate::str::contains(".globl _main")
        .and(predicate::str::contains("imull %ecx, %eax")),
    );
}

#[test]
fn output_file_and_symbol_prefix() {
  let dir = tempdir().unwrap();
  let main_c = write_file(&dir, "main.c", "int main(){ return 0; }\n");
  let out_s = dir.path().join("out.s");

  let mut cmd = Command::cargo_bin("ccx86").unwrap();
  cmd
    .arg(&main_c)
    .arg("-o")
    .arg(&out_s)
    .args(["--symbol-prefix", ""]);
  cmd.assert().success().stdout(predicate::str::is_empty());

  let text = fs::read_to_string(&out_s).expect("assembly exists");
  assert!(text.starts_with("    .globl main\nmain:\n"));
}

#[test]
fn implicit_declaration_warns_unless_strict() {
  let dir = tempdir().unwrap();
  let main_c = write_file(&dir, "main.c", "int main(){ return helper(1); }\n");

  let mut cmd = Command::cargo_bin("ccx86").unwrap();
  cmd.arg(&main_c);
  cmd
    .assert()
    .success()
    .stderr(predicate::str::contains("warning: implicit declaration of function 'helper'"))
    .stdout(predicate::str::contains("call _helper"));

  let mut cmd = Command::cargo_bin("ccx86").unwrap();
  cmd.arg(&main_c).arg("--strict-calls");
  cmd
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("error: call to undeclared function 'helper'"));
}

#[test]
fn syntax_error_points_at_the_token() {
  let dir = tempdir().unwrap();
  let main_c = write_file(&dir, "bad.c", "int main(){\n  return 1\n}\n");

  let mut cmd = Command::cargo_bin("ccx86").unwrap();
  cmd.arg(&main_c);
  cmd
    .assert()
    .code(1)
    .stdout(predicate::str::is_empty())
    .stderr(predicate::str::contains("error: 3:1:").and(predicate::str::contains("^")));
}

#[test]
fn loop_control_error_is_reported() {
  let dir = tempdir().unwrap();
  let main_c = write_file(&dir, "main.c", "int main(){ break; }\n");

  let mut cmd = Command::cargo_bin("ccx86").unwrap();
  cmd.arg(&main_c);
  cmd
    .assert()
    .failure()
    .stderr(predicate::str::contains("'break' statement not within a loop"));
}

#[test]
fn missing_input_file_fails_with_context() {
  let dir = tempdir().unwrap();
  let missing = dir.path().join("nope.c");

  let mut cmd = Command::cargo_bin("ccx86").unwrap();
  cmd.arg(&missing);
  cmd
    .assert()
    .failure()
    .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn emit_tokens_ast_and_source() {
  let dir = tempdir().unwrap();
  let main_c = write_file(&dir, "main.c", "int main(){int a=1;if(a)return 2;}\n");

  let mut cmd = Command::cargo_bin("ccx86").unwrap();
  cmd.arg(&main_c).args(["--emit", "tokens"]);
  cmd
    .assert()
    .success()
    .stdout(
      predicate::str::contains("Keyword \"int\" @0").and(predicate::str::contains("Num \"1\"")),
    );

  let mut cmd = Command::cargo_bin("ccx86").unwrap();
  cmd.arg(&main_c).args(["--emit", "ast"]);
  cmd
    .assert()
    .success()
    .stdout(predicate::str::contains("Program").and(predicate::str::contains("DeclarationList")));

  let mut cmd = Command::cargo_bin("ccx86").unwrap();
  cmd.arg(&main_c).args(["--emit", "source", "-o", "-"]);
  cmd
    .assert()
    .success()
    .stdout(predicate::str::contains("int main() {\n  int a = 1;\n  if (a)\n    return 2;\n"));
}
