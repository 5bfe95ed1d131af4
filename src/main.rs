use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use ccx86::tokenizer::{TokenKind, token_text};
use ccx86::{Options, compile_with, parser, tokenizer};

#[derive(Parser, Debug)]
#[command(
  name = "ccx86",
  about = "Compile a small C subset to 32-bit x86 assembly",
  version
)]
struct Cli {
  /// Input C file
  input: PathBuf,
  /// Output path; `-` or omitted writes to stdout
  #[arg(short = 'o', long = "output")]
  output: Option<PathBuf>,
  /// What to produce
  #[arg(long, value_enum, default_value_t = Emit::Asm)]
  emit: Emit,
  /// Prefix for function symbols
  #[arg(long, value_name = "PREFIX", default_value = "_")]
  symbol_prefix: String,
  /// Reject calls to functions that have not been declared yet
  #[arg(long)]
  strict_calls: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Emit {
  /// AT&T assembly
  Asm,
  /// One token per line
  Tokens,
  /// Debug dump of the syntax tree
  Ast,
  /// The syntax tree printed back as C
  Source,
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  match run(&cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("error: {err:#}");
      ExitCode::FAILURE
    }
  }
}

fn run(cli: &Cli) -> Result<()> {
  let source = fs::read_to_string(&cli.input)
    .with_context(|| format!("failed to read {}", cli.input.display()))?;

  let output = match cli.emit {
    Emit::Asm => {
      let options = Options {
        symbol_prefix: cli.symbol_prefix.clone(),
        implicit_declarations: !cli.strict_calls,
      };
      let assembly = compile_with(&source, &options)?;
      for warning in &assembly.warnings {
        eprintln!("warning: {warning}");
      }
      assembly.text
    }
    Emit::Tokens => render_tokens(&source)?,
    Emit::Ast => {
      let program = parser::parse(tokenizer::tokenize(&source)?, &source)?;
      format!("{program:#?}\n")
    }
    Emit::Source => parser::parse(tokenizer::tokenize(&source)?, &source)?.to_string(),
  };

  write_output(cli.output.as_deref(), &output)
}

fn render_tokens(source: &str) -> Result<String> {
  let mut out = String::new();
  for token in tokenizer::tokenize(source)? {
    if token.kind == TokenKind::Eof {
      break;
    }
    out.push_str(&format!(
      "{:?} {:?} @{}\n",
      token.kind,
      token_text(&token, source),
      token.loc
    ));
  }
  Ok(out)
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
  match path {
    Some(path) if path != Path::new("-") => {
      fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
    }
    _ => {
      let mut stdout = io::stdout().lock();
      stdout
        .write_all(text.as_bytes())
        .context("failed to write to stdout")
    }
  }
}
