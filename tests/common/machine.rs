//! A tiny interpreter for the 32-bit AT&T subset the compiler emits.
//!
//! Only what the code generator produces is understood; anything else
//! panics. Memory is a sparse map of 4-byte words. Reading a frame slot that
//! lies below `%esp` also panics, since such a slot is not allocated.

use std::collections::HashMap;

const STACK_TOP: i32 = 0x0010_0000;
const RETURN_TO_HOST: i32 = -1;
const STEP_LIMIT: usize = 5_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reg {
  Eax,
  Ecx,
  Edx,
  Ebp,
  Esp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
  Imm(i32),
  Reg(Reg),
  /// Low byte of a register (`%al`, `%cl`).
  Byte(Reg),
  /// `offset(%ebp)`
  Frame(i32),
  Label(String),
}

#[derive(Debug, Clone)]
struct Instr {
  mnemonic: String,
  operands: Vec<Operand>,
  line: String,
}

pub struct Machine {
  program: Vec<Instr>,
  labels: HashMap<String, usize>,
  regs: [i32; 5],
  memory: HashMap<i32, i32>,
  /// Flag state as a pair whose ordering the `set*`/`je` conditions test:
  /// `(dst, src)` after `cmpl src, dst`, `(result, 0)` after arithmetic.
  compared: (i32, i32),
}

fn parse_operand(text: &str) -> Operand {
  if let Some(imm) = text.strip_prefix('$') {
    let value: i64 = imm.parse().unwrap_or_else(|_| panic!("bad immediate {text}"));
    return Operand::Imm(value as i32);
  }
  if let Some(reg) = text.strip_prefix('%') {
    return match reg {
      "eax" => Operand::Reg(Reg::Eax),
      "ecx" => Operand::Reg(Reg::Ecx),
      "edx" => Operand::Reg(Reg::Edx),
      "ebp" => Operand::Reg(Reg::Ebp),
      "esp" => Operand::Reg(Reg::Esp),
      "al" => Operand::Byte(Reg::Eax),
      "cl" => Operand::Byte(Reg::Ecx),
      _ => panic!("unknown register {text}"),
    };
  }
  if let Some(offset) = text.strip_suffix("(%ebp)") {
    let offset = offset.parse().unwrap_or_else(|_| panic!("bad offset {text}"));
    return Operand::Frame(offset);
  }
  Operand::Label(text.to_string())
}

impl Machine {
  pub fn load(asm: &str) -> Self {
    let mut program = Vec::new();
    let mut labels = HashMap::new();

    for raw in asm.lines() {
      let line = raw.trim();
      if line.is_empty() || line.starts_with(".globl") {
        continue;
      }
      if let Some(label) = line.strip_suffix(':') {
        let previous = labels.insert(label.to_string(), program.len());
        assert!(previous.is_none(), "label {label} defined twice");
        continue;
      }
      let (mnemonic, rest) = line.split_once(' ').unwrap_or((line, ""));
      let operands = rest
        .split(',')
        .map(str::trim)
        .filter(|op| !op.is_empty())
        .map(parse_operand)
        .collect();
      program.push(Instr {
        mnemonic: mnemonic.to_string(),
        operands,
        line: line.to_string(),
      });
    }

    Self {
      program,
      labels,
      regs: [0; 5],
      memory: HashMap::new(),
      compared: (0, 0),
    }
  }

  pub fn has_label(&self, label: &str) -> bool {
    self.labels.contains_key(label)
  }

  /// Call `symbol` with cdecl arguments and return `%eax`.
  pub fn call(&mut self, symbol: &str, args: &[i32]) -> i32 {
    self.regs = [0; 5];
    self.set(Reg::Esp, STACK_TOP);
    for &arg in args.iter().rev() {
      self.push(arg);
    }
    self.push(RETURN_TO_HOST);

    let mut pc = self.target(symbol);
    let mut steps = 0;
    loop {
      steps += 1;
      assert!(steps < STEP_LIMIT, "step limit exceeded");
      let instr = self.program[pc].clone();
      pc += 1;
      if let Some(next) = self.step(&instr, pc) {
        if next == RETURN_TO_HOST as usize {
          break;
        }
        pc = next;
      }
    }

    let expected = STACK_TOP - 4 * args.len() as i32;
    assert_eq!(self.get(Reg::Esp), expected, "unbalanced stack on return");
    self.get(Reg::Eax)
  }

  fn target(&self, label: &str) -> usize {
    *self
      .labels
      .get(label)
      .unwrap_or_else(|| panic!("undefined label {label}"))
  }

  fn get(&self, reg: Reg) -> i32 {
    self.regs[reg as usize]
  }

  fn set(&mut self, reg: Reg, value: i32) {
    self.regs[reg as usize] = value;
  }

  fn push(&mut self, value: i32) {
    let esp = self.get(Reg::Esp) - 4;
    self.set(Reg::Esp, esp);
    self.memory.insert(esp, value);
  }

  fn pop(&mut self) -> i32 {
    let esp = self.get(Reg::Esp);
    self.set(Reg::Esp, esp + 4);
    self.memory.get(&esp).copied().unwrap_or(0)
  }

  fn frame_address(&self, offset: i32, line: &str) -> i32 {
    let addr = self.get(Reg::Ebp) + offset;
    assert!(
      addr >= self.get(Reg::Esp),
      "`{line}` touches {offset}(%ebp), below %esp"
    );
    addr
  }

  fn read(&self, operand: &Operand, line: &str) -> i32 {
    match operand {
      Operand::Imm(value) => *value,
      Operand::Reg(reg) => self.get(*reg),
      Operand::Byte(reg) => self.get(*reg) & 0xff,
      Operand::Frame(offset) => {
        let addr = self.frame_address(*offset, line);
        self.memory.get(&addr).copied().unwrap_or(0)
      }
      Operand::Label(_) => panic!("cannot read a label in `{line}`"),
    }
  }

  fn write(&mut self, operand: &Operand, value: i32, line: &str) {
    match operand {
      Operand::Reg(reg) => self.set(*reg, value),
      Operand::Byte(reg) => {
        let merged = (self.get(*reg) & !0xff) | (value & 0xff);
        self.set(*reg, merged);
      }
      Operand::Frame(offset) => {
        let addr = self.frame_address(*offset, line);
        self.memory.insert(addr, value);
      }
      _ => panic!("cannot write to {operand:?} in `{line}`"),
    }
  }

  /// Execute one instruction; returns the new program counter on a jump.
  fn step(&mut self, instr: &Instr, pc: usize) -> Option<usize> {
    let line = instr.line.as_str();
    let ops = &instr.operands;
    let binary = |f: fn(i32, i32) -> i32, m: &mut Self| {
      let src = m.read(&ops[0], line);
      let dst = m.read(&ops[1], line);
      let result = f(dst, src);
      m.write(&ops[1], result, line);
      m.compared = (result, 0);
    };
    let unary = |f: fn(i32) -> i32, m: &mut Self| {
      let result = f(m.read(&ops[0], line));
      m.write(&ops[0], result, line);
      m.compared = (result, 0);
    };

    match instr.mnemonic.as_str() {
      "pushl" => {
        let value = self.read(&ops[0], line);
        self.push(value);
      }
      "pop" | "popl" => {
        let value = self.pop();
        self.write(&ops[0], value, line);
      }
      "movl" => {
        let value = self.read(&ops[0], line);
        self.write(&ops[1], value, line);
      }
      "addl" => binary(i32::wrapping_add, self),
      "subl" => binary(i32::wrapping_sub, self),
      "imull" => binary(i32::wrapping_mul, self),
      "andl" | "andb" => binary(|a, b| a & b, self),
      "orl" => binary(|a, b| a | b, self),
      "xorl" => binary(|a, b| a ^ b, self),
      "shll" => binary(|a, n| a.wrapping_shl(n as u32 & 31), self),
      "sarl" => binary(|a, n| a.wrapping_shr(n as u32 & 31), self),
      "cdq" => {
        let sign = if self.get(Reg::Eax) < 0 { -1 } else { 0 };
        self.set(Reg::Edx, sign);
      }
      "idivl" => {
        let divisor = i64::from(self.read(&ops[0], line));
        assert!(divisor != 0, "division by zero");
        let high = i64::from(self.get(Reg::Edx));
        let low = i64::from(self.get(Reg::Eax) as u32);
        let dividend = (high << 32) | low;
        self.set(Reg::Eax, (dividend / divisor) as i32);
        self.set(Reg::Edx, (dividend % divisor) as i32);
      }
      "negl" => unary(i32::wrapping_neg, self),
      "incl" => unary(|value| value.wrapping_add(1), self),
      "decl" => unary(|value| value.wrapping_sub(1), self),
      // `not` leaves the flags alone.
      "notl" => {
        let value = self.read(&ops[0], line);
        self.write(&ops[0], !value, line);
      }
      "cmpl" => {
        let src = self.read(&ops[0], line);
        let dst = self.read(&ops[1], line);
        self.compared = (dst, src);
      }
      "sete" | "setne" | "setl" | "setle" | "setg" | "setge" => {
        let (a, b) = self.compared;
        let holds = match instr.mnemonic.as_str() {
          "sete" => a == b,
          "setne" => a != b,
          "setl" => a < b,
          "setle" => a <= b,
          "setg" => a > b,
          _ => a >= b,
        };
        self.write(&ops[0], i32::from(holds), line);
      }
      "jmp" => return Some(self.jump_target(&ops[0])),
      "je" => {
        let (a, b) = self.compared;
        if a == b {
          return Some(self.jump_target(&ops[0]));
        }
      }
      "call" => {
        let target = self.jump_target(&ops[0]);
        self.push(pc as i32);
        return Some(target);
      }
      "ret" => return Some(self.pop() as usize),
      other => panic!("unsupported instruction {other} in `{line}`"),
    }
    None
  }

  fn jump_target(&self, operand: &Operand) -> usize {
    match operand {
      Operand::Label(label) => self.target(label),
      other => panic!("bad jump target {other:?}"),
    }
  }
}
