use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::ops::{Index, IndexMut};

use arrayvec::ArrayVec;
use itertools::Itertools;
use log::{debug, trace, warn};

pub type Word = i64;

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {UnknownOpcode, BadOperand, NotARegister, WrongArity}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {pub line: usize, pub kind: ErrorKind, pub token: String}

impl DecodeError {
    fn new(kind: ErrorKind, token: &str) -> Self {
        DecodeError {line: 0, kind, token: token.to_owned()}
    }
}

impl Error for DecodeError {}
impl fmt::Display for DecodeError {fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let what = match self.kind {
        ErrorKind::UnknownOpcode => "unknown opcode",
        ErrorKind::BadOperand => "malformed operand",
        ErrorKind::NotARegister => "expected a register, got",
        ErrorKind::WrongArity => "wrong number of operands in",
    };
    write!(f, "line {}: {} `{}`", self.line, what, self.token)
}}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reg(u8);

impl Reg {
    pub fn new(name: char) -> Option<Reg> {
        name.is_ascii_lowercase().then(|| Reg(name as u8 - b'a'))
    }

    fn parse(tok: &str) -> Result<Reg, DecodeError> {
        match Operand::parse(tok)? {
            Operand::Reg(r) => Ok(r),
            Operand::Lit(_) => Err(DecodeError::new(ErrorKind::NotARegister, tok)),
        }
    }

    pub fn name(self) -> char {(b'a' + self.0) as char}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {Lit(Word), Reg(Reg)}

impl Operand {
    fn parse(tok: &str) -> Result<Operand, DecodeError> {
        let mut chars = tok.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some(r) = Reg::new(c) {return Ok(Operand::Reg(r))}
        }
        tok.parse().map(Operand::Lit).map_err(|_| DecodeError::new(ErrorKind::BadOperand, tok))
    }

    pub fn get(&self, regs: &Registers) -> Word {
        match *self {Operand::Lit(v) => v, Operand::Reg(r) => regs[r]}
    }
}

/// What `rcv` takes. The sound machine compares any operand with zero; the duet
/// machine stores the received value, so its `rcv` needs a register.
pub trait RcvArg: Copy + fmt::Debug {
    fn decode(tok: &str) -> Result<Self, DecodeError>;
}

impl RcvArg for Operand {
    fn decode(tok: &str) -> Result<Self, DecodeError> {Operand::parse(tok)}
}

impl RcvArg for Reg {
    fn decode(tok: &str) -> Result<Self, DecodeError> {Reg::parse(tok)}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers([Word; 26]);

impl Index<Reg> for Registers {
    type Output = Word;
    fn index(&self, r: Reg) -> &Word {&self.0[r.0 as usize]}
}

impl IndexMut<Reg> for Registers {
    fn index_mut(&mut self, r: Reg) -> &mut Word {&mut self.0[r.0 as usize]}
}

impl fmt::Display for Registers {fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "[{}]", self.0.iter().enumerate().filter(|&(_, &v)| v != 0)
        .map(|(i, v)| format!("{}={}", (b'a' + i as u8) as char, v)).join(" "))
}}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {Set, Add, Mul, Mod}

impl ArithOp {
    fn apply(self, x: Reg, y: Word, regs: &mut Registers) {
        match self {
            ArithOp::Set => regs[x] = y,
            ArithOp::Add => regs[x] = regs[x].wrapping_add(y),
            ArithOp::Mul => regs[x] = regs[x].wrapping_mul(y),
            ArithOp::Mod if y == 0 => warn!("mod {} by zero, register left at {}", x.name(), regs[x]),
            ArithOp::Mod => regs[x] = regs[x].wrapping_rem(y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insn<R> {
    Snd(Operand),
    Arith(ArithOp, Reg, Operand),
    Rcv(R),
    Jgz(Operand, Operand),
}

pub fn decode<R: RcvArg>(line: &str) -> Result<Insn<R>, DecodeError> {
    fn arith<R>(op: ArithOp, x: &str, y: &str) -> Result<Insn<R>, DecodeError> {
        Ok(Insn::Arith(op, Reg::parse(x)?, Operand::parse(y)?))
    }

    let mut toks = line.split_whitespace();
    let op = toks.next().unwrap_or("");
    let mut args = ArrayVec::<&str, 2>::new();
    for tok in toks {
        args.try_push(tok).map_err(|_| DecodeError::new(ErrorKind::WrongArity, line.trim()))?;
    }
    let val = Operand::parse;
    match (op, &args[..]) {
        ("snd", &[x]) => Ok(Insn::Snd(val(x)?)),
        ("set", &[x, y]) => arith(ArithOp::Set, x, y),
        ("add", &[x, y]) => arith(ArithOp::Add, x, y),
        ("mul", &[x, y]) => arith(ArithOp::Mul, x, y),
        ("mod", &[x, y]) => arith(ArithOp::Mod, x, y),
        ("rcv", &[x]) => Ok(Insn::Rcv(R::decode(x)?)),
        ("jgz", &[x, y]) => Ok(Insn::Jgz(val(x)?, val(y)?)),
        ("snd" | "set" | "add" | "mul" | "mod" | "rcv" | "jgz", _) =>
            Err(DecodeError::new(ErrorKind::WrongArity, line.trim())),
        _ => Err(DecodeError::new(ErrorKind::UnknownOpcode, op)),
    }
}

fn jgz(x: Operand, y: Operand, regs: &Registers) -> isize {
    if x.get(regs) > 0 {y.get(regs) as isize} else {1}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program<R> {code: Vec<Insn<R>>}

pub type SoundProgram = Program<Operand>;
pub type DuetProgram = Program<Reg>;

impl<R: RcvArg> Program<R> {
    pub fn parse(s: &str) -> Result<Self, DecodeError> {
        let code = s.lines().enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(ix, line)| decode(line).map_err(|e| DecodeError {line: ix + 1, ..e}))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Program {code})
    }
}

impl<R> Program<R> {
    pub fn len(&self) -> usize {self.code.len()}
    pub fn is_empty(&self) -> bool {self.code.is_empty()}

    pub fn get(&self, pc: isize) -> Option<&Insn<R>> {
        usize::try_from(pc).ok().and_then(|pc| self.code.get(pc))
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Runs the single-process sound machine until the first `rcv` whose operand is
/// non-zero and returns the last frequency played before it. `None` if the
/// program jumps off either end first.
pub fn recover(program: &SoundProgram) -> Option<Word> {
    let mut regs = Registers::default();
    let mut pc = 0isize;
    let mut last_played = 0;
    while let Some(&insn) = program.get(pc) {
        trace!("sound pc {:3} {:?} {}", pc, insn, regs);
        pc = pc.saturating_add(match insn {
            Insn::Snd(x) => {last_played = x.get(&regs); 1}
            Insn::Arith(op, x, y) => {op.apply(x, y.get(&regs), &mut regs); 1}
            Insn::Rcv(x) => if x.get(&regs) != 0 {return Some(last_played)} else {1},
            Insn::Jgz(x, y) => jgz(x, y, &regs),
        });
    }
    debug!("sound machine left the program at pc {} without recovering", pc);
    None
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {Advanced(isize), Sent(Word), Blocked, Halted}

impl Step {
    pub fn progressed(self) -> bool {matches!(self, Step::Advanced(_) | Step::Sent(_))}
}

pub struct Engine<'a> {
    program: &'a DuetProgram,
    id: Word,
    pc: isize,
    regs: Registers,
    outbox: VecDeque<Word>,
    sent: usize,
}

impl<'a> Engine<'a> {
    pub fn new(program: &'a DuetProgram, id: Word) -> Self {
        let mut regs = Registers::default();
        regs[Reg(b'p' - b'a')] = id;
        Engine {program, id, pc: 0, regs, outbox: VecDeque::new(), sent: 0}
    }

    pub fn id(&self) -> Word {self.id}
    pub fn pc(&self) -> isize {self.pc}
    pub fn sent(&self) -> usize {self.sent}
    pub fn pending(&self) -> usize {self.outbox.len()}
    pub fn is_finished(&self) -> bool {self.program.get(self.pc).is_none()}

    #[cfg(test)]
    pub fn reg(&self, name: char) -> Word {
        Reg::new(name).map_or(0, |r| self.regs[r])
    }

    /// Executes one instruction. `inbox` is the other engine's outgoing mailbox;
    /// an empty one blocks `rcv` without moving the pc.
    pub fn step(&mut self, inbox: &mut VecDeque<Word>) -> Step {
        let Some(&insn) = self.program.get(self.pc) else {return Step::Halted};
        let step = match insn {
            Insn::Snd(x) => {
                let v = x.get(&self.regs);
                self.outbox.push_back(v);
                self.sent += 1;
                self.pc += 1;
                Step::Sent(v)
            }
            Insn::Arith(op, x, y) => {
                op.apply(x, y.get(&self.regs), &mut self.regs);
                self.pc += 1;
                Step::Advanced(self.pc)
            }
            Insn::Rcv(x) => match inbox.pop_front() {
                Some(v) => {self.regs[x] = v; self.pc += 1; Step::Advanced(self.pc)}
                None => Step::Blocked,
            },
            Insn::Jgz(x, y) => {
                self.pc = self.pc.saturating_add(jgz(x, y, &self.regs));
                Step::Advanced(self.pc)
            }
        };
        trace!("engine {} {:?} -> {:?} {}", self.id, insn, step, self.regs);
        step
    }
}

/// Two engines on the same program, each reading the other's outgoing mailbox.
pub struct Duet<'a> {engines: [Engine<'a>; 2], turns: usize}

impl<'a> Duet<'a> {
    pub fn new(program: &'a DuetProgram) -> Self {
        Duet {engines: [Engine::new(program, 0), Engine::new(program, 1)], turns: 0}
    }

    pub fn engine(&self, id: usize) -> &Engine<'a> {&self.engines[id]}

    /// Steps engine 0, then engine 1. Returns whether either made progress.
    pub fn turn(&mut self) -> bool {
        let [a, b] = &mut self.engines;
        let a_moved = !a.is_finished() && a.step(&mut b.outbox).progressed();
        let b_moved = !b.is_finished() && b.step(&mut a.outbox).progressed();
        self.turns += 1;
        a_moved || b_moved
    }

    pub fn run(&mut self) -> usize {
        while self.turn() {}
        let [a, b] = &self.engines;
        debug!(
            "stalled after {} turns: engine {} pc {} sent {} unread {} {}, engine {} pc {} sent {} unread {} {}",
            self.turns, a.id(), a.pc(), a.sent(), a.pending(), a.regs,
            b.id(), b.pc(), b.sent(), b.pending(), b.regs
        );
        self.turns
    }
}

////////////////////////////////////////////////////////////////////////////////
