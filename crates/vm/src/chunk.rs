//! Bytecode Chunk (C3): an append-only buffer of instruction words plus the
//! opcode/operand encoding (§3.4, §4.1).
//!
//! A word is a `u64`. The opcode lives in the low 8 bits, the argument field
//! in the next 24 bits; the remaining bits are unused (kept for a word size
//! that can host an inline `f64` or a pointer-width value in one slot, the
//! same convention the original VM used its native word size for). Operands
//! that don't fit in 24 bits — out-of-range integers, doubles, strings —
//! follow as one or more trailing words.

use std::fmt;

pub type Word = u64;

const OPCODE_MASK: u64 = 0xff;
const ARGS_SHIFT: u32 = 8;
const ARGS_MASK: u32 = 0x00ff_ffff;

fn make_word(opcode: u8, args: u32) -> Word {
    (opcode as u64) | ((args as u64 & ARGS_MASK as u64) << ARGS_SHIFT)
}

fn op_code(word: Word) -> u8 {
    (word & OPCODE_MASK) as u8
}

fn op_args(word: Word) -> u32 {
    ((word >> ARGS_SHIFT) & ARGS_MASK as u64) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Push = 1,
    Pop = 2,
    Filter = 3,
    Update = 4,
    Set = 5,
    Get = 6,
    Create = 7,
    Call = 8,
    Cmp = 9,
    Branch = 10,
    Debug = 11,
    Halt = 12,
    Replace = 13,
}

impl Opcode {
    fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            1 => Opcode::Push,
            2 => Opcode::Pop,
            3 => Opcode::Filter,
            4 => Opcode::Update,
            5 => Opcode::Set,
            6 => Opcode::Get,
            7 => Opcode::Create,
            8 => Opcode::Call,
            9 => Opcode::Cmp,
            10 => Opcode::Branch,
            11 => Opcode::Debug,
            12 => Opcode::Halt,
            13 => Opcode::Replace,
            _ => return None,
        })
    }
}

/// `PUSH`'s embedded value-type tag (low byte of the PUSH args field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum PushType {
    Nil = 1,
    Integer = 2,
    Double = 3,
    String = 4,
    Local = 5,
    Global = 6,
}

impl PushType {
    fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            1 => PushType::Nil,
            2 => PushType::Integer,
            3 => PushType::Double,
            4 => PushType::String,
            5 => PushType::Local,
            6 => PushType::Global,
            _ => return None,
        })
    }
}

/// Relational/boolean operators for `CMP` (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RelOp {
    Eq = 1,
    Ne = 2,
    Lt = 3,
    Le = 4,
    Gt = 5,
    Ge = 6,
    Not = 7,
    Or = 8,
    And = 9,
}

impl RelOp {
    fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            1 => RelOp::Eq,
            2 => RelOp::Ne,
            3 => RelOp::Lt,
            4 => RelOp::Le,
            5 => RelOp::Gt,
            6 => RelOp::Ge,
            7 => RelOp::Not,
            8 => RelOp::Or,
            9 => RelOp::And,
            _ => return None,
        })
    }
}

/// `BRANCH` kinds (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BranchKind {
    Always = 0,
    /// Take the branch if top-of-stack is truthy (non-zero).
    IfTrue = 1,
    /// Take the branch if top-of-stack is falsy (zero).
    IfFalse = 2,
}

impl BranchKind {
    fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            0 => BranchKind::Always,
            1 => BranchKind::IfTrue,
            2 => BranchKind::IfFalse,
            _ => return None,
        })
    }
}

/// A single decoded instruction (C3/C4 §4.1), independent of its word
/// encoding. [`disasm`] decodes a whole chunk to these for tests and
/// diagnostics; [`crate::interpreter`] decodes one at a time while running.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    PushNil,
    PushInt(i32),
    PushDouble(f64),
    PushString(String),
    /// `PUSH GLOBAL <name>`: resolve `name` against the fact store.
    PushGlobal(String),
    /// `PUSH LOCAL n`: open a new scope of arity `n`.
    PushLocals(u32),
    PopLocals,
    PopDiscard,
    Filter(u32),
    Update { n: u32, partial: bool },
    Replace(u32),
    Create(u32),
    Set,
    SetField,
    GetField,
    GetLocal(u32),
    Call(u32),
    Cmp(RelOp),
    Branch { kind: BranchKind, disp: i32 },
    Debug(String),
    Halt,
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::PushNil => write!(f, "PUSH NIL"),
            Instr::PushInt(v) => write!(f, "PUSH INT {v}"),
            Instr::PushDouble(v) => write!(f, "PUSH DOUBLE {v}"),
            Instr::PushString(s) => write!(f, "PUSH STRING {s:?}"),
            Instr::PushGlobal(s) => write!(f, "PUSH GLOBAL {s:?}"),
            Instr::PushLocals(n) => write!(f, "PUSH LOCAL {n}"),
            Instr::PopLocals => write!(f, "POP LOCALS"),
            Instr::PopDiscard => write!(f, "POP DISCARD"),
            Instr::Filter(n) => write!(f, "FILTER {n}"),
            Instr::Update { n, partial } => write!(f, "UPDATE {n} partial={partial}"),
            Instr::Replace(n) => write!(f, "REPLACE {n}"),
            Instr::Create(n) => write!(f, "CREATE {n}"),
            Instr::Set => write!(f, "SET"),
            Instr::SetField => write!(f, "SET_FIELD"),
            Instr::GetField => write!(f, "GET_FIELD"),
            Instr::GetLocal(idx) => write!(f, "GET_LOCAL {idx}"),
            Instr::Call(n) => write!(f, "CALL {n}"),
            Instr::Cmp(op) => write!(f, "CMP {op:?}"),
            Instr::Branch { kind, disp } => write!(f, "BRANCH {kind:?} {disp:+}"),
            Instr::Debug(s) => write!(f, "DEBUG {s:?}"),
            Instr::Halt => write!(f, "HALT"),
        }
    }
}

const GET_FIELD_FLAG: u32 = 1 << 23;
const GET_LOCAL_FLAG: u32 = 1 << 22;
const GET_LOCAL_MASK: u32 = GET_LOCAL_FLAG - 1;

const UPDATE_PARTIAL_FLAG: u32 = 0x80;

const BRANCH_KIND_SHIFT: u32 = 22;
const BRANCH_SIGN_BIT: u32 = 1 << 21;
const BRANCH_MAGNITUDE_MASK: u32 = BRANCH_SIGN_BIT - 1;

fn words_for_bytes(len: usize) -> usize {
    len.div_ceil(8)
}

fn pack_bytes(words: &mut Vec<Word>, bytes: &[u8]) {
    for chunk in bytes.chunks(8) {
        let mut buf = [0u8; 8];
        buf[..chunk.len()].copy_from_slice(chunk);
        words.push(Word::from_le_bytes(buf));
    }
}

fn unpack_bytes(words: &[Word], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    for &w in words {
        out.extend_from_slice(&w.to_le_bytes());
    }
    out.truncate(len);
    out
}

/// An append-only, word-aligned bytecode buffer (C3).
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    words: Vec<Word>,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk { words: Vec::new() }
    }

    /// Word offset the next instruction will be emitted at.
    pub fn offset(&self) -> usize {
        self.words.len()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    fn emit(&mut self, opcode: Opcode, args: u32) -> usize {
        let at = self.offset();
        self.words.push(make_word(opcode as u8, args));
        at
    }

    pub fn push_nil(&mut self) -> usize {
        self.emit(Opcode::Push, PushType::Nil as u32)
    }

    /// `PUSH INT` with the §9/Open-Question-2 inline `+1` bias: values in
    /// `0..0xfffe` pack into one word (payload `value + 1`); everything else
    /// is an extended literal (payload `0`, the value follows in the next
    /// word). Payload `0` is reserved as the escape — it is never produced
    /// by the `+1`-biased inline path, since that path's smallest payload is
    /// `1` (for value `0`).
    pub fn push_int(&mut self, value: i32) -> usize {
        let at = self.offset();
        if (0..0xfffe).contains(&value) {
            self.emit(Opcode::Push, ((value as u32 + 1) << 8) | PushType::Integer as u32);
        } else {
            self.emit(Opcode::Push, PushType::Integer as u32);
            self.words.push(value as u32 as Word);
        }
        at
    }

    pub fn push_double(&mut self, value: f64) -> usize {
        let at = self.offset();
        self.emit(Opcode::Push, PushType::Double as u32);
        self.words.push(value.to_bits());
        at
    }

    pub fn push_string(&mut self, value: &str) -> usize {
        let at = self.offset();
        self.push_text(PushType::String, value);
        at
    }

    pub fn push_global(&mut self, name: &str) -> usize {
        let at = self.offset();
        self.push_text(PushType::Global, name);
        at
    }

    fn push_text(&mut self, ty: PushType, text: &str) {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0); // NUL terminator, mirroring the source encoding
        let len = bytes.len();
        self.emit(Opcode::Push, ((len as u32) << 8) | ty as u32);
        pack_bytes(&mut self.words, &bytes);
    }

    pub fn push_locals(&mut self, arity: u32) -> usize {
        self.emit(Opcode::Push, (arity << 8) | PushType::Local as u32)
    }

    pub fn pop_locals(&mut self) -> usize {
        self.emit(Opcode::Pop, 0)
    }

    pub fn pop_discard(&mut self) -> usize {
        self.emit(Opcode::Pop, 1)
    }

    pub fn filter(&mut self, n: u32) -> usize {
        self.emit(Opcode::Filter, n)
    }

    pub fn update(&mut self, n: u32, partial: bool) -> usize {
        let mod_ = n | if partial { UPDATE_PARTIAL_FLAG } else { 0 };
        self.emit(Opcode::Update, mod_)
    }

    pub fn replace(&mut self, n: u32) -> usize {
        self.emit(Opcode::Replace, n)
    }

    pub fn create(&mut self, n: u32) -> usize {
        self.emit(Opcode::Create, n)
    }

    pub fn set(&mut self) -> usize {
        self.emit(Opcode::Set, 0)
    }

    pub fn set_field(&mut self) -> usize {
        self.emit(Opcode::Set, 1)
    }

    pub fn get_field(&mut self) -> usize {
        self.emit(Opcode::Get, GET_FIELD_FLAG)
    }

    pub fn get_local(&mut self, idx: u32) -> usize {
        self.emit(Opcode::Get, GET_LOCAL_FLAG | idx)
    }

    pub fn call(&mut self, narg: u32) -> usize {
        self.emit(Opcode::Call, narg)
    }

    pub fn cmp(&mut self, op: RelOp) -> usize {
        self.emit(Opcode::Cmp, op as u32)
    }

    /// Encode a branch's `(kind, disp)` into the args field: kind in the top
    /// 2 bits (22-23), one sign bit (21), 21 magnitude bits (0-20). Clean and
    /// symmetric per spec.md §3.4's literal wording (see DESIGN.md for the
    /// deliberate divergence from the original's asymmetric decode macro).
    fn branch_args(kind: BranchKind, disp: i32) -> u32 {
        let magnitude = disp.unsigned_abs() & BRANCH_MAGNITUDE_MASK;
        let sign = if disp < 0 { BRANCH_SIGN_BIT } else { 0 };
        ((kind as u32) << BRANCH_KIND_SHIFT) | sign | magnitude
    }

    /// Emit a branch with a placeholder displacement of `0`, to be patched
    /// later via [`Chunk::patch_branch`] once the target offset is known
    /// (§9: "branch patching via opaque placeholder handles").
    pub fn branch_placeholder(&mut self, kind: BranchKind) -> BranchPlaceholder {
        let at = self.emit(Opcode::Branch, Self::branch_args(kind, 0));
        BranchPlaceholder(at)
    }

    pub fn branch(&mut self, kind: BranchKind, disp: i32) -> usize {
        self.emit(Opcode::Branch, Self::branch_args(kind, disp))
    }

    /// Patch a previously emitted placeholder branch with a real
    /// displacement, computed relative to the word after the branch.
    pub fn patch_branch(&mut self, placeholder: BranchPlaceholder, kind: BranchKind, disp: i32) {
        self.words[placeholder.0] = make_word(Opcode::Branch as u8, Self::branch_args(kind, disp));
    }

    pub fn debug(&mut self, text: &str) -> usize {
        let at = self.offset();
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        let len = bytes.len();
        self.emit(Opcode::Debug, len as u32);
        pack_bytes(&mut self.words, &bytes);
        at
    }

    pub fn halt(&mut self) -> usize {
        self.emit(Opcode::Halt, 0)
    }

    /// Decode the instruction at word offset `pc`, returning it plus the
    /// number of words it (and any trailing operand words) occupied.
    pub fn decode_at(&self, pc: usize) -> Result<(Instr, usize), ChunkError> {
        let word = *self
            .words
            .get(pc)
            .ok_or(ChunkError::OutOfBounds { offset: pc })?;
        let opcode = Opcode::from_u8(op_code(word)).ok_or(ChunkError::BadOpcode {
            offset: pc,
            byte: op_code(word),
        })?;
        let args = op_args(word);

        match opcode {
            Opcode::Push => self.decode_push(pc, args),
            Opcode::Pop => {
                let instr = match args {
                    0 => Instr::PopLocals,
                    1 => Instr::PopDiscard,
                    other => {
                        return Err(ChunkError::BadArgs {
                            offset: pc,
                            reason: format!("unknown POP kind {other}"),
                        })
                    }
                };
                Ok((instr, 1))
            }
            Opcode::Filter => Ok((Instr::Filter(args), 1)),
            Opcode::Update => Ok((
                Instr::Update {
                    n: args & !UPDATE_PARTIAL_FLAG,
                    partial: args & UPDATE_PARTIAL_FLAG != 0,
                },
                1,
            )),
            Opcode::Replace => Ok((Instr::Replace(args), 1)),
            Opcode::Create => Ok((Instr::Create(args), 1)),
            Opcode::Set => {
                let instr = match args {
                    0 => Instr::Set,
                    1 => Instr::SetField,
                    other => {
                        return Err(ChunkError::BadArgs {
                            offset: pc,
                            reason: format!("unknown SET kind {other}"),
                        })
                    }
                };
                Ok((instr, 1))
            }
            Opcode::Get => {
                if args & GET_FIELD_FLAG != 0 {
                    Ok((Instr::GetField, 1))
                } else if args & GET_LOCAL_FLAG != 0 {
                    Ok((Instr::GetLocal(args & GET_LOCAL_MASK), 1))
                } else {
                    Err(ChunkError::BadArgs {
                        offset: pc,
                        reason: "GET with neither FIELD nor LOCAL flag set".to_string(),
                    })
                }
            }
            Opcode::Call => Ok((Instr::Call(args), 1)),
            Opcode::Cmp => {
                let op = RelOp::from_u8(args as u8).ok_or_else(|| ChunkError::BadArgs {
                    offset: pc,
                    reason: format!("unknown CMP relop {args}"),
                })?;
                Ok((Instr::Cmp(op), 1))
            }
            Opcode::Branch => {
                let kind_bits = (args >> BRANCH_KIND_SHIFT) as u8;
                let kind = BranchKind::from_u8(kind_bits).ok_or_else(|| ChunkError::BadArgs {
                    offset: pc,
                    reason: format!("unknown BRANCH kind {kind_bits}"),
                })?;
                let magnitude = (args & BRANCH_MAGNITUDE_MASK) as i32;
                let disp = if args & BRANCH_SIGN_BIT != 0 {
                    -magnitude
                } else {
                    magnitude
                };
                Ok((Instr::Branch { kind, disp }, 1))
            }
            Opcode::Debug => {
                let len = args as usize;
                let n = words_for_bytes(len);
                let text_words = self.words.get(pc + 1..pc + 1 + n).ok_or(ChunkError::OutOfBounds {
                    offset: pc + 1,
                })?;
                let bytes = unpack_bytes(text_words, len);
                let text = decode_nul_terminated(&bytes, pc)?;
                Ok((Instr::Debug(text), 1 + n))
            }
            Opcode::Halt => Ok((Instr::Halt, 1)),
        }
    }

    fn decode_push(&self, pc: usize, args: u32) -> Result<(Instr, usize), ChunkError> {
        let ty_bits = (args & 0xff) as u8;
        let data = args >> 8;
        let ty = PushType::from_u8(ty_bits).ok_or(ChunkError::BadArgs {
            offset: pc,
            reason: format!("unknown PUSH type {ty_bits}"),
        })?;
        match ty {
            PushType::Nil => Ok((Instr::PushNil, 1)),
            PushType::Local => Ok((Instr::PushLocals(data), 1)),
            PushType::Integer => {
                if data == 0 {
                    let raw = *self.words.get(pc + 1).ok_or(ChunkError::OutOfBounds {
                        offset: pc + 1,
                    })?;
                    Ok((Instr::PushInt(raw as u32 as i32), 2))
                } else {
                    Ok((Instr::PushInt(data as i32 - 1), 1))
                }
            }
            PushType::Double => {
                let raw = *self.words.get(pc + 1).ok_or(ChunkError::OutOfBounds {
                    offset: pc + 1,
                })?;
                Ok((Instr::PushDouble(f64::from_bits(raw)), 2))
            }
            PushType::String | PushType::Global => {
                let len = data as usize;
                let n = words_for_bytes(len);
                let text_words = self.words.get(pc + 1..pc + 1 + n).ok_or(ChunkError::OutOfBounds {
                    offset: pc + 1,
                })?;
                let bytes = unpack_bytes(text_words, len);
                let text = decode_nul_terminated(&bytes, pc)?;
                let instr = if ty == PushType::String {
                    Instr::PushString(text)
                } else {
                    Instr::PushGlobal(text)
                };
                Ok((instr, 1 + n))
            }
        }
    }

    /// Decode every instruction in the chunk, in order (§8 invariant 5's
    /// disassembly half).
    pub fn decode_all(&self) -> Result<Vec<Instr>, ChunkError> {
        let mut out = Vec::new();
        let mut pc = 0;
        while pc < self.words.len() {
            let (instr, consumed) = self.decode_at(pc)?;
            out.push(instr);
            pc += consumed;
        }
        Ok(out)
    }
}

fn decode_nul_terminated(bytes: &[u8], offset: usize) -> Result<String, ChunkError> {
    let end = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ChunkError::BadArgs {
            offset,
            reason: "string operand missing NUL terminator".to_string(),
        })?;
    String::from_utf8(bytes[..end].to_vec()).map_err(|_| ChunkError::BadArgs {
        offset,
        reason: "string operand is not valid UTF-8".to_string(),
    })
}

/// A handle to a branch instruction emitted with displacement `0`, to be
/// filled in later once the target is known. Opaque: callers cannot recover
/// a raw chunk offset from it (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchPlaceholder(usize);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk offset {offset} is out of bounds")]
    OutOfBounds { offset: usize },
    #[error("unknown opcode byte {byte} at offset {offset}")]
    BadOpcode { offset: usize, byte: u8 },
    #[error("bad operand at offset {offset}: {reason}")]
    BadArgs { offset: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_inline_vs_extended_round_trip() {
        // S6: 42 is inline (one word), 100_000 is extended (two words).
        let mut c = Chunk::new();
        c.push_int(42);
        c.push_int(100_000);
        assert_eq!(c.len(), 3);
        let decoded = c.decode_all().unwrap();
        assert_eq!(decoded, vec![Instr::PushInt(42), Instr::PushInt(100_000)]);
    }

    #[test]
    fn zero_is_inline_not_extended() {
        let mut c = Chunk::new();
        c.push_int(0);
        assert_eq!(c.len(), 1, "0 packs inline as payload 1, no escape word");
        assert_eq!(c.decode_all().unwrap(), vec![Instr::PushInt(0)]);
    }

    #[test]
    fn string_round_trips_through_padding() {
        let mut c = Chunk::new();
        c.push_string("hello");
        c.push_global("widget.count");
        c.halt();
        let decoded = c.decode_all().unwrap();
        assert_eq!(
            decoded,
            vec![
                Instr::PushString("hello".to_string()),
                Instr::PushGlobal("widget.count".to_string()),
                Instr::Halt,
            ]
        );
    }

    #[test]
    fn branch_placeholder_patches_to_requested_displacement() {
        // S5: PUSH INT 1; BRANCH_NE +0; PUSH INT 99; HALT, then re-patch to +1.
        let mut c = Chunk::new();
        c.push_int(1);
        let placeholder = c.branch_placeholder(BranchKind::IfFalse);
        c.push_int(99);
        c.halt();
        let decoded = c.decode_all().unwrap();
        assert_eq!(
            decoded[1],
            Instr::Branch {
                kind: BranchKind::IfFalse,
                disp: 0
            }
        );

        c.patch_branch(placeholder, BranchKind::IfFalse, 1);
        let decoded = c.decode_all().unwrap();
        assert_eq!(
            decoded[1],
            Instr::Branch {
                kind: BranchKind::IfFalse,
                disp: 1
            }
        );
    }

    #[test]
    fn negative_branch_displacement_round_trips() {
        let mut c = Chunk::new();
        c.branch(BranchKind::Always, -3);
        assert_eq!(
            c.decode_all().unwrap(),
            vec![Instr::Branch {
                kind: BranchKind::Always,
                disp: -3
            }]
        );
    }

    #[test]
    fn update_partial_flag_is_independent_of_field_count() {
        let mut c = Chunk::new();
        c.update(5, true);
        c.update(5, false);
        assert_eq!(
            c.decode_all().unwrap(),
            vec![
                Instr::Update { n: 5, partial: true },
                Instr::Update { n: 5, partial: false },
            ]
        );
    }

    #[test]
    fn full_instruction_set_round_trips() {
        let mut c = Chunk::new();
        c.push_nil();
        c.push_double(2.5);
        c.push_locals(2);
        c.get_local(1);
        c.pop_locals();
        c.pop_discard();
        c.filter(2);
        c.replace(1);
        c.create(3);
        c.set();
        c.set_field();
        c.get_field();
        c.call(2);
        c.cmp(RelOp::Ge);
        c.debug("checkpoint");
        c.halt();
        let decoded = c.decode_all().unwrap();
        assert_eq!(decoded.len(), 16);
        assert_eq!(decoded[0], Instr::PushNil);
        assert_eq!(decoded[1], Instr::PushDouble(2.5));
        assert_eq!(decoded[13], Instr::Cmp(RelOp::Ge));
        assert_eq!(decoded[14], Instr::Debug("checkpoint".to_string()));
        assert_eq!(decoded[15], Instr::Halt);
    }
}
