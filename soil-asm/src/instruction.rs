//! The `Instruction` enum and the byte-code decoder/encoder.
//!
//! Encoding (spec §4.2): one opcode byte, then operand bytes. A two-register
//! operand is one byte (low nibble, high nibble); a word operand is eight
//! little-endian bytes; a byte operand is one byte.

use core::fmt;

use crate::{
    opcodes,
    reg::{self, InvalidRegister, Reg},
    Word,
};

/// A decoded Soil instruction together with its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,

    Panic,
    TryStart(Word),
    TryEnd,

    Move(Reg, Reg),
    MoveImmediate(Reg, Word),
    MoveImmediateByte(Reg, u8),
    Load(Reg, Reg),
    LoadByte(Reg, Reg),
    Store(Reg, Reg),
    StoreByte(Reg, Reg),
    Push(Reg),
    Pop(Reg),

    Jump(Word),
    CJump(Word),
    Call(Word),
    Ret,
    Syscall(u8),

    Cmp(Reg, Reg),
    IsEqual,
    IsLess,
    IsGreater,
    IsLessEqual,
    IsGreaterEqual,
    IsNotEqual,
    FCmp(Reg, Reg),
    FIsEqual,
    FIsLess,
    FIsGreater,
    FIsLessEqual,
    FIsGreaterEqual,
    FIsNotEqual,
    IntToFloat(Reg),
    FloatToInt(Reg),

    Add(Reg, Reg),
    Sub(Reg, Reg),
    Mul(Reg, Reg),
    Div(Reg, Reg),
    Rem(Reg, Reg),
    FAdd(Reg, Reg),
    FSub(Reg, Reg),
    FMul(Reg, Reg),
    FDiv(Reg, Reg),

    And(Reg, Reg),
    Or(Reg, Reg),
    Xor(Reg, Reg),
    Not(Reg),
}

/// Why [`Instruction::decode`] failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Ran out of bytes while reading an opcode or its operands.
    Truncated {
        /// Offset at which the read was attempted.
        at: usize,
    },
    /// The opcode byte doesn't match any entry in spec §4.2's table.
    UnknownOpcode {
        /// Offset of the unrecognized opcode byte.
        at: usize,
        /// The byte itself.
        opcode: u8,
    },
    /// A register operand named an index outside `0..=7`.
    BadRegister {
        /// Offset of the operand byte.
        at: usize,
        source: InvalidRegister,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { at } => {
                write!(f, "byte-code truncated while decoding instruction at offset {at}")
            }
            DecodeError::UnknownOpcode { at, opcode } => {
                write!(f, "unknown opcode 0x{opcode:02x} at offset {at}")
            }
            DecodeError::BadRegister { at, source } => {
                write!(f, "{source} (operand at offset {at})")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

fn read_u8(code: &[u8], ip: usize) -> Result<u8, DecodeError> {
    code.get(ip).copied().ok_or(DecodeError::Truncated { at: ip })
}

fn read_word(code: &[u8], ip: usize) -> Result<Word, DecodeError> {
    let bytes = code
        .get(ip..ip + 8)
        .ok_or(DecodeError::Truncated { at: ip })?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(Word::from_le_bytes(buf))
}

fn read_regs(code: &[u8], ip: usize) -> Result<(Reg, Reg), DecodeError> {
    let byte = read_u8(code, ip)?;
    reg::unpack_two(byte).map_err(|source| DecodeError::BadRegister { at: ip, source })
}

fn read_reg(code: &[u8], ip: usize) -> Result<Reg, DecodeError> {
    let byte = read_u8(code, ip)?;
    Reg::try_from(byte).map_err(|source| DecodeError::BadRegister { at: ip, source })
}

impl Instruction {
    /// Decodes the instruction starting at `ip`. Returns the instruction and
    /// the offset of the byte following it; does not mutate any state.
    pub fn decode(code: &[u8], ip: usize) -> Result<(Instruction, usize), DecodeError> {
        let op = read_u8(code, ip)?;
        let mut at = ip + 1;

        macro_rules! regs {
            () => {{
                let pair = read_regs(code, at)?;
                at += 1;
                pair
            }};
        }
        macro_rules! reg {
            () => {{
                let r = read_reg(code, at)?;
                at += 1;
                r
            }};
        }
        macro_rules! word {
            () => {{
                let w = read_word(code, at)?;
                at += 8;
                w
            }};
        }
        macro_rules! byte {
            () => {{
                let b = read_u8(code, at)?;
                at += 1;
                b
            }};
        }

        let instruction = match op {
            opcodes::NOP => Instruction::Nop,

            opcodes::PANIC => Instruction::Panic,
            opcodes::TRYSTART => Instruction::TryStart(word!()),
            opcodes::TRYEND => Instruction::TryEnd,

            opcodes::MOVE => {
                let (a, b) = regs!();
                Instruction::Move(a, b)
            }
            opcodes::MOVEI => {
                let r = reg!();
                Instruction::MoveImmediate(r, word!())
            }
            opcodes::MOVEIB => {
                let r = reg!();
                Instruction::MoveImmediateByte(r, byte!())
            }
            opcodes::LOAD => {
                let (a, b) = regs!();
                Instruction::Load(a, b)
            }
            opcodes::LOADB => {
                let (a, b) = regs!();
                Instruction::LoadByte(a, b)
            }
            opcodes::STORE => {
                let (a, b) = regs!();
                Instruction::Store(a, b)
            }
            opcodes::STOREB => {
                let (a, b) = regs!();
                Instruction::StoreByte(a, b)
            }
            opcodes::PUSH => Instruction::Push(reg!()),
            opcodes::POP => Instruction::Pop(reg!()),

            opcodes::JUMP => Instruction::Jump(word!()),
            opcodes::CJUMP => Instruction::CJump(word!()),
            opcodes::CALL => Instruction::Call(word!()),
            opcodes::RET => Instruction::Ret,
            opcodes::SYSCALL => Instruction::Syscall(byte!()),

            opcodes::CMP => {
                let (a, b) = regs!();
                Instruction::Cmp(a, b)
            }
            opcodes::ISEQUAL => Instruction::IsEqual,
            opcodes::ISLESS => Instruction::IsLess,
            opcodes::ISGREATER => Instruction::IsGreater,
            opcodes::ISLESSEQUAL => Instruction::IsLessEqual,
            opcodes::ISGREATEREQUAL => Instruction::IsGreaterEqual,
            opcodes::ISNOTEQUAL => Instruction::IsNotEqual,
            opcodes::FCMP => {
                let (a, b) = regs!();
                Instruction::FCmp(a, b)
            }
            opcodes::FISEQUAL => Instruction::FIsEqual,
            opcodes::FISLESS => Instruction::FIsLess,
            opcodes::FISGREATER => Instruction::FIsGreater,
            opcodes::FISLESSEQUAL => Instruction::FIsLessEqual,
            opcodes::FISGREATEREQUAL => Instruction::FIsGreaterEqual,
            opcodes::FISNOTEQUAL => Instruction::FIsNotEqual,
            opcodes::INTTOFLOAT => Instruction::IntToFloat(reg!()),
            opcodes::FLOATTOINT => Instruction::FloatToInt(reg!()),

            opcodes::ADD => {
                let (a, b) = regs!();
                Instruction::Add(a, b)
            }
            opcodes::SUB => {
                let (a, b) = regs!();
                Instruction::Sub(a, b)
            }
            opcodes::MUL => {
                let (a, b) = regs!();
                Instruction::Mul(a, b)
            }
            opcodes::DIV => {
                let (a, b) = regs!();
                Instruction::Div(a, b)
            }
            opcodes::REM => {
                let (a, b) = regs!();
                Instruction::Rem(a, b)
            }
            opcodes::FADD => {
                let (a, b) = regs!();
                Instruction::FAdd(a, b)
            }
            opcodes::FSUB => {
                let (a, b) = regs!();
                Instruction::FSub(a, b)
            }
            opcodes::FMUL => {
                let (a, b) = regs!();
                Instruction::FMul(a, b)
            }
            opcodes::FDIV => {
                let (a, b) = regs!();
                Instruction::FDiv(a, b)
            }

            opcodes::AND => {
                let (a, b) = regs!();
                Instruction::And(a, b)
            }
            opcodes::OR => {
                let (a, b) = regs!();
                Instruction::Or(a, b)
            }
            opcodes::XOR => {
                let (a, b) = regs!();
                Instruction::Xor(a, b)
            }
            opcodes::NOT => Instruction::Not(reg!()),

            _ => return Err(DecodeError::UnknownOpcode { at: ip, opcode: op }),
        };

        Ok((instruction, at))
    }

    /// Encodes the instruction, appending the bytes to `out`. Inverse of
    /// [`Instruction::decode`]; used by the binary re-emitter and by
    /// round-trip tests.
    pub fn encode(&self, out: &mut Vec<u8>) {
        fn regs(out: &mut Vec<u8>, a: Reg, b: Reg) {
            out.push(reg::pack_two(a, b));
        }
        fn word(out: &mut Vec<u8>, w: Word) {
            out.extend_from_slice(&w.to_le_bytes());
        }

        match *self {
            Instruction::Nop => out.push(opcodes::NOP),

            Instruction::Panic => out.push(opcodes::PANIC),
            Instruction::TryStart(w) => {
                out.push(opcodes::TRYSTART);
                word(out, w);
            }
            Instruction::TryEnd => out.push(opcodes::TRYEND),

            Instruction::Move(a, b) => {
                out.push(opcodes::MOVE);
                regs(out, a, b);
            }
            Instruction::MoveImmediate(r, w) => {
                out.push(opcodes::MOVEI);
                out.push(r.to_u8());
                word(out, w);
            }
            Instruction::MoveImmediateByte(r, b) => {
                out.push(opcodes::MOVEIB);
                out.push(r.to_u8());
                out.push(b);
            }
            Instruction::Load(a, b) => {
                out.push(opcodes::LOAD);
                regs(out, a, b);
            }
            Instruction::LoadByte(a, b) => {
                out.push(opcodes::LOADB);
                regs(out, a, b);
            }
            Instruction::Store(a, b) => {
                out.push(opcodes::STORE);
                regs(out, a, b);
            }
            Instruction::StoreByte(a, b) => {
                out.push(opcodes::STOREB);
                regs(out, a, b);
            }
            Instruction::Push(r) => {
                out.push(opcodes::PUSH);
                out.push(r.to_u8());
            }
            Instruction::Pop(r) => {
                out.push(opcodes::POP);
                out.push(r.to_u8());
            }

            Instruction::Jump(w) => {
                out.push(opcodes::JUMP);
                word(out, w);
            }
            Instruction::CJump(w) => {
                out.push(opcodes::CJUMP);
                word(out, w);
            }
            Instruction::Call(w) => {
                out.push(opcodes::CALL);
                word(out, w);
            }
            Instruction::Ret => out.push(opcodes::RET),
            Instruction::Syscall(n) => {
                out.push(opcodes::SYSCALL);
                out.push(n);
            }

            Instruction::Cmp(a, b) => {
                out.push(opcodes::CMP);
                regs(out, a, b);
            }
            Instruction::IsEqual => out.push(opcodes::ISEQUAL),
            Instruction::IsLess => out.push(opcodes::ISLESS),
            Instruction::IsGreater => out.push(opcodes::ISGREATER),
            Instruction::IsLessEqual => out.push(opcodes::ISLESSEQUAL),
            Instruction::IsGreaterEqual => out.push(opcodes::ISGREATEREQUAL),
            Instruction::IsNotEqual => out.push(opcodes::ISNOTEQUAL),
            Instruction::FCmp(a, b) => {
                out.push(opcodes::FCMP);
                regs(out, a, b);
            }
            Instruction::FIsEqual => out.push(opcodes::FISEQUAL),
            Instruction::FIsLess => out.push(opcodes::FISLESS),
            Instruction::FIsGreater => out.push(opcodes::FISGREATER),
            Instruction::FIsLessEqual => out.push(opcodes::FISLESSEQUAL),
            Instruction::FIsGreaterEqual => out.push(opcodes::FISGREATEREQUAL),
            Instruction::FIsNotEqual => out.push(opcodes::FISNOTEQUAL),
            Instruction::IntToFloat(r) => {
                out.push(opcodes::INTTOFLOAT);
                out.push(r.to_u8());
            }
            Instruction::FloatToInt(r) => {
                out.push(opcodes::FLOATTOINT);
                out.push(r.to_u8());
            }

            Instruction::Add(a, b) => {
                out.push(opcodes::ADD);
                regs(out, a, b);
            }
            Instruction::Sub(a, b) => {
                out.push(opcodes::SUB);
                regs(out, a, b);
            }
            Instruction::Mul(a, b) => {
                out.push(opcodes::MUL);
                regs(out, a, b);
            }
            Instruction::Div(a, b) => {
                out.push(opcodes::DIV);
                regs(out, a, b);
            }
            Instruction::Rem(a, b) => {
                out.push(opcodes::REM);
                regs(out, a, b);
            }
            Instruction::FAdd(a, b) => {
                out.push(opcodes::FADD);
                regs(out, a, b);
            }
            Instruction::FSub(a, b) => {
                out.push(opcodes::FSUB);
                regs(out, a, b);
            }
            Instruction::FMul(a, b) => {
                out.push(opcodes::FMUL);
                regs(out, a, b);
            }
            Instruction::FDiv(a, b) => {
                out.push(opcodes::FDIV);
                regs(out, a, b);
            }

            Instruction::And(a, b) => {
                out.push(opcodes::AND);
                regs(out, a, b);
            }
            Instruction::Or(a, b) => {
                out.push(opcodes::OR);
                regs(out, a, b);
            }
            Instruction::Xor(a, b) => {
                out.push(opcodes::XOR);
                regs(out, a, b);
            }
            Instruction::Not(r) => {
                out.push(opcodes::NOT);
                out.push(r.to_u8());
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Nop => write!(f, "nop"),
            Instruction::Panic => write!(f, "panic"),
            Instruction::TryStart(w) => write!(f, "trystart {w}"),
            Instruction::TryEnd => write!(f, "tryend"),
            Instruction::Move(a, b) => write!(f, "move {a}, {b}"),
            Instruction::MoveImmediate(r, w) => write!(f, "movei {r}, {w}"),
            Instruction::MoveImmediateByte(r, b) => write!(f, "moveib {r}, {b}"),
            Instruction::Load(a, b) => write!(f, "load {a}, {b}"),
            Instruction::LoadByte(a, b) => write!(f, "loadb {a}, {b}"),
            Instruction::Store(a, b) => write!(f, "store {a}, {b}"),
            Instruction::StoreByte(a, b) => write!(f, "storeb {a}, {b}"),
            Instruction::Push(r) => write!(f, "push {r}"),
            Instruction::Pop(r) => write!(f, "pop {r}"),
            Instruction::Jump(w) => write!(f, "jump {w}"),
            Instruction::CJump(w) => write!(f, "cjump {w}"),
            Instruction::Call(w) => write!(f, "call {w}"),
            Instruction::Ret => write!(f, "ret"),
            Instruction::Syscall(n) => write!(f, "syscall {n}"),
            Instruction::Cmp(a, b) => write!(f, "cmp {a}, {b}"),
            Instruction::IsEqual => write!(f, "isequal"),
            Instruction::IsLess => write!(f, "isless"),
            Instruction::IsGreater => write!(f, "isgreater"),
            Instruction::IsLessEqual => write!(f, "islessequal"),
            Instruction::IsGreaterEqual => write!(f, "isgreaterequal"),
            Instruction::IsNotEqual => write!(f, "isnotequal"),
            Instruction::FCmp(a, b) => write!(f, "fcmp {a}, {b}"),
            Instruction::FIsEqual => write!(f, "fisequal"),
            Instruction::FIsLess => write!(f, "fisless"),
            Instruction::FIsGreater => write!(f, "fisgreater"),
            Instruction::FIsLessEqual => write!(f, "fislessequal"),
            Instruction::FIsGreaterEqual => write!(f, "fisgreaterequal"),
            Instruction::FIsNotEqual => write!(f, "fisnotequal"),
            Instruction::IntToFloat(r) => write!(f, "inttofloat {r}"),
            Instruction::FloatToInt(r) => write!(f, "floattoint {r}"),
            Instruction::Add(a, b) => write!(f, "add {a}, {b}"),
            Instruction::Sub(a, b) => write!(f, "sub {a}, {b}"),
            Instruction::Mul(a, b) => write!(f, "mul {a}, {b}"),
            Instruction::Div(a, b) => write!(f, "div {a}, {b}"),
            Instruction::Rem(a, b) => write!(f, "rem {a}, {b}"),
            Instruction::FAdd(a, b) => write!(f, "fadd {a}, {b}"),
            Instruction::FSub(a, b) => write!(f, "fsub {a}, {b}"),
            Instruction::FMul(a, b) => write!(f, "fmul {a}, {b}"),
            Instruction::FDiv(a, b) => write!(f, "fdiv {a}, {b}"),
            Instruction::And(a, b) => write!(f, "and {a}, {b}"),
            Instruction::Or(a, b) => write!(f, "or {a}, {b}"),
            Instruction::Xor(a, b) => write!(f, "xor {a}, {b}"),
            Instruction::Not(r) => write!(f, "not {r}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::{A, B};
    use test_case::test_case;

    fn round_trip(instruction: Instruction) {
        let mut bytes = Vec::new();
        instruction.encode(&mut bytes);
        let (decoded, consumed) = Instruction::decode(&bytes, 0).unwrap();
        assert_eq!(decoded, instruction);
        assert_eq!(consumed, bytes.len());
    }

    #[test_case(Instruction::Nop)]
    #[test_case(Instruction::Panic)]
    #[test_case(Instruction::TryStart(10))]
    #[test_case(Instruction::TryEnd)]
    #[test_case(Instruction::Move(A, B))]
    #[test_case(Instruction::MoveImmediate(A, 42))]
    #[test_case(Instruction::MoveImmediateByte(A, 7))]
    #[test_case(Instruction::Load(A, B))]
    #[test_case(Instruction::Store(A, B))]
    #[test_case(Instruction::Push(A))]
    #[test_case(Instruction::Pop(A))]
    #[test_case(Instruction::Jump(-1))]
    #[test_case(Instruction::Call(1000))]
    #[test_case(Instruction::Ret)]
    #[test_case(Instruction::Syscall(0))]
    #[test_case(Instruction::Cmp(A, B))]
    #[test_case(Instruction::IsEqual)]
    #[test_case(Instruction::FCmp(A, B))]
    #[test_case(Instruction::FIsLessEqual)]
    #[test_case(Instruction::IntToFloat(A))]
    #[test_case(Instruction::Add(A, B))]
    #[test_case(Instruction::FDiv(A, B))]
    #[test_case(Instruction::And(A, B))]
    #[test_case(Instruction::Not(A))]
    fn decoder_is_total_over_every_opcode(instruction: Instruction) {
        round_trip(instruction);
    }

    #[test]
    fn unknown_opcode_is_a_decode_error() {
        let err = Instruction::decode(&[0xff], 0).unwrap_err();
        assert_eq!(err, DecodeError::UnknownOpcode { at: 0, opcode: 0xff });
    }

    #[test]
    fn truncated_word_operand_is_a_decode_error() {
        // movei a, <missing word>
        let err = Instruction::decode(&[opcodes::MOVEI, 2, 0, 0], 0).unwrap_err();
        assert_eq!(err, DecodeError::Truncated { at: 2 });
    }

    #[test]
    fn out_of_range_register_is_a_decode_error() {
        // push with register index 9
        let err = Instruction::decode(&[opcodes::PUSH, 9], 0).unwrap_err();
        assert_eq!(err, DecodeError::BadRegister { at: 1, source: InvalidRegister(9) });
    }

    #[quickcheck_macros::quickcheck]
    fn encode_then_decode_is_identity_for_two_register_ops(a: u8, b: u8) -> bool {
        let Ok(ra) = Reg::try_from(a % 8) else { return true };
        let Ok(rb) = Reg::try_from(b % 8) else { return true };
        let instruction = Instruction::Add(ra, rb);
        let mut bytes = Vec::new();
        instruction.encode(&mut bytes);
        Instruction::decode(&bytes, 0).map(|(i, _)| i) == Ok(instruction)
    }
}
