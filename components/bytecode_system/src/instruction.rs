//! Instruction decoding
//!
//! Decodes one opcode plus its inline operand from a code buffer.

use thiserror::Error;

use crate::opcode::{Opcode, OperandLayout};

/// Decoded inline operand
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Single integer operand
    U32(u32),
    /// Two integer operands
    Pair(u32, u32),
    /// Branch offset relative to the next instruction
    Branch(i32),
    /// Double immediate
    F64(f64),
}

/// Failure to decode an instruction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Opcode byte is not part of the instruction set
    #[error("unknown opcode 0x{byte:02x} at offset {offset}")]
    UnknownOpcode {
        /// Offset of the opcode byte
        offset: usize,
        /// The offending byte
        byte: u8,
    },
    /// Operand runs past the end of the code buffer
    #[error("truncated instruction at offset {offset}")]
    Truncated {
        /// Offset of the opcode byte
        offset: usize,
    },
    /// Branch target is outside the code buffer
    #[error("branch at offset {offset} targets {target} outside the code buffer")]
    BranchOutOfBounds {
        /// Offset of the branch instruction
        offset: usize,
        /// Computed target offset
        target: i64,
    },
}

/// A single decoded bytecode instruction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    /// Offset of the opcode byte
    pub offset: usize,
    /// The opcode
    pub opcode: Opcode,
    /// The inline operand
    pub operand: Operand,
    /// Offset of the following instruction
    pub next: usize,
}

impl Instruction {
    /// First integer operand (0 when absent)
    pub fn arg(&self) -> u32 {
        match self.operand {
            Operand::U32(v) | Operand::Pair(v, _) => v,
            _ => 0,
        }
    }

    /// Second integer operand (0 when absent)
    pub fn arg2(&self) -> u32 {
        match self.operand {
            Operand::Pair(_, v) => v,
            _ => 0,
        }
    }

    /// Double immediate (NaN when absent)
    pub fn double(&self) -> f64 {
        match self.operand {
            Operand::F64(v) => v,
            _ => f64::NAN,
        }
    }

    /// Absolute branch target, if this is a branch
    pub fn target(&self) -> Option<usize> {
        match self.operand {
            Operand::Branch(rel) => Some((self.next as i64 + rel as i64) as usize),
            _ => None,
        }
    }
}

fn read_u32(code: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([code[at], code[at + 1], code[at + 2], code[at + 3]])
}

/// Decode the instruction starting at `offset`.
///
/// Branch targets are validated against the code buffer bound.
///
/// # Example
///
/// ```
/// use bytecode_system::{decode, CodeBuilder, Opcode};
///
/// let mut code = CodeBuilder::new();
/// code.op_u32(Opcode::GetLocal, 0);
/// code.op(Opcode::ReturnValue);
/// let bytes = code.finish();
///
/// let first = decode(&bytes, 0).unwrap();
/// assert_eq!(first.opcode, Opcode::GetLocal);
/// assert_eq!(first.arg(), 0);
/// assert_eq!(first.next, 5);
/// ```
pub fn decode(code: &[u8], offset: usize) -> Result<Instruction, DecodeError> {
    let byte = *code.get(offset).ok_or(DecodeError::Truncated { offset })?;
    let opcode = Opcode::from_byte(byte).ok_or(DecodeError::UnknownOpcode { offset, byte })?;
    let layout = opcode.layout();
    let start = offset + 1;
    let next = start + layout.width();
    if next > code.len() {
        return Err(DecodeError::Truncated { offset });
    }

    let operand = match layout {
        OperandLayout::None => Operand::None,
        OperandLayout::U32 => Operand::U32(read_u32(code, start)),
        OperandLayout::U32Pair => Operand::Pair(read_u32(code, start), read_u32(code, start + 4)),
        OperandLayout::Branch => {
            let rel = read_u32(code, start) as i32;
            let target = next as i64 + rel as i64;
            if target < 0 || target >= code.len() as i64 {
                return Err(DecodeError::BranchOutOfBounds { offset, target });
            }
            Operand::Branch(rel)
        }
        OperandLayout::F64 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&code[start..start + 8]);
            Operand::F64(f64::from_le_bytes(raw))
        }
    };

    Ok(Instruction {
        offset,
        opcode,
        operand,
        next,
    })
}

/// Decode every instruction of a code buffer in order
pub fn decode_all(code: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    let mut out = Vec::new();
    let mut pc = 0;
    while pc < code.len() {
        let inst = decode(code, pc)?;
        pc = inst.next;
        out.push(inst);
    }
    Ok(out)
}
