//! Code builder - assembles bytecode into a code buffer
//!
//! Emits opcode bytes with their inline operands and resolves branch
//! labels when the buffer is finished.

use core_types::StringId;

use crate::opcode::{Opcode, OperandLayout};

/// Forward- or backward-referenced branch target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Pending branch operand
#[derive(Debug, Clone, Copy)]
struct Fixup {
    operand_at: usize,
    next: usize,
    label: Label,
}

/// Assembles one method body's code buffer
///
/// # Example
///
/// ```
/// use bytecode_system::{CodeBuilder, Opcode};
///
/// let mut code = CodeBuilder::new();
/// let done = code.new_label();
/// code.op(Opcode::PushTrue);
/// code.branch(Opcode::IfTrue, done);
/// code.op(Opcode::PushNull);
/// code.bind(done);
/// code.op(Opcode::ReturnVoid);
///
/// let bytes = code.finish();
/// assert_eq!(bytes.len(), 1 + 5 + 1 + 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct CodeBuilder {
    code: Vec<u8>,
    labels: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
}

impl CodeBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next instruction will be written at
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Emit an opcode without operand
    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        debug_assert_eq!(opcode.layout(), OperandLayout::None, "{:?} takes an operand", opcode);
        self.code.push(opcode as u8);
        self
    }

    /// Emit an opcode with one integer operand
    pub fn op_u32(&mut self, opcode: Opcode, value: u32) -> &mut Self {
        debug_assert_eq!(opcode.layout(), OperandLayout::U32, "{:?} operand shape", opcode);
        self.code.push(opcode as u8);
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Emit an opcode with two integer operands
    pub fn op_pair(&mut self, opcode: Opcode, first: u32, second: u32) -> &mut Self {
        debug_assert_eq!(opcode.layout(), OperandLayout::U32Pair, "{:?} operand shape", opcode);
        self.code.push(opcode as u8);
        self.code.extend_from_slice(&first.to_le_bytes());
        self.code.extend_from_slice(&second.to_le_bytes());
        self
    }

    /// Emit `pushint`
    pub fn push_int(&mut self, value: i32) -> &mut Self {
        self.op_u32(Opcode::PushInt, value as u32)
    }

    /// Emit `pushuint`
    pub fn push_uint(&mut self, value: u32) -> &mut Self {
        self.op_u32(Opcode::PushUint, value)
    }

    /// Emit `pushdouble` with its 8-byte immediate
    pub fn push_double(&mut self, value: f64) -> &mut Self {
        self.code.push(Opcode::PushDouble as u8);
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Emit `pushstring`
    pub fn push_string(&mut self, id: StringId) -> &mut Self {
        self.op_u32(Opcode::PushString, id.0)
    }

    /// Emit `getlocal`
    pub fn get_local(&mut self, index: u32) -> &mut Self {
        self.op_u32(Opcode::GetLocal, index)
    }

    /// Emit `setlocal`
    pub fn set_local(&mut self, index: u32) -> &mut Self {
        self.op_u32(Opcode::SetLocal, index)
    }

    /// Allocate a new unbound label
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind a label to the current offset
    pub fn bind(&mut self, label: Label) -> &mut Self {
        if let Some(slot) = self.labels.get_mut(label.0) {
            *slot = Some(self.code.len());
        }
        self
    }

    /// Emit a branch to `label`
    pub fn branch(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        debug_assert!(opcode.is_branch(), "{:?} is not a branch", opcode);
        self.code.push(opcode as u8);
        let operand_at = self.code.len();
        self.code.extend_from_slice(&0i32.to_le_bytes());
        self.fixups.push(Fixup {
            operand_at,
            next: self.code.len(),
            label,
        });
        self
    }

    /// Resolve labels and return the code buffer.
    ///
    /// A branch to a label that was never bound targets the end of the
    /// buffer and is rejected when it is decoded.
    pub fn finish(mut self) -> Vec<u8> {
        let end = self.code.len();
        for fixup in &self.fixups {
            let target = self
                .labels
                .get(fixup.label.0)
                .copied()
                .flatten()
                .unwrap_or(end);
            let rel = (target as i64 - fixup.next as i64) as i32;
            self.code[fixup.operand_at..fixup.operand_at + 4].copy_from_slice(&rel.to_le_bytes());
        }
        self.code
    }
}
