use std::fmt;

use crate::metadata::token::Token;

/// The kind of operand an opcode carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand
    None,
    /// Signed 8-bit immediate or short branch offset
    Int8,
    /// Unsigned 8-bit immediate (short local / argument index)
    UInt8,
    /// Signed 16-bit immediate
    Int16,
    /// Unsigned 16-bit immediate (local / argument index)
    UInt16,
    /// Signed 32-bit immediate or long branch offset
    Int32,
    /// Unsigned 32-bit immediate
    UInt32,
    /// Signed 64-bit immediate
    Int64,
    /// Unsigned 64-bit immediate
    UInt64,
    /// 32-bit floating point immediate
    Float32,
    /// 64-bit floating point immediate
    Float64,
    /// Metadata token
    Token,
    /// Jump table of the `switch` instruction
    Switch,
}

/// How an instruction transfers control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// Branches to its target or falls through
    ConditionalBranch,
    /// Always branches to its target
    UnconditionalBranch,
    /// Branches through a jump table or falls through
    Switch,
    /// Calls another method and continues
    Call,
    /// Returns from the method
    Return,
    /// Throws an exception
    Throw,
    /// Ends a finally, fault or filter block
    EndFinally,
}

/// Static description of an opcode
#[derive(Debug, Clone, Copy)]
pub struct CilInstruction {
    /// Mnemonic, empty for reserved opcodes
    pub instr: &'static str,
    /// The operand following the opcode
    pub op_type: OperandType,
    /// Control flow behavior
    pub flow: FlowType,
}

/// Immediate operand values
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub enum Immediate {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
}

impl From<Immediate> for u64 {
    /// Signed values are sign-extended, so branch offsets can be added with wrapping arithmetic
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn from(value: Immediate) -> Self {
        match value {
            Immediate::Int8(v) => i64::from(v) as u64,
            Immediate::UInt8(v) => u64::from(v),
            Immediate::Int16(v) => i64::from(v) as u64,
            Immediate::UInt16(v) => u64::from(v),
            Immediate::Int32(v) => i64::from(v) as u64,
            Immediate::UInt32(v) => u64::from(v),
            Immediate::Int64(v) => v as u64,
            Immediate::UInt64(v) => v,
            Immediate::Float32(v) => u64::from(v.to_bits()),
            Immediate::Float64(v) => v.to_bits(),
        }
    }
}

/// A decoded instruction operand
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// An immediate value or branch offset
    Immediate(Immediate),
    /// A metadata token
    Token(Token),
    /// The relative targets of a `switch`
    Switch(Vec<i32>),
}

/// A single decoded CIL instruction
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Relative virtual address of the instruction
    pub rva: u64,
    /// Offset of the instruction within the decoded buffer
    pub offset: u64,
    /// Encoded size, opcode and operand included
    pub size: u64,
    /// The opcode (second byte for `0xFE` prefixed opcodes)
    pub opcode: u8,
    /// `0xFE` for two-byte opcodes, `0` otherwise
    pub prefix: u8,
    /// The mnemonic
    pub mnemonic: &'static str,
    /// Control flow behavior
    pub flow_type: FlowType,
    /// The decoded operand
    pub operand: Operand,
    /// Absolute branch targets (RVAs) for branches and switches
    pub branch_targets: Vec<u64>,
}

impl Instruction {
    /// The metadata token operand, if any
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        match self.operand {
            Operand::Token(token) => Some(token),
            _ => None,
        }
    }

    /// Offset of the token operand within the decoded buffer
    ///
    /// Token operands always occupy the last four bytes of the instruction.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn token_offset(&self) -> Option<usize> {
        self.token()
            .map(|_| (self.offset + self.size - 4) as usize)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}: {}", self.offset, self.mnemonic)?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Token(token) => write!(f, " 0x{:08x}", token.value()),
            Operand::Immediate(_) if !self.branch_targets.is_empty() => {
                write!(f, " 0x{:x}", self.branch_targets[0])
            }
            Operand::Immediate(value) => match value {
                Immediate::Float32(v) => write!(f, " {v}"),
                Immediate::Float64(v) => write!(f, " {v}"),
                Immediate::Int8(v) => write!(f, " {v}"),
                Immediate::Int16(v) => write!(f, " {v}"),
                Immediate::Int32(v) => write!(f, " {v}"),
                Immediate::Int64(v) => write!(f, " {v}"),
                other => write!(f, " {}", u64::from(*other)),
            },
            Operand::Switch(_) => {
                let targets = self
                    .branch_targets
                    .iter()
                    .map(|target| format!("0x{target:x}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, " ({targets})")
            }
        }
    }
}
