//! CIL (Common Intermediate Language) instruction decoding.
//!
//! The patcher decodes method bodies to find the metadata tokens embedded in them; the
//! `MethodDef` tokens among those are rewritten when the method table is renumbered.
//!
//! # Key Types
//! - [`Instruction`] - A decoded CIL instruction
//! - [`Operand`] - Instruction operands (immediates, tokens, switch tables)
//! - [`FlowType`] - How instructions affect control flow
//!
//! # Main Functions
//! - [`decode_instruction`] - Decode a single instruction
//! - [`decode_stream`] - Decode a sequence of instructions
//!
//! # Example
//! ```rust
//! use modinit::disassembler::decode_instruction;
//! use modinit::Parser;
//! let bytecode = &[0x00, 0x2A]; // nop, ret
//! let mut parser = Parser::new(bytecode);
//! let instruction = decode_instruction(&mut parser, 0x1000)?;
//! assert_eq!(instruction.mnemonic, "nop");
//! # Ok::<(), modinit::Error>(())
//! ```

mod decoder;
mod instruction;
mod instructions;

pub use decoder::{decode_instruction, decode_stream};
pub use instruction::{CilInstruction, FlowType, Immediate, Instruction, Operand, OperandType};
pub use instructions::*;
