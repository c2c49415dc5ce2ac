//! CIL instruction decoding.
//!
//! # Example: Decoding a Stream of Instructions
//!
//! ```rust
//! use modinit::{Parser, disassembler::decode_stream};
//! let code = [0x00, 0x2A]; // nop, ret
//! let mut parser = Parser::new(&code);
//! let instrs = decode_stream(&mut parser, 0x1000)?;
//! assert_eq!(instrs.len(), 2);
//! # Ok::<(), modinit::Error>(())
//! ```

use crate::{
    disassembler::{FlowType, Immediate, Instruction, Operand, OperandType, INSTRUCTIONS, INSTRUCTIONS_FE},
    file::parser::Parser,
    metadata::token::Token,
    Result,
};

/// Decodes a continuous stream of CIL instructions until the parser runs out of data.
///
/// # Arguments
///
/// * `parser` - A mutable parser positioned at the start of the instruction stream
/// * `rva` - The relative virtual address of the first instruction in the stream
///
/// # Errors
///
/// Returns an error if the stream contains a reserved or unknown opcode, or an
/// instruction whose operand is truncated.
pub fn decode_stream(parser: &mut Parser, rva: u64) -> Result<Vec<Instruction>> {
    let mut current_rva = rva;
    let mut instructions = Vec::new();

    while parser.has_more_data() {
        let current_offset = parser.pos();
        let instruction = decode_instruction(parser, current_rva)?;

        instructions.push(instruction);

        current_rva += (parser.pos() - current_offset) as u64;
    }

    Ok(instructions)
}

/// Decodes a single CIL instruction from the current parser position.
///
/// # Arguments
///
/// * `parser` - A mutable parser positioned at the start of an instruction
/// * `rva` - The relative virtual address of the instruction being decoded
///
/// # Errors
///
/// Returns an error if the opcode is unknown or reserved, or the operand is truncated.
///
/// # Examples
///
/// ```rust
/// use modinit::{disassembler::{decode_instruction, Operand}, Parser};
///
/// // call 0x06000002
/// let bytecode = [0x28, 0x02, 0x00, 0x00, 0x06];
/// let mut parser = Parser::new(&bytecode);
///
/// let instruction = decode_instruction(&mut parser, 0x2050)?;
/// assert_eq!(instruction.mnemonic, "call");
/// assert_eq!(instruction.size, 5);
/// assert_eq!(instruction.token().map(|t| t.value()), Some(0x0600_0002));
/// # Ok::<(), modinit::Error>(())
/// ```
pub fn decode_instruction(parser: &mut Parser, rva: u64) -> Result<Instruction> {
    let offset = parser.pos() as u64;
    let first_byte = parser.read_le::<u8>()?;

    let (cil_instruction, prefix, opcode) = match first_byte {
        0xFE => {
            let second_byte = parser.read_le::<u8>()?;

            match INSTRUCTIONS_FE.get(second_byte as usize) {
                Some(instr) => (instr, 0xFE, second_byte),
                None => return Err(malformed_error!("Invalid opcode: FE {:02X}", second_byte)),
            }
        }
        _ => match INSTRUCTIONS.get(first_byte as usize) {
            Some(instr) => (instr, 0, first_byte),
            None => return Err(malformed_error!("Invalid opcode: {:02X}", first_byte)),
        },
    };

    if cil_instruction.instr.is_empty() {
        return Err(malformed_error!(
            "Reserved opcode: {:04X}",
            u16::from(prefix) << 8 | u16::from(opcode)
        ));
    }

    let operand = match cil_instruction.op_type {
        OperandType::None => Operand::None,
        OperandType::Int8 => Operand::Immediate(Immediate::Int8(parser.read_le::<i8>()?)),
        OperandType::UInt8 => Operand::Immediate(Immediate::UInt8(parser.read_le::<u8>()?)),
        OperandType::Int16 => Operand::Immediate(Immediate::Int16(parser.read_le::<i16>()?)),
        OperandType::UInt16 => Operand::Immediate(Immediate::UInt16(parser.read_le::<u16>()?)),
        OperandType::Int32 => Operand::Immediate(Immediate::Int32(parser.read_le::<i32>()?)),
        OperandType::UInt32 => Operand::Immediate(Immediate::UInt32(parser.read_le::<u32>()?)),
        OperandType::Int64 => Operand::Immediate(Immediate::Int64(parser.read_le::<i64>()?)),
        OperandType::UInt64 => Operand::Immediate(Immediate::UInt64(parser.read_le::<u64>()?)),
        OperandType::Float32 => Operand::Immediate(Immediate::Float32(parser.read_le::<f32>()?)),
        OperandType::Float64 => Operand::Immediate(Immediate::Float64(parser.read_le::<f64>()?)),
        OperandType::Token => Operand::Token(Token::new(parser.read_le::<u32>()?)),
        OperandType::Switch => {
            let case_count = parser.read_le::<u32>()? as usize;
            if case_count > parser.remaining() / 4 {
                return Err(malformed_error!(
                    "Switch with {} cases exceeds the remaining code",
                    case_count
                ));
            }

            let mut targets = Vec::with_capacity(case_count);
            for _ in 0..case_count {
                targets.push(parser.read_le::<i32>()?);
            }

            Operand::Switch(targets)
        }
    };
    let size = parser.pos() as u64 - offset;

    let mut instruction = Instruction {
        rva,
        offset,
        size,
        opcode,
        prefix,
        mnemonic: cil_instruction.instr,
        flow_type: cil_instruction.flow,
        operand,
        branch_targets: Vec::new(),
    };

    let next_instruction_rva = rva + instruction.size;
    match (&instruction.flow_type, &instruction.operand) {
        (FlowType::ConditionalBranch | FlowType::UnconditionalBranch, Operand::Immediate(value)) => {
            let branch_offset = u64::from(*value);
            instruction
                .branch_targets
                .push(next_instruction_rva.wrapping_add(branch_offset));
        }
        (FlowType::Switch, Operand::Switch(targets)) => {
            #[allow(clippy::cast_sign_loss)]
            for &target in targets {
                instruction
                    .branch_targets
                    .push(next_instruction_rva.wrapping_add(i64::from(target) as u64));
            }
        }
        _ => {}
    }

    Ok(instruction)
}
