use super::{DataBuffer, DataReader};
use crate::ast::{BinaryOp, UnaryOp};
use crate::error::BuildError;

/// An instruction of the stack machine that evaluates compiled expressions.
/// Jump targets are byte offsets from the start of the expression chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    End,
    PushConstant(u16),
    PushGlobal(u16),
    PushLocal(u16),
    /// Latest value of one of the component's own input pins.
    PushInput(u8),
    /// Field access; the operand is the constant holding the field name.
    Member(u16),
    Index,
    MakeArray(u16),
    Unary(UnaryOp),
    Binary(BinaryOp),
    Jump(u16),
    /// Pops the condition.
    JumpIfFalse(u16),
    /// Keeps the deciding operand of `&&` on the stack when jumping.
    JumpIfFalseOrPop(u16),
    /// Keeps the deciding operand of `||` on the stack when jumping.
    JumpIfTrueOrPop(u16),
}

const END: u8 = 0x00;
const PUSH_CONSTANT: u8 = 0x01;
const PUSH_GLOBAL: u8 = 0x02;
const PUSH_LOCAL: u8 = 0x03;
const PUSH_INPUT: u8 = 0x04;
const MEMBER: u8 = 0x05;
const INDEX: u8 = 0x06;
const MAKE_ARRAY: u8 = 0x07;
const UNARY: u8 = 0x10;
const BINARY: u8 = 0x20;
const JUMP: u8 = 0x30;
const JUMP_IF_FALSE: u8 = 0x31;
const JUMP_IF_FALSE_OR_POP: u8 = 0x32;
const JUMP_IF_TRUE_OR_POP: u8 = 0x33;

const UNARY_OPS: [UnaryOp; 2] = [UnaryOp::Not, UnaryOp::Negate];
const BINARY_OPS: [BinaryOp; 13] = [
    BinaryOp::Add,
    BinaryOp::Subtract,
    BinaryOp::Multiply,
    BinaryOp::Divide,
    BinaryOp::Remainder,
    BinaryOp::Equal,
    BinaryOp::NotEqual,
    BinaryOp::Less,
    BinaryOp::LessOrEqual,
    BinaryOp::Greater,
    BinaryOp::GreaterOrEqual,
    BinaryOp::And,
    BinaryOp::Or,
];

impl OpCode {
    pub fn write(self, buffer: &mut DataBuffer) {
        match self {
            OpCode::End => buffer.write_u8(END),
            OpCode::PushConstant(index) => {
                buffer.write_u8(PUSH_CONSTANT);
                buffer.write_u16(index);
            }
            OpCode::PushGlobal(index) => {
                buffer.write_u8(PUSH_GLOBAL);
                buffer.write_u16(index);
            }
            OpCode::PushLocal(index) => {
                buffer.write_u8(PUSH_LOCAL);
                buffer.write_u16(index);
            }
            OpCode::PushInput(index) => {
                buffer.write_u8(PUSH_INPUT);
                buffer.write_u8(index);
            }
            OpCode::Member(field) => {
                buffer.write_u8(MEMBER);
                buffer.write_u16(field);
            }
            OpCode::Index => buffer.write_u8(INDEX),
            OpCode::MakeArray(count) => {
                buffer.write_u8(MAKE_ARRAY);
                buffer.write_u16(count);
            }
            OpCode::Unary(op) => {
                let code = UNARY_OPS.iter().position(|o| *o == op).unwrap_or(0) as u8;
                buffer.write_u8(UNARY | code);
            }
            OpCode::Binary(op) => {
                let code = BINARY_OPS.iter().position(|o| *o == op).unwrap_or(0) as u8;
                buffer.write_u8(BINARY | code);
            }
            OpCode::Jump(target) => {
                buffer.write_u8(JUMP);
                buffer.write_u16(target);
            }
            OpCode::JumpIfFalse(target) => {
                buffer.write_u8(JUMP_IF_FALSE);
                buffer.write_u16(target);
            }
            OpCode::JumpIfFalseOrPop(target) => {
                buffer.write_u8(JUMP_IF_FALSE_OR_POP);
                buffer.write_u16(target);
            }
            OpCode::JumpIfTrueOrPop(target) => {
                buffer.write_u8(JUMP_IF_TRUE_OR_POP);
                buffer.write_u16(target);
            }
        }
    }

    pub fn read(reader: &mut DataReader<'_>) -> Result<Self, BuildError> {
        let tag = reader.read_u8("opcode")?;
        Ok(match tag {
            END => OpCode::End,
            PUSH_CONSTANT => OpCode::PushConstant(reader.read_u16("constant index")?),
            PUSH_GLOBAL => OpCode::PushGlobal(reader.read_u16("global index")?),
            PUSH_LOCAL => OpCode::PushLocal(reader.read_u16("local index")?),
            PUSH_INPUT => OpCode::PushInput(reader.read_u8("input index")?),
            MEMBER => OpCode::Member(reader.read_u16("field constant")?),
            INDEX => OpCode::Index,
            MAKE_ARRAY => OpCode::MakeArray(reader.read_u16("array length")?),
            JUMP => OpCode::Jump(reader.read_u16("jump target")?),
            JUMP_IF_FALSE => OpCode::JumpIfFalse(reader.read_u16("jump target")?),
            JUMP_IF_FALSE_OR_POP => OpCode::JumpIfFalseOrPop(reader.read_u16("jump target")?),
            JUMP_IF_TRUE_OR_POP => OpCode::JumpIfTrueOrPop(reader.read_u16("jump target")?),
            t if t & 0xf0 == UNARY => UNARY_OPS
                .get((t & 0x0f) as usize)
                .copied()
                .map(OpCode::Unary)
                .ok_or_else(|| unknown(t))?,
            t if t & 0xf0 == BINARY => BINARY_OPS
                .get((t & 0x0f) as usize)
                .copied()
                .map(OpCode::Binary)
                .ok_or_else(|| unknown(t))?,
            t => return Err(unknown(t)),
        })
    }

    /// Whether the operand is a jump target.
    pub fn jump_target(self) -> Option<u16> {
        match self {
            OpCode::Jump(t)
            | OpCode::JumpIfFalse(t)
            | OpCode::JumpIfFalseOrPop(t)
            | OpCode::JumpIfTrueOrPop(t) => Some(t),
            _ => None,
        }
    }
}

fn unknown(tag: u8) -> BuildError {
    BuildError::Generic(format!("unknown opcode 0x{tag:02x}"))
}
