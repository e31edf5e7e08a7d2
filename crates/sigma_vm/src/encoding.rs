//! The binary instruction format shared by the assembler and the machine.
//!
//! Every instruction occupies two words:
//!
//! ```text
//! word 0: [ op: 0..16 | flag: 16..32 | left: 32..48 | right: 48..64 ]
//! word 1: immediate (only meaningful for LDI)
//! ```
//!
//! `flag` holds the addressing mode of both register operands, the left
//! operand's mode in the low byte and the right operand's in the high byte.
//! Packing and unpacking live side by side here so the generator and the
//! machine cannot drift apart.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{GENERAL_REGISTER_COUNT, Ops, Word};

/// Addressing mode of a named register operand.
pub const NAMED_MODE: u8 = 0;
/// Addressing mode of a general purpose register operand.
pub const GENERAL_MODE: u8 = 1;

pub const REG_A: u16 = 0x0000;
pub const REG_B: u16 = 0x0001;
pub const REG_C: u16 = 0x0002;
pub const REG_IP: u16 = 0x0003;
pub const REG_SP: u16 = 0x0004;
pub const REG_SBP: u16 = 0x0005;
pub const REG_FLG: u16 = 0x0006;

const FIELD_MASK: Word = 0xFFFF;
const OP_SHIFT: u32 = 0;
const FLAG_SHIFT: u32 = 16;
const LEFT_SHIFT: u32 = 32;
const RIGHT_SHIFT: u32 = 48;
const RIGHT_MODE_SHIFT: u32 = 8;

/// A register reference as written in assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    A,
    B,
    C,
    Ip,
    Sp,
    Sbp,
    Flg,
    /// General purpose register `R<n>`, valid for `n < GENERAL_REGISTER_COUNT`.
    General(u8),
}

impl Register {
    pub const NAMED: [Register; 7] = [
        Register::A,
        Register::B,
        Register::C,
        Register::Ip,
        Register::Sp,
        Register::Sbp,
        Register::Flg,
    ];

    /// The general purpose register `R<index>`, if the bank has one.
    pub fn general(index: usize) -> Option<Self> {
        if index >= GENERAL_REGISTER_COUNT {
            return None;
        }
        u8::try_from(index).ok().map(Register::General)
    }

    /// Fixed register code of a named register.
    pub const fn code(&self) -> Option<u16> {
        match self {
            Register::A => Some(REG_A),
            Register::B => Some(REG_B),
            Register::C => Some(REG_C),
            Register::Ip => Some(REG_IP),
            Register::Sp => Some(REG_SP),
            Register::Sbp => Some(REG_SBP),
            Register::Flg => Some(REG_FLG),
            Register::General(_) => None,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::A => f.write_str("A"),
            Register::B => f.write_str("B"),
            Register::C => f.write_str("C"),
            Register::Ip => f.write_str("IP"),
            Register::Sp => f.write_str("SP"),
            Register::Sbp => f.write_str("SBP"),
            Register::Flg => f.write_str("FLG"),
            Register::General(index) => write!(f, "R{}", index),
        }
    }
}

/// A `(mode, argument)` pair naming one register in an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Operand {
    pub mode: u8,
    pub argument: u16,
}

impl Operand {
    /// Returns `None` for a general register outside the bank.
    pub fn encode(register: Register) -> Option<Self> {
        match register {
            Register::General(index) => {
                if usize::from(index) >= GENERAL_REGISTER_COUNT {
                    return None;
                }
                Some(Self {
                    mode: GENERAL_MODE,
                    argument: u16::from(index),
                })
            }
            named => named.code().map(|argument| Self {
                mode: NAMED_MODE,
                argument,
            }),
        }
    }

    /// Any nonzero mode addresses the general bank.
    pub fn decode(self) -> Option<Register> {
        if self.mode != NAMED_MODE {
            return Register::general(usize::from(self.argument));
        }
        Register::NAMED
            .iter()
            .copied()
            .find(|register| register.code() == Some(self.argument))
    }
}

/// The first word of an encoded instruction, split into its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InstructionWord {
    pub op: u16,
    pub flag: u16,
    pub left: u16,
    pub right: u16,
}

impl InstructionWord {
    pub const fn new(op: Ops) -> Self {
        Self {
            op: op as u16,
            flag: 0,
            left: 0,
            right: 0,
        }
    }

    pub const fn with_left(mut self, operand: Operand) -> Self {
        self.flag = (self.flag & 0xFF00) | operand.mode as u16;
        self.left = operand.argument;
        self
    }

    pub const fn with_right(mut self, operand: Operand) -> Self {
        self.flag = (self.flag & 0x00FF) | ((operand.mode as u16) << RIGHT_MODE_SHIFT);
        self.right = operand.argument;
        self
    }

    pub const fn left_operand(&self) -> Operand {
        Operand {
            mode: (self.flag & 0x00FF) as u8,
            argument: self.left,
        }
    }

    pub const fn right_operand(&self) -> Operand {
        Operand {
            mode: (self.flag >> RIGHT_MODE_SHIFT) as u8,
            argument: self.right,
        }
    }

    pub const fn pack(&self) -> Word {
        ((self.op as Word) << OP_SHIFT)
            | ((self.flag as Word) << FLAG_SHIFT)
            | ((self.left as Word) << LEFT_SHIFT)
            | ((self.right as Word) << RIGHT_SHIFT)
    }

    pub const fn unpack(word: Word) -> Self {
        Self {
            op: ((word >> OP_SHIFT) & FIELD_MASK) as u16,
            flag: ((word >> FLAG_SHIFT) & FIELD_MASK) as u16,
            left: ((word >> LEFT_SHIFT) & FIELD_MASK) as u16,
            right: ((word >> RIGHT_SHIFT) & FIELD_MASK) as u16,
        }
    }
}

/// One instruction as it sits in memory: the packed instruction word
/// followed by the immediate word.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncodedInstruction {
    pub info: Word,
    pub immediate: Word,
}

impl EncodedInstruction {
    pub const fn new(word: InstructionWord, immediate: Word) -> Self {
        Self {
            info: word.pack(),
            immediate,
        }
    }

    pub const fn instruction_word(&self) -> InstructionWord {
        InstructionWord::unpack(self.info)
    }

    pub const fn words(&self) -> [Word; 2] {
        [self.info, self.immediate]
    }
}

impl From<[Word; 2]> for EncodedInstruction {
    fn from(words: [Word; 2]) -> Self {
        let [info, immediate] = words;
        Self { info, immediate }
    }
}
