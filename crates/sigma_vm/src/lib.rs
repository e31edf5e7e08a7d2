#![no_std]

#![cfg_attr(
    not(test),
    deny(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing,
        clippy::string_slice,
        clippy::arithmetic_side_effects,
        clippy::panicking_unwrap,
        clippy::out_of_bounds_indexing,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
    )
)]
#![cfg_attr(not(test), warn(clippy::missing_panics_doc))]

use thiserror_no_std::Error;
use variant_count::VariantCount;

macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "defmt")]
        defmt::trace!($($arg)*);
    };
}

pub mod encoding;
pub mod memory;
pub mod registers;

pub use encoding::{EncodedInstruction, InstructionWord, Operand, Register};
pub use memory::Memory;
pub use registers::Registers;

/// This module implements the sigma virtual machine.
///
/// It is a register machine over unsigned 64 bit words. Memory is a flat
/// array of words that holds both the program and its data; the program is
/// loaded at address 0 as pairs of `(instruction word, immediate word)`, see
/// [`encoding`].
///
/// Most operations use fixed operand registers rather than encoded
/// operands: arithmetic, comparison and logic read `A` and `B` and write
/// `C`, loads and stores move `A` through the address in `B`, and jumps go
/// to the address in `A` gated on `B`. Only `MOV` and `LDI` name their
/// registers in the instruction word.
///
/// The machine starts in bios mode. The first tick leaves bios mode and
/// sets the running bit, after which every tick executes one instruction
/// until the program clears the running bit in `FLG`.
pub type Word = u64;

pub const GENERAL_REGISTER_COUNT: usize = 10;
pub const DEFAULT_MEMORY_SIZE: usize = 4096;

/// Low bits of the `FLG` register used as the machine mode.
pub const RUNNING_BIT: Word = 0x1;
pub const BIOS_MODE_BIT: Word = 0x10;

/// When `A` holds this during the bios tick, `B` is written to the console.
pub const PRINT_CHAR_SENTINEL: Word = 0x1001;

pub type DefaultMachine = Machine<DEFAULT_MEMORY_SIZE>;

#[repr(u16)]
#[derive(VariantCount, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ops {
    Move = 0x0000,
    Load = 0x0001,
    Store = 0x0002,

    LoadImmediate = 0x0010,

    Add = 0x1000,
    Subtract = 0x1001,
    Multiply = 0x1002,
    Divide = 0x1003,
    Mod = 0x1004,

    GreaterThan = 0x1100,
    LessThan = 0x1101,
    GreaterThanEq = 0x1102,
    LessThanEq = 0x1103,

    Equal = 0x1110,
    NotEqual = 0x1111,

    And = 0x1200,
    Or = 0x1201,
    Not = 0x1202,

    BitwiseAnd = 0x1300,
    BitwiseOr = 0x1301,
    BitwiseNot = 0x1302,
    BitwiseXor = 0x1303,

    Jump = 0x2000,
    JumpIfZero = 0x2001,
    JumpIfNotZero = 0x2002,
}

// Opcodes are sparse so decoding goes through this table. Its length is tied
// to the variant count, so a new opcode will not build until it is listed.
const OPS: [Ops; Ops::VARIANT_COUNT] = [
    Ops::Move,
    Ops::Load,
    Ops::Store,
    Ops::LoadImmediate,
    Ops::Add,
    Ops::Subtract,
    Ops::Multiply,
    Ops::Divide,
    Ops::Mod,
    Ops::GreaterThan,
    Ops::LessThan,
    Ops::GreaterThanEq,
    Ops::LessThanEq,
    Ops::Equal,
    Ops::NotEqual,
    Ops::And,
    Ops::Or,
    Ops::Not,
    Ops::BitwiseAnd,
    Ops::BitwiseOr,
    Ops::BitwiseNot,
    Ops::BitwiseXor,
    Ops::Jump,
    Ops::JumpIfZero,
    Ops::JumpIfNotZero,
];

impl Ops {
    pub fn all() -> &'static [Ops] {
        &OPS
    }
}

impl From<Ops> for u16 {
    fn from(op: Ops) -> u16 {
        op as u16
    }
}

impl TryFrom<u16> for Ops {
    type Error = MachineError;
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        OPS.iter()
            .copied()
            .find(|op| u16::from(*op) == value)
            .ok_or(MachineError::InvalidOp(value))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    #[error("memory address {0} is out of range")]
    OutOfBoundsMemoryAccess(Word),
    #[error("the value {0:#06x} is an invalid opcode")]
    InvalidOp(u16),
    #[error("register with mode {mode} and argument {argument} does not exist")]
    RegisterDoesNotExist { mode: u8, argument: u16 },
    #[error("division by zero")]
    DivisionByZero,
    #[error("modulo by zero")]
    ModuloByZero,
    #[error("instruction pointer overflowed")]
    InstructionPointerOverflow,
    #[error("the machine is halted")]
    Halted,
    #[error("program of {0} instructions does not fit in memory")]
    ProgramTooLarge(usize),
}

/// Mode of the machine as read from the `FLG` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MachineState {
    /// Bios mode bit set; the next tick is the startup tick.
    Startup,
    /// Running bit set; every tick executes one instruction.
    Running,
    Halted,
}

/// Receives characters printed by the bios tick.
pub trait Console {
    fn put_char(&mut self, byte: u8);
}

/// Console that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConsole;

impl Console for NullConsole {
    fn put_char(&mut self, _byte: u8) {}
}

pub struct Machine<const MEMORY_SIZE: usize> {
    registers: Registers,
    memory: Memory<MEMORY_SIZE>,
}

impl<const MEMORY_SIZE: usize> Machine<MEMORY_SIZE> {
    pub fn new() -> Self {
        let registers = Registers {
            flags: BIOS_MODE_BIT,
            ..Registers::default()
        };
        Self {
            registers,
            memory: Memory::new(),
        }
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn memory(&self) -> &Memory<MEMORY_SIZE> {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory<MEMORY_SIZE> {
        &mut self.memory
    }

    /// Writes `program` into memory starting at address 0, two words per
    /// instruction.
    pub fn load_program(&mut self, program: &[EncodedInstruction]) -> Result<(), MachineError> {
        let fits = program
            .len()
            .checked_mul(2)
            .is_some_and(|words| words <= MEMORY_SIZE);
        if !fits {
            return Err(MachineError::ProgramTooLarge(program.len()));
        }

        let mut address: Word = 0;
        for instruction in program {
            for word in instruction.words() {
                self.memory.write(address, word)?;
                address = address
                    .checked_add(1)
                    .ok_or(MachineError::ProgramTooLarge(program.len()))?;
            }
        }
        Ok(())
    }

    pub fn state(&self) -> MachineState {
        if self.registers.flags & BIOS_MODE_BIT != 0 {
            MachineState::Startup
        } else if self.registers.flags & RUNNING_BIT != 0 {
            MachineState::Running
        } else {
            MachineState::Halted
        }
    }

    /// Runs until the program clears the running bit.
    ///
    /// A program that never does so keeps this looping; use
    /// [`run_for`](Self::run_for) when that is not acceptable.
    pub fn launch<C: Console + ?Sized>(&mut self, console: &mut C) -> Result<(), MachineError> {
        while self.state() != MachineState::Halted {
            self.tick(console)?;
        }
        trace!("halted at ip = {}", self.registers.ip);
        Ok(())
    }

    /// Ticks at most `max_ticks` times, stopping early once halted.
    pub fn run_for<C: Console + ?Sized>(
        &mut self,
        console: &mut C,
        max_ticks: usize,
    ) -> Result<MachineState, MachineError> {
        for _ in 0..max_ticks {
            if self.state() == MachineState::Halted {
                break;
            }
            self.tick(console)?;
        }
        Ok(self.state())
    }

    pub fn tick<C: Console + ?Sized>(&mut self, console: &mut C) -> Result<(), MachineError> {
        match self.state() {
            MachineState::Startup => {
                self.bios_tick(console);
                Ok(())
            }
            MachineState::Running => self.step(),
            MachineState::Halted => Err(MachineError::Halted),
        }
    }

    fn bios_tick<C: Console + ?Sized>(&mut self, console: &mut C) {
        self.set_flag(BIOS_MODE_BIT, false);
        self.set_flag(RUNNING_BIT, true);
        trace!("bios tick, a = {}", self.registers.a);
        if self.registers.a == PRINT_CHAR_SENTINEL {
            // Only the low byte is a character code.
            console.put_char(self.registers.b as u8);
        }
    }

    fn set_flag(&mut self, bit: Word, on: bool) {
        if on {
            self.registers.flags |= bit;
        } else {
            self.registers.flags &= !bit;
        }
    }

    fn fetch(&mut self) -> Result<Word, MachineError> {
        let word = self.memory.read(self.registers.ip)?;
        self.registers.ip = next_ip(self.registers.ip)?;
        Ok(word)
    }

    fn step(&mut self) -> Result<(), MachineError> {
        let word = InstructionWord::unpack(self.fetch()?);
        let immediate = self.fetch()?;
        let op = Ops::try_from(word.op)?;

        let a = self.registers.a;
        let b = self.registers.b;
        match op {
            Ops::Move => {
                let value = self.read_register(word.right_operand())?;
                *self.register_mut(word.left_operand())? = value;
            }
            Ops::Load => {
                self.registers.a = self.memory.read(b)?;
            }
            Ops::Store => {
                self.memory.write(b, a)?;
            }
            Ops::LoadImmediate => {
                *self.register_mut(word.left_operand())? = immediate;
            }
            Ops::Add => self.registers.c = a.wrapping_add(b),
            Ops::Subtract => self.registers.c = a.wrapping_sub(b),
            Ops::Multiply => self.registers.c = a.wrapping_mul(b),
            Ops::Divide => {
                self.registers.c = a.checked_div(b).ok_or(MachineError::DivisionByZero)?;
            }
            Ops::Mod => {
                self.registers.c = a.checked_rem(b).ok_or(MachineError::ModuloByZero)?;
            }
            Ops::GreaterThan => self.registers.c = Word::from(a > b),
            Ops::LessThan => self.registers.c = Word::from(a < b),
            Ops::GreaterThanEq => self.registers.c = Word::from(a >= b),
            Ops::LessThanEq => self.registers.c = Word::from(a <= b),
            Ops::Equal => self.registers.c = Word::from(a == b),
            Ops::NotEqual => self.registers.c = Word::from(a != b),
            Ops::And => self.registers.c = Word::from(a != 0 && b != 0),
            Ops::Or => self.registers.c = Word::from(a != 0 || b != 0),
            Ops::Not => self.registers.c = Word::from(a == 0),
            Ops::BitwiseAnd => self.registers.c = a & b,
            Ops::BitwiseOr => self.registers.c = a | b,
            Ops::BitwiseNot => self.registers.c = !a,
            Ops::BitwiseXor => self.registers.c = a ^ b,
            Ops::Jump => self.registers.ip = a,
            Ops::JumpIfZero => {
                if b == 0 {
                    self.registers.ip = a;
                }
            }
            Ops::JumpIfNotZero => {
                if b != 0 {
                    self.registers.ip = a;
                }
            }
        }
        Ok(())
    }

    fn read_register(&self, operand: Operand) -> Result<Word, MachineError> {
        operand
            .decode()
            .and_then(|register| self.registers.get(register))
            .ok_or_else(|| register_does_not_exist(operand))
    }

    fn register_mut(&mut self, operand: Operand) -> Result<&mut Word, MachineError> {
        let register = operand
            .decode()
            .ok_or_else(|| register_does_not_exist(operand))?;
        self.registers
            .get_mut(register)
            .ok_or_else(|| register_does_not_exist(operand))
    }
}

impl<const MEMORY_SIZE: usize> Default for Machine<MEMORY_SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

fn next_ip(ip: Word) -> Result<Word, MachineError> {
    ip.checked_add(1)
        .ok_or(MachineError::InstructionPointerOverflow)
}

fn register_does_not_exist(operand: Operand) -> MachineError {
    MachineError::RegisterDoesNotExist {
        mode: operand.mode,
        argument: operand.argument,
    }
}

#[cfg(test)]
mod test;
