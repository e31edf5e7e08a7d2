use heapless::Vec;
use sigma_vm::{EncodedInstruction, InstructionWord, Operand, Register};

use crate::linker::Linker;
use crate::parser::Instruction;
use crate::{AssemblerError, AssemblerErrorKind};

/// Packs one resolved instruction into its two word form.
pub fn encode_instruction(instruction: &Instruction) -> Result<EncodedInstruction, AssemblerError> {
    let word = InstructionWord::new(instruction.op());
    let encoded = match *instruction {
        Instruction::Move { dest, src } => {
            EncodedInstruction::new(word.with_left(operand(dest)?).with_right(operand(src)?), 0)
        }
        Instruction::LoadImmediate { dest, value } => {
            EncodedInstruction::new(word.with_left(operand(dest)?), value)
        }
        Instruction::Load
        | Instruction::Store
        | Instruction::Add
        | Instruction::Subtract
        | Instruction::Multiply
        | Instruction::Divide
        | Instruction::Mod
        | Instruction::GreaterThan
        | Instruction::LessThan
        | Instruction::GreaterThanEq
        | Instruction::LessThanEq
        | Instruction::Equal
        | Instruction::NotEqual
        | Instruction::And
        | Instruction::Or
        | Instruction::Not
        | Instruction::BitwiseAnd
        | Instruction::BitwiseOr
        | Instruction::BitwiseNot
        | Instruction::BitwiseXor
        | Instruction::Jump
        | Instruction::JumpIfZero
        | Instruction::JumpIfNotZero => EncodedInstruction::new(word, 0),
    };
    Ok(encoded)
}

fn operand(register: Register) -> Result<Operand, AssemblerError> {
    Operand::encode(register)
        .ok_or(AssemblerError::Kind(AssemblerErrorKind::UnencodableRegister(register)))
}

pub struct CodeGenerator<
    'src,
    const LABEL_CAP: usize = 64,
    const REPLAY_CAP: usize = 64,
    const LOOKAHEAD: usize = 4,
> {
    linker: Linker<'src, LABEL_CAP, REPLAY_CAP, LOOKAHEAD>,
}

impl<'src, const LABEL_CAP: usize, const REPLAY_CAP: usize, const LOOKAHEAD: usize>
    CodeGenerator<'src, LABEL_CAP, REPLAY_CAP, LOOKAHEAD>
{
    pub fn new(linker: Linker<'src, LABEL_CAP, REPLAY_CAP, LOOKAHEAD>) -> Self {
        Self { linker }
    }

    pub fn at_eof(&self) -> bool {
        self.linker.at_eof()
    }

    pub fn generate_next(&mut self) -> Result<Option<EncodedInstruction>, AssemblerError> {
        match self.linker.link_next()? {
            Some(instruction) => encode_instruction(&instruction).map(Some),
            None => Ok(None),
        }
    }

    pub fn generate_all<const N: usize>(
        &mut self,
    ) -> Result<Vec<EncodedInstruction, N>, AssemblerError> {
        let mut program = Vec::new();
        while let Some(encoded) = self.generate_next()? {
            program
                .push(encoded)
                .map_err(|_| AssemblerError::Kind(AssemblerErrorKind::OutputFull))?;
        }
        Ok(program)
    }
}

impl<'src, const LABEL_CAP: usize, const REPLAY_CAP: usize, const LOOKAHEAD: usize> Iterator
    for CodeGenerator<'src, LABEL_CAP, REPLAY_CAP, LOOKAHEAD>
{
    type Item = Result<EncodedInstruction, AssemblerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.generate_next().transpose()
    }
}
