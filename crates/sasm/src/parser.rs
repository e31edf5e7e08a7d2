use core::fmt::{self, Write};

use heapless::{Deque, Vec};
use sigma_vm::{Ops, Register, Word};

use crate::lexer::{Lexer, Mnemonic, Token};
use crate::{AssemblerError, AssemblerErrorKind, Terminator};

/// A concrete instruction. Operand-free forms work on `A`, `B` and `C` by
/// convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Instruction {
    Move { dest: Register, src: Register },
    Load,
    Store,
    LoadImmediate { dest: Register, value: Word },
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    GreaterThan,
    LessThan,
    GreaterThanEq,
    LessThanEq,
    Equal,
    NotEqual,
    And,
    Or,
    Not,
    BitwiseAnd,
    BitwiseOr,
    BitwiseNot,
    BitwiseXor,
    Jump,
    JumpIfZero,
    JumpIfNotZero,
}

impl Instruction {
    /// The instruction for a mnemonic that takes no operands.
    pub fn operand_free(mnemonic: Mnemonic) -> Option<Self> {
        let instruction = match mnemonic {
            Mnemonic::Mov | Mnemonic::Ldi => return None,
            Mnemonic::Lod => Instruction::Load,
            Mnemonic::Sav => Instruction::Store,
            Mnemonic::Add => Instruction::Add,
            Mnemonic::Min => Instruction::Subtract,
            Mnemonic::Mul => Instruction::Multiply,
            Mnemonic::Div => Instruction::Divide,
            Mnemonic::Mod => Instruction::Mod,
            Mnemonic::Gth => Instruction::GreaterThan,
            Mnemonic::Lth => Instruction::LessThan,
            Mnemonic::Geq => Instruction::GreaterThanEq,
            Mnemonic::Leq => Instruction::LessThanEq,
            Mnemonic::Equ => Instruction::Equal,
            Mnemonic::Neq => Instruction::NotEqual,
            Mnemonic::Land => Instruction::And,
            Mnemonic::Lor => Instruction::Or,
            Mnemonic::Not => Instruction::Not,
            Mnemonic::Band => Instruction::BitwiseAnd,
            Mnemonic::Bor => Instruction::BitwiseOr,
            Mnemonic::Bnot => Instruction::BitwiseNot,
            Mnemonic::Xor => Instruction::BitwiseXor,
            Mnemonic::Jmp => Instruction::Jump,
            Mnemonic::Jiz => Instruction::JumpIfZero,
            Mnemonic::Jnz => Instruction::JumpIfNotZero,
        };
        Some(instruction)
    }

    pub fn mnemonic(&self) -> Mnemonic {
        match self {
            Instruction::Move { .. } => Mnemonic::Mov,
            Instruction::Load => Mnemonic::Lod,
            Instruction::Store => Mnemonic::Sav,
            Instruction::LoadImmediate { .. } => Mnemonic::Ldi,
            Instruction::Add => Mnemonic::Add,
            Instruction::Subtract => Mnemonic::Min,
            Instruction::Multiply => Mnemonic::Mul,
            Instruction::Divide => Mnemonic::Div,
            Instruction::Mod => Mnemonic::Mod,
            Instruction::GreaterThan => Mnemonic::Gth,
            Instruction::LessThan => Mnemonic::Lth,
            Instruction::GreaterThanEq => Mnemonic::Geq,
            Instruction::LessThanEq => Mnemonic::Leq,
            Instruction::Equal => Mnemonic::Equ,
            Instruction::NotEqual => Mnemonic::Neq,
            Instruction::And => Mnemonic::Land,
            Instruction::Or => Mnemonic::Lor,
            Instruction::Not => Mnemonic::Not,
            Instruction::BitwiseAnd => Mnemonic::Band,
            Instruction::BitwiseOr => Mnemonic::Bor,
            Instruction::BitwiseNot => Mnemonic::Bnot,
            Instruction::BitwiseXor => Mnemonic::Xor,
            Instruction::Jump => Mnemonic::Jmp,
            Instruction::JumpIfZero => Mnemonic::Jiz,
            Instruction::JumpIfNotZero => Mnemonic::Jnz,
        }
    }

    pub fn op(&self) -> Ops {
        match self {
            Instruction::Move { .. } => Ops::Move,
            Instruction::Load => Ops::Load,
            Instruction::Store => Ops::Store,
            Instruction::LoadImmediate { .. } => Ops::LoadImmediate,
            Instruction::Add => Ops::Add,
            Instruction::Subtract => Ops::Subtract,
            Instruction::Multiply => Ops::Multiply,
            Instruction::Divide => Ops::Divide,
            Instruction::Mod => Ops::Mod,
            Instruction::GreaterThan => Ops::GreaterThan,
            Instruction::LessThan => Ops::LessThan,
            Instruction::GreaterThanEq => Ops::GreaterThanEq,
            Instruction::LessThanEq => Ops::LessThanEq,
            Instruction::Equal => Ops::Equal,
            Instruction::NotEqual => Ops::NotEqual,
            Instruction::And => Ops::And,
            Instruction::Or => Ops::Or,
            Instruction::Not => Ops::Not,
            Instruction::BitwiseAnd => Ops::BitwiseAnd,
            Instruction::BitwiseOr => Ops::BitwiseOr,
            Instruction::BitwiseNot => Ops::BitwiseNot,
            Instruction::BitwiseXor => Ops::BitwiseXor,
            Instruction::Jump => Ops::Jump,
            Instruction::JumpIfZero => Ops::JumpIfZero,
            Instruction::JumpIfNotZero => Ops::JumpIfNotZero,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.mnemonic().as_str().chars() {
            f.write_char(c.to_ascii_uppercase())?;
        }
        match self {
            Instruction::Move { dest, src } => write!(f, " {} {};", dest, src),
            Instruction::LoadImmediate { dest, value } => write!(f, " {} {};", dest, value),
            _ => f.write_char(';'),
        }
    }
}

/// One parsed statement, before labels are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Statement<'src> {
    Instruction(Instruction),
    /// `ldi <reg> <label>;` whose address is not known yet.
    LoadLabel {
        dest: Register,
        label: &'src str,
        line: u32,
    },
    /// `<name>:`, occupies no code.
    Label { name: &'src str, line: u32 },
}

impl fmt::Display for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Instruction(instruction) => fmt::Display::fmt(instruction, f),
            Statement::LoadLabel { dest, label, .. } => write!(f, "LDI {} {};", dest, label),
            Statement::Label { name, .. } => write!(f, "{}:", name),
        }
    }
}

/// Pulls tokens from a [`Lexer`] and produces one [`Statement`] at a time.
///
/// The current token is always buffered. Up to `LOOKAHEAD` further tokens
/// can be peeked before the window is full.
pub struct Parser<'src, const LOOKAHEAD: usize = 4> {
    lexer: Lexer<'src>,
    current: (Token<'src>, u32),
    lookahead: Deque<(Token<'src>, u32), LOOKAHEAD>,
}

impl<'src, const LOOKAHEAD: usize> Parser<'src, LOOKAHEAD> {
    pub fn new(mut lexer: Lexer<'src>) -> Self {
        let token = lexer.next_token();
        let current = (token, lexer.line());
        Self {
            lexer,
            current,
            lookahead: Deque::new(),
        }
    }

    pub fn at_eof(&self) -> bool {
        self.current.0 == Token::EndOfFile
    }

    pub fn reset(&mut self) {
        self.lexer.reset();
        self.lookahead.clear();
        let token = self.lexer.next_token();
        self.current = (token, self.lexer.line());
    }

    /// Token `offset` places ahead, `0` being the current one.
    pub fn peek(&mut self, offset: usize) -> Result<Token<'src>, AssemblerError> {
        let Some(index) = offset.checked_sub(1) else {
            return Ok(self.current.0);
        };
        while self.lookahead.len() <= index {
            // Checked before lexing so a refused peek loses no token.
            if self.lookahead.is_full() {
                return Err(self.error(AssemblerErrorKind::LookaheadExceeded));
            }
            let token = self.lexer.next_token();
            self.lookahead
                .push_back((token, self.lexer.line()))
                .map_err(|_| self.error(AssemblerErrorKind::LookaheadExceeded))?;
        }
        self.lookahead
            .iter()
            .nth(index)
            .map(|(token, _)| *token)
            .ok_or_else(|| self.error(AssemblerErrorKind::LookaheadExceeded))
    }

    /// `None` once the input is exhausted.
    pub fn parse_next(&mut self) -> Result<Option<Statement<'src>>, AssemblerError> {
        let (token, line) = self.current;
        match token {
            Token::EndOfFile => Ok(None),
            Token::Mnemonic(mnemonic) => {
                self.advance();
                self.instruction(mnemonic).map(Some)
            }
            Token::Word(name) => {
                self.advance();
                self.terminator(Terminator::Colon)?;
                Ok(Some(Statement::Label { name, line }))
            }
            _ => Err(self.error(AssemblerErrorKind::UnexpectedToken)),
        }
    }

    pub fn parse_all<const N: usize>(&mut self) -> Result<Vec<Statement<'src>, N>, AssemblerError> {
        let mut statements = Vec::new();
        while let Some(statement) = self.parse_next()? {
            statements
                .push(statement)
                .map_err(|_| self.error(AssemblerErrorKind::OutputFull))?;
        }
        Ok(statements)
    }

    fn instruction(&mut self, mnemonic: Mnemonic) -> Result<Statement<'src>, AssemblerError> {
        let statement = match mnemonic {
            Mnemonic::Mov => {
                let dest = self.register()?;
                let src = self.register()?;
                Statement::Instruction(Instruction::Move { dest, src })
            }
            Mnemonic::Ldi => {
                let dest = self.register()?;
                let (token, line) = self.current;
                let statement = match token {
                    Token::Number(value) => {
                        Statement::Instruction(Instruction::LoadImmediate { dest, value })
                    }
                    Token::Word(label) => Statement::LoadLabel { dest, label, line },
                    _ => return Err(self.error(AssemblerErrorKind::UnexpectedToken)),
                };
                self.advance();
                statement
            }
            other => {
                let instruction = Instruction::operand_free(other)
                    .ok_or_else(|| self.error(AssemblerErrorKind::UnexpectedToken))?;
                Statement::Instruction(instruction)
            }
        };
        self.terminator(Terminator::Semicolon)?;
        Ok(statement)
    }

    fn register(&mut self) -> Result<Register, AssemblerError> {
        match self.current.0 {
            Token::Register(register) => {
                self.advance();
                Ok(register)
            }
            _ => Err(self.error(AssemblerErrorKind::UnknownRegister)),
        }
    }

    fn terminator(&mut self, terminator: Terminator) -> Result<(), AssemblerError> {
        let expected = match terminator {
            Terminator::Semicolon => Token::Semicolon,
            Terminator::Colon => Token::Colon,
        };
        if self.current.0 != expected {
            return Err(self.error(AssemblerErrorKind::MissingTerminator(terminator)));
        }
        self.advance();
        Ok(())
    }

    fn advance(&mut self) {
        self.current = match self.lookahead.pop_front() {
            Some(next) => next,
            None => {
                let token = self.lexer.next_token();
                (token, self.lexer.line())
            }
        };
    }

    fn error(&self, kind: AssemblerErrorKind) -> AssemblerError {
        AssemblerError::Kind(kind).with_line(self.current.1)
    }
}

impl<'src, const LOOKAHEAD: usize> Iterator for Parser<'src, LOOKAHEAD> {
    type Item = Result<Statement<'src>, AssemblerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parse_next().transpose()
    }
}
