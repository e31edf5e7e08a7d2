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

//! Assembler for the sigma machine.
//!
//! Source text is pulled through four stages, one unit at a time:
//! [`Lexer`] → [`Parser`] → [`Linker`] → [`CodeGenerator`]. Nothing is
//! allocated; every buffer has a capacity chosen through const generics.

use core::fmt;

use heapless::Vec;
use sigma_vm::{EncodedInstruction, Register};
use thiserror_no_std::Error;

macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "defmt")]
        defmt::trace!($($arg)*);
    };
}

pub mod codegen;
pub mod image;
pub mod lexer;
pub mod linker;
pub mod parser;

pub use codegen::{CodeGenerator, encode_instruction};pub use image::{read_image, write_image};
pub use lexer::{Lexer, Mnemonic, Token};
pub use linker::Linker;
pub use parser::{Instruction, Parser, Statement};

/// Words every instruction occupies once encoded.
pub const INSTRUCTION_WORDS: sigma_vm::Word = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Terminator {
    Semicolon,
    Colon,
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Semicolon => f.write_str("';'"),
            Terminator::Colon => f.write_str("':'"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblerError {
    #[error("{0}")]
    Kind(AssemblerErrorKind),
    #[error("line {line}: {kind}")]
    WithLine { line: u32, kind: AssemblerErrorKind },
}

impl AssemblerError {
    /// Attaches a line number unless one is already present.
    pub(crate) fn with_line(self, line: u32) -> Self {
        match self {
            AssemblerError::WithLine { .. } => self,
            AssemblerError::Kind(kind) => AssemblerError::WithLine { line, kind },
        }
    }

    pub fn line_number(&self) -> Option<u32> {
        match self {
            Self::Kind(_) => None,
            Self::WithLine { line, .. } => Some(*line),
        }
    }

    pub fn error_kind(&self) -> &AssemblerErrorKind {
        match self {
            Self::Kind(kind) => kind,
            Self::WithLine { kind, .. } => kind,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblerErrorKind {
    #[error("missing terminator {0}")]
    MissingTerminator(Terminator),
    #[error("unexpected token")]
    UnexpectedToken,
    #[error("unknown register")]
    UnknownRegister,
    #[error("unknown label")]
    UnknownLabel,
    #[error("label defined twice")]
    DuplicateLabel,
    #[error("too many labels")]
    MaxLabelsExceeded,
    #[error("too many instructions read ahead while resolving a label")]
    ReplayBufferFull,
    #[error("peek past the lookahead window")]
    LookaheadExceeded,
    #[error("output buffer is full")]
    OutputFull,
    #[error("code address overflowed")]
    AddressOverflow,
    #[error("register {0} has no binary encoding")]
    UnencodableRegister(Register),
    #[error("program image: {0}")]
    Image(#[from] postcard::Error),
}

impl From<AssemblerErrorKind> for AssemblerError {
    fn from(kind: AssemblerErrorKind) -> Self {
        AssemblerError::Kind(kind)
    }
}

impl From<postcard::Error> for AssemblerError {
    fn from(err: postcard::Error) -> Self {
        AssemblerError::Kind(AssemblerErrorKind::Image(err))
    }
}

/// Assembles `source` into at most `N` encoded instructions.
///
/// The replay queue never holds more than the program, so sizing it by `N`
/// lets a forward reference reach any label in an `N` instruction program.
/// Up to `N` labels may be defined; use [`assemble_with_labels`] for more.
pub fn assemble<const N: usize>(source: &str) -> Result<Vec<EncodedInstruction, N>, AssemblerError> {
    assemble_with_labels::<N, N>(source)
}

/// [`assemble`] with room for `LABEL_CAP` label definitions.
pub fn assemble_with_labels<const N: usize, const LABEL_CAP: usize>(
    source: &str,
) -> Result<Vec<EncodedInstruction, N>, AssemblerError> {
    let parser: Parser = Parser::new(Lexer::new(source));
    let linker: Linker<'_, LABEL_CAP, N> = Linker::new(parser);
    let mut generator = CodeGenerator::new(linker);
    generator.generate_all()
}
