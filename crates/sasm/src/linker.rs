//! Single pass label resolution.
//!
//! Instructions are handed out in source order as they are pulled. An
//! `ldi` naming a label that is not defined yet makes the linker read ahead
//! until the definition shows up. Everything read on the way is queued in
//! the replay buffer and served, in order, before the parser is asked for
//! anything new. Label references met while reading ahead stay unresolved
//! in the queue and are resolved when they are served, so a forward search
//! never nests.
//!
//! Addresses are word addresses. `address` always names the slot of the
//! next instruction to hand out; the replay buffer holds the instructions
//! for the slots after it, so a label defined while reading ahead sits at
//! `address + 2 * replay.len()`.

use heapless::{Deque, Vec};
use sigma_vm::{Register, Word};

use crate::parser::{Instruction, Parser, Statement};
use crate::{AssemblerError, AssemblerErrorKind, INSTRUCTION_WORDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Label<'src> {
    name: &'src str,
    address: Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending<'src> {
    Ready(Instruction),
    LoadLabel {
        dest: Register,
        label: &'src str,
        line: u32,
    },
}

pub struct Linker<
    'src,
    const LABEL_CAP: usize = 64,
    const REPLAY_CAP: usize = 64,
    const LOOKAHEAD: usize = 4,
> {
    parser: Parser<'src, LOOKAHEAD>,
    labels: Vec<Label<'src>, LABEL_CAP>,
    replay: Deque<Pending<'src>, REPLAY_CAP>,
    address: Word,
}

impl<'src, const LABEL_CAP: usize, const REPLAY_CAP: usize, const LOOKAHEAD: usize>
    Linker<'src, LABEL_CAP, REPLAY_CAP, LOOKAHEAD>
{
    pub fn new(parser: Parser<'src, LOOKAHEAD>) -> Self {
        Self {
            parser,
            labels: Vec::new(),
            replay: Deque::new(),
            address: 0,
        }
    }

    /// Address the next instruction handed out will occupy.
    pub fn address(&self) -> Word {
        self.address
    }

    /// Address of a label defined so far. Names compare without case.
    pub fn label(&self, name: &str) -> Option<Word> {
        self.labels
            .iter()
            .find(|label| label.name.eq_ignore_ascii_case(name))
            .map(|label| label.address)
    }

    pub fn at_eof(&self) -> bool {
        self.replay.is_empty() && self.parser.at_eof()
    }

    pub fn link_next(&mut self) -> Result<Option<Instruction>, AssemblerError> {
        let pending = match self.replay.pop_front() {
            Some(pending) => pending,
            None => match self.read_pending()? {
                Some(pending) => pending,
                None => return Ok(None),
            },
        };
        self.address = self
            .address
            .checked_add(INSTRUCTION_WORDS)
            .ok_or(AssemblerError::Kind(AssemblerErrorKind::AddressOverflow))?;

        match pending {
            Pending::Ready(instruction) => Ok(Some(instruction)),
            Pending::LoadLabel { dest, label, line } => {
                let value = self.resolve(label, line)?;
                Ok(Some(Instruction::LoadImmediate { dest, value }))
            }
        }
    }

    pub fn link_all<const N: usize>(&mut self) -> Result<Vec<Instruction, N>, AssemblerError> {
        let mut instructions = Vec::new();
        while let Some(instruction) = self.link_next()? {
            instructions
                .push(instruction)
                .map_err(|_| AssemblerError::Kind(AssemblerErrorKind::OutputFull))?;
        }
        Ok(instructions)
    }

    fn resolve(&mut self, name: &str, line: u32) -> Result<Word, AssemblerError> {
        if let Some(address) = self.label(name) {
            return Ok(address);
        }

        trace!("searching ahead for a label from line {}", line);
        loop {
            let pending = self.read_pending()?;
            let exhausted = pending.is_none();
            if let Some(pending) = pending {
                self.replay.push_back(pending).map_err(|_| {
                    AssemblerError::Kind(AssemblerErrorKind::ReplayBufferFull).with_line(line)
                })?;
            }
            if let Some(address) = self.label(name) {
                trace!("resolved to {} with {} queued", address, self.replay.len());
                return Ok(address);
            }
            if exhausted {
                return Err(AssemblerError::Kind(AssemblerErrorKind::UnknownLabel).with_line(line));
            }
        }
    }

    /// Next statement that occupies code, defining any labels before it.
    fn read_pending(&mut self) -> Result<Option<Pending<'src>>, AssemblerError> {
        while let Some(statement) = self.parser.parse_next()? {
            match statement {
                Statement::Instruction(instruction) => {
                    return Ok(Some(Pending::Ready(instruction)));
                }
                Statement::LoadLabel { dest, label, line } => {
                    return Ok(Some(Pending::LoadLabel { dest, label, line }));
                }
                Statement::Label { name, line } => self.define(name, line)?,
            }
        }
        Ok(None)
    }

    fn define(&mut self, name: &'src str, line: u32) -> Result<(), AssemblerError> {
        if self.label(name).is_some() {
            return Err(AssemblerError::Kind(AssemblerErrorKind::DuplicateLabel).with_line(line));
        }
        let address = Word::try_from(self.replay.len())
            .ok()
            .and_then(|queued| queued.checked_mul(INSTRUCTION_WORDS))
            .and_then(|offset| self.address.checked_add(offset))
            .ok_or(AssemblerError::Kind(AssemblerErrorKind::AddressOverflow).with_line(line))?;
        trace!("label on line {} at {}", line, address);
        self.labels
            .push(Label { name, address })
            .map_err(|_| AssemblerError::Kind(AssemblerErrorKind::MaxLabelsExceeded).with_line(line))
    }
}

impl<'src, const LABEL_CAP: usize, const REPLAY_CAP: usize, const LOOKAHEAD: usize> Iterator
    for Linker<'src, LABEL_CAP, REPLAY_CAP, LOOKAHEAD>
{
    type Item = Result<Instruction, AssemblerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.link_next().transpose()
    }
}
