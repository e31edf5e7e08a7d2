use heapless::Vec;
use sigma_vm::{GENERAL_REGISTER_COUNT, Register, Word};

use crate::{AssemblerError, AssemblerErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mnemonic {
    Mov,
    Lod,
    Sav,
    Ldi,
    Add,
    Min,
    Mul,
    Div,
    Mod,
    Gth,
    Lth,
    Geq,
    Leq,
    Equ,
    Neq,
    Land,
    Lor,
    Not,
    Band,
    Bor,
    Bnot,
    Xor,
    Jmp,
    Jiz,
    Jnz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Token<'src> {
    Mnemonic(Mnemonic),
    Register(Register),
    Number(Word),
    /// Any identifier that is not a keyword. Labels and label references.
    Word(&'src str),
    Semicolon,
    Colon,
    /// Reserved, no statement uses it yet.
    Comma,
    EndOfFile,
}

static MNEMONICS: [(&str, Mnemonic); 25] = [
    ("mov", Mnemonic::Mov),
    ("lod", Mnemonic::Lod),
    ("sav", Mnemonic::Sav),
    ("ldi", Mnemonic::Ldi),
    ("add", Mnemonic::Add),
    ("min", Mnemonic::Min),
    ("mul", Mnemonic::Mul),
    ("div", Mnemonic::Div),
    ("mod", Mnemonic::Mod),
    ("gth", Mnemonic::Gth),
    ("lth", Mnemonic::Lth),
    ("geq", Mnemonic::Geq),
    ("leq", Mnemonic::Leq),
    ("equ", Mnemonic::Equ),
    ("neq", Mnemonic::Neq),
    ("land", Mnemonic::Land),
    ("lor", Mnemonic::Lor),
    ("not", Mnemonic::Not),
    ("band", Mnemonic::Band),
    ("bor", Mnemonic::Bor),
    ("bnot", Mnemonic::Bnot),
    ("xor", Mnemonic::Xor),
    ("jmp", Mnemonic::Jmp),
    ("jiz", Mnemonic::Jiz),
    ("jnz", Mnemonic::Jnz),
];

static NAMED_REGISTERS: [(&str, Register); 7] = [
    ("a", Register::A),
    ("b", Register::B),
    ("c", Register::C),
    ("ip", Register::Ip),
    ("sp", Register::Sp),
    ("sbp", Register::Sbp),
    ("flg", Register::Flg),
];

// Position in this table is the register index. The length check keeps it
// in step with the machine's bank.
static GENERAL_REGISTERS: [&str; GENERAL_REGISTER_COUNT] =
    ["r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9"];

impl Mnemonic {
    /// Keyword text as it appears in the keyword table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mnemonic::Mov => "mov",
            Mnemonic::Lod => "lod",
            Mnemonic::Sav => "sav",
            Mnemonic::Ldi => "ldi",
            Mnemonic::Add => "add",
            Mnemonic::Min => "min",
            Mnemonic::Mul => "mul",
            Mnemonic::Div => "div",
            Mnemonic::Mod => "mod",
            Mnemonic::Gth => "gth",
            Mnemonic::Lth => "lth",
            Mnemonic::Geq => "geq",
            Mnemonic::Leq => "leq",
            Mnemonic::Equ => "equ",
            Mnemonic::Neq => "neq",
            Mnemonic::Land => "land",
            Mnemonic::Lor => "lor",
            Mnemonic::Not => "not",
            Mnemonic::Band => "band",
            Mnemonic::Bor => "bor",
            Mnemonic::Bnot => "bnot",
            Mnemonic::Xor => "xor",
            Mnemonic::Jmp => "jmp",
            Mnemonic::Jiz => "jiz",
            Mnemonic::Jnz => "jnz",
        }
    }
}

/// Classifies an identifier. Keywords are matched without regard to case.
pub fn keyword(text: &str) -> Option<Token<'static>> {
    if let Some((_, mnemonic)) = MNEMONICS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(text))
    {
        return Some(Token::Mnemonic(*mnemonic));
    }
    if let Some((_, register)) = NAMED_REGISTERS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(text))
    {
        return Some(Token::Register(*register));
    }
    GENERAL_REGISTERS
        .iter()
        .position(|name| name.eq_ignore_ascii_case(text))
        .and_then(Register::general)
        .map(Token::Register)
}

/// Splits source text into tokens on demand.
///
/// The lexer never fails. Characters that cannot start a token are skipped,
/// a NUL byte ends the input early, and numbers keep whatever digits they
/// managed to accumulate.
pub struct Lexer<'src> {
    source: &'src str,
    cursor: usize,
    line: u32,
    token_line: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            cursor: 0,
            line: 1,
            token_line: 1,
        }
    }

    /// Line of the most recently returned token, starting at 1.
    pub fn line(&self) -> u32 {
        self.token_line
    }

    pub fn at_eof(&self) -> bool {
        matches!(self.current(), None | Some(0))
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.line = 1;
        self.token_line = 1;
    }

    pub fn next_token(&mut self) -> Token<'src> {
        loop {
            self.token_line = self.line;
            let Some(byte) = self.current() else {
                return Token::EndOfFile;
            };
            match byte {
                0 => return Token::EndOfFile,
                b'0'..=b'9' => return Token::Number(self.number()),
                b'_' | b'a'..=b'z' | b'A'..=b'Z' => return self.identifier(),
                b';' => {
                    self.advance();
                    return Token::Semicolon;
                }
                b':' => {
                    self.advance();
                    return Token::Colon;
                }
                b',' => {
                    self.advance();
                    return Token::Comma;
                }
                b'\n' => {
                    self.line = self.line.saturating_add(1);
                    self.advance();
                }
                _ => self.advance(),
            }
        }
    }

    /// Every token up to and including the end of file marker.
    pub fn tokenize_all<const N: usize>(&mut self) -> Result<Vec<Token<'src>, N>, AssemblerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            tokens.push(token).map_err(|_| {
                AssemblerError::Kind(AssemblerErrorKind::OutputFull).with_line(self.token_line)
            })?;
            if token == Token::EndOfFile {
                return Ok(tokens);
            }
        }
    }

    fn current(&self) -> Option<u8> {
        self.source.as_bytes().get(self.cursor).copied()
    }

    fn advance(&mut self) {
        self.cursor = self.cursor.saturating_add(1).min(self.source.len());
    }

    fn identifier(&mut self) -> Token<'src> {
        let start = self.cursor;
        while self
            .current()
            .is_some_and(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
        {
            self.advance();
        }
        // Both ends sit on ASCII bytes, so this is always a char boundary.
        let text = self.source.get(start..self.cursor).unwrap_or("");
        keyword(text).unwrap_or(Token::Word(text))
    }

    fn number(&mut self) -> Word {
        let mut radix: u32 = 10;
        if self.current() == Some(b'0') {
            self.advance();
            if matches!(self.current(), Some(b'x' | b'X')) {
                self.advance();
                radix = 16;
            }
        }

        let mut value: Word = 0;
        while let Some(digit) = self
            .current()
            .and_then(|byte| char::from(byte).to_digit(radix))
        {
            value = value
                .wrapping_mul(Word::from(radix))
                .wrapping_add(Word::from(digit));
            self.advance();
        }
        value
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Token::EndOfFile => None,
            token => Some(token),
        }
    }
}
