use crate::encoding::Register;
use crate::{GENERAL_REGISTER_COUNT, Word};

/// The register file: seven named registers and the general purpose bank.
///
/// The low bits of `flags` double as the machine mode, see
/// [`RUNNING_BIT`](crate::RUNNING_BIT) and
/// [`BIOS_MODE_BIT`](crate::BIOS_MODE_BIT).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Registers {
    pub a: Word,
    pub b: Word,
    pub c: Word,
    pub ip: Word,
    pub sp: Word,
    pub sbp: Word,
    pub flags: Word,
    pub general: [Word; GENERAL_REGISTER_COUNT],
}

impl Registers {
    pub fn get(&self, register: Register) -> Option<Word> {
        match register {
            Register::A => Some(self.a),
            Register::B => Some(self.b),
            Register::C => Some(self.c),
            Register::Ip => Some(self.ip),
            Register::Sp => Some(self.sp),
            Register::Sbp => Some(self.sbp),
            Register::Flg => Some(self.flags),
            Register::General(index) => self.general.get(usize::from(index)).copied(),
        }
    }

    pub fn get_mut(&mut self, register: Register) -> Option<&mut Word> {
        match register {
            Register::A => Some(&mut self.a),
            Register::B => Some(&mut self.b),
            Register::C => Some(&mut self.c),
            Register::Ip => Some(&mut self.ip),
            Register::Sp => Some(&mut self.sp),
            Register::Sbp => Some(&mut self.sbp),
            Register::Flg => Some(&mut self.flags),
            Register::General(index) => self.general.get_mut(usize::from(index)),
        }
    }
}
