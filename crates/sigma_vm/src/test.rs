use super::*;
use crate::encoding::{GENERAL_MODE, NAMED_MODE};

extern crate std;
use std::vec::Vec as StdVec;

const SMALL_MEMORY: usize = 64;

#[derive(Default)]
struct RecordingConsole {
    printed: StdVec<u8>,
}

impl Console for RecordingConsole {
    fn put_char(&mut self, byte: u8) {
        self.printed.push(byte);
    }
}

fn op(op: Ops) -> EncodedInstruction {
    EncodedInstruction::new(InstructionWord::new(op), 0)
}

fn ldi(dest: Register, value: Word) -> EncodedInstruction {
    let dest = Operand::encode(dest).unwrap();
    EncodedInstruction::new(InstructionWord::new(Ops::LoadImmediate).with_left(dest), value)
}

fn mov(dest: Register, src: Register) -> EncodedInstruction {
    let word = InstructionWord::new(Ops::Move)
        .with_left(Operand::encode(dest).unwrap())
        .with_right(Operand::encode(src).unwrap());
    EncodedInstruction::new(word, 0)
}

fn booted(program: &[EncodedInstruction]) -> Result<Machine<SMALL_MEMORY>, MachineError> {
    let mut machine = Machine::<SMALL_MEMORY>::new();
    machine.load_program(program)?;
    machine.tick(&mut NullConsole)?;
    assert_eq!(machine.state(), MachineState::Running);
    Ok(machine)
}

fn all_registers() -> StdVec<Register> {
    let mut registers: StdVec<Register> = Register::NAMED.to_vec();
    for index in 0..GENERAL_REGISTER_COUNT {
        registers.push(Register::general(index).unwrap());
    }
    registers
}

#[test]
fn test_operand_round_trip_for_every_register() {
    for register in all_registers() {
        let operand = Operand::encode(register).unwrap();
        assert_eq!(operand.decode(), Some(register), "{}", register);
    }
}

#[test]
fn test_operand_modes() {
    let a = Operand::encode(Register::A).unwrap();
    assert_eq!(a.mode, NAMED_MODE);
    assert_eq!(a.argument, 0);

    let flg = Operand::encode(Register::Flg).unwrap();
    assert_eq!(flg.mode, NAMED_MODE);
    assert_eq!(flg.argument, 6);

    let r7 = Operand::encode(Register::General(7)).unwrap();
    assert_eq!(r7.mode, GENERAL_MODE);
    assert_eq!(r7.argument, 7);
}

#[test]
fn test_operand_rejects_out_of_range() {
    assert_eq!(Operand::encode(Register::General(10)), None);
    assert_eq!(Register::general(GENERAL_REGISTER_COUNT), None);

    let unknown_named = Operand {
        mode: NAMED_MODE,
        argument: 7,
    };
    assert_eq!(unknown_named.decode(), None);

    let unknown_general = Operand {
        mode: GENERAL_MODE,
        argument: 10,
    };
    assert_eq!(unknown_general.decode(), None);

    // Any nonzero mode means the general bank.
    let odd_mode = Operand {
        mode: 3,
        argument: 2,
    };
    assert_eq!(odd_mode.decode(), Some(Register::General(2)));
}

#[test]
fn test_instruction_word_layout() {
    let word = InstructionWord::new(Ops::Move)
        .with_left(Operand::encode(Register::General(3)).unwrap())
        .with_right(Operand::encode(Register::Sbp).unwrap());
    let packed = word.pack();

    assert_eq!(packed & 0xFFFF, 0x0000);
    assert_eq!((packed >> 16) & 0xFFFF, 0x0001);
    assert_eq!((packed >> 32) & 0xFFFF, 3);
    assert_eq!((packed >> 48) & 0xFFFF, 5);

    let unpacked = InstructionWord::unpack(packed);
    assert_eq!(unpacked, word);
    assert_eq!(unpacked.left_operand().decode(), Some(Register::General(3)));
    assert_eq!(unpacked.right_operand().decode(), Some(Register::Sbp));
}

#[test]
fn test_right_mode_uses_high_byte() {
    let word = InstructionWord::new(Ops::Move)
        .with_left(Operand::encode(Register::A).unwrap())
        .with_right(Operand::encode(Register::General(9)).unwrap());
    assert_eq!(word.flag, 0x0100);
    assert_eq!(word.right, 9);
}

#[test]
fn test_ops_decode() {
    for op in Ops::all() {
        assert_eq!(Ops::try_from(u16::from(*op)), Ok(*op));
    }
    assert_eq!(Ops::try_from(0x0010), Ok(Ops::LoadImmediate));
    assert_eq!(Ops::try_from(0x2002), Ok(Ops::JumpIfNotZero));
    assert_eq!(Ops::try_from(0x0003), Err(MachineError::InvalidOp(0x0003)));
}

#[test]
fn test_new_machine_starts_in_bios_mode() {
    let machine = Machine::<SMALL_MEMORY>::new();
    assert_eq!(machine.state(), MachineState::Startup);
    assert_eq!(machine.registers().flags, BIOS_MODE_BIT);
    assert_eq!(machine.registers().ip, 0);
}

#[test]
fn test_bios_tick_prints_char() -> Result<(), MachineError> {
    let mut machine = Machine::<SMALL_MEMORY>::new();
    machine.registers_mut().a = PRINT_CHAR_SENTINEL;
    machine.registers_mut().b = Word::from(b'x');
    let mut console = RecordingConsole::default();

    machine.tick(&mut console)?;

    assert_eq!(console.printed, b"x");
    assert_eq!(machine.state(), MachineState::Running);
    assert_eq!(machine.registers().flags & BIOS_MODE_BIT, 0);
    assert_eq!(machine.registers().flags & RUNNING_BIT, RUNNING_BIT);
    // The startup tick does not execute anything.
    assert_eq!(machine.registers().ip, 0);
    Ok(())
}

#[test]
fn test_bios_tick_without_sentinel_is_silent() -> Result<(), MachineError> {
    let mut machine = Machine::<SMALL_MEMORY>::new();
    machine.registers_mut().b = Word::from(b'x');
    let mut console = RecordingConsole::default();
    machine.tick(&mut console)?;
    assert!(console.printed.is_empty());
    Ok(())
}

#[test]
fn test_load_immediate_and_add() -> Result<(), MachineError> {
    let mut machine = booted(&[
        ldi(Register::A, 5),
        ldi(Register::B, 3),
        op(Ops::Add),
    ])?;
    machine.tick(&mut NullConsole)?;
    machine.tick(&mut NullConsole)?;
    assert_eq!(machine.registers().a, 5);
    assert_eq!(machine.registers().b, 3);
    assert_eq!(machine.registers().ip, 4);
    machine.tick(&mut NullConsole)?;
    assert_eq!(machine.registers().c, 8);
    assert_eq!(machine.registers().ip, 6);
    Ok(())
}

fn binary(a: Word, b: Word, op_code: Ops) -> Result<Word, MachineError> {
    let mut machine = booted(&[ldi(Register::A, a), ldi(Register::B, b), op(op_code)])?;
    machine.run_for(&mut NullConsole, 3)?;
    Ok(machine.registers().c)
}

#[test]
fn test_arithmetic_wraps() -> Result<(), MachineError> {
    assert_eq!(binary(Word::MAX, 2, Ops::Add)?, 1);
    assert_eq!(binary(1, 2, Ops::Subtract)?, Word::MAX);
    assert_eq!(binary(1 << 63, 2, Ops::Multiply)?, 0);
    assert_eq!(binary(17, 5, Ops::Divide)?, 3);
    assert_eq!(binary(17, 5, Ops::Mod)?, 2);
    Ok(())
}

#[test]
fn test_comparisons() -> Result<(), MachineError> {
    assert_eq!(binary(4, 3, Ops::GreaterThan)?, 1);
    assert_eq!(binary(3, 3, Ops::GreaterThan)?, 0);
    assert_eq!(binary(2, 3, Ops::LessThan)?, 1);
    assert_eq!(binary(3, 3, Ops::GreaterThanEq)?, 1);
    assert_eq!(binary(4, 3, Ops::LessThanEq)?, 0);
    assert_eq!(binary(9, 9, Ops::Equal)?, 1);
    assert_eq!(binary(9, 9, Ops::NotEqual)?, 0);
    Ok(())
}

#[test]
fn test_logic_and_bitwise() -> Result<(), MachineError> {
    assert_eq!(binary(7, 0, Ops::And)?, 0);
    assert_eq!(binary(7, 2, Ops::And)?, 1);
    assert_eq!(binary(0, 0, Ops::Or)?, 0);
    assert_eq!(binary(0, 5, Ops::Or)?, 1);
    assert_eq!(binary(0, 5, Ops::Not)?, 1);
    assert_eq!(binary(8, 5, Ops::Not)?, 0);
    assert_eq!(binary(0b1100, 0b1010, Ops::BitwiseAnd)?, 0b1000);
    assert_eq!(binary(0b1100, 0b1010, Ops::BitwiseOr)?, 0b1110);
    assert_eq!(binary(0b1100, 0b1010, Ops::BitwiseXor)?, 0b0110);
    assert_eq!(binary(0, 0, Ops::BitwiseNot)?, Word::MAX);
    Ok(())
}

#[test]
fn test_division_by_zero_faults() -> Result<(), MachineError> {
    let mut machine = booted(&[ldi(Register::A, 10), ldi(Register::B, 0), op(Ops::Divide)])?;
    let err = machine.run_for(&mut NullConsole, 3).unwrap_err();
    assert_eq!(err, MachineError::DivisionByZero);

    let mut machine = booted(&[ldi(Register::A, 10), ldi(Register::B, 0), op(Ops::Mod)])?;
    let err = machine.run_for(&mut NullConsole, 3).unwrap_err();
    assert_eq!(err, MachineError::ModuloByZero);
    Ok(())
}

#[test]
fn test_move_between_banks() -> Result<(), MachineError> {
    let mut machine = booted(&[
        ldi(Register::General(4), 77),
        mov(Register::Sp, Register::General(4)),
        mov(Register::General(0), Register::Sp),
    ])?;
    machine.run_for(&mut NullConsole, 3)?;
    assert_eq!(machine.registers().sp, 77);
    assert_eq!(machine.registers().general[0], 77);
    assert_eq!(machine.registers().general[4], 77);
    Ok(())
}

#[test]
fn test_move_to_missing_register_faults() -> Result<(), MachineError> {
    let word = InstructionWord::new(Ops::Move)
        .with_left(Operand {
            mode: NAMED_MODE,
            argument: 42,
        })
        .with_right(Operand::encode(Register::A).unwrap());
    let mut machine = booted(&[EncodedInstruction::new(word, 0)])?;
    let err = machine.tick(&mut NullConsole).unwrap_err();
    assert_eq!(
        err,
        MachineError::RegisterDoesNotExist {
            mode: NAMED_MODE,
            argument: 42
        }
    );
    Ok(())
}

#[test]
fn test_load_immediate_to_missing_register_faults() -> Result<(), MachineError> {
    let word = InstructionWord::new(Ops::LoadImmediate).with_left(Operand {
        mode: GENERAL_MODE,
        argument: 12,
    });
    let mut machine = booted(&[EncodedInstruction::new(word, 1)])?;
    let err = machine.tick(&mut NullConsole).unwrap_err();
    assert!(matches!(err, MachineError::RegisterDoesNotExist { argument: 12, .. }));
    Ok(())
}

#[test]
fn test_store_then_load() -> Result<(), MachineError> {
    let mut machine = booted(&[
        ldi(Register::A, 1234),
        ldi(Register::B, 40),
        op(Ops::Store),
        ldi(Register::A, 0),
        op(Ops::Load),
    ])?;
    machine.run_for(&mut NullConsole, 5)?;
    assert_eq!(machine.memory().read(40)?, 1234);
    assert_eq!(machine.registers().a, 1234);
    Ok(())
}

#[test]
fn test_memory_bounds() -> Result<(), MachineError> {
    let size = SMALL_MEMORY as Word;
    let mut machine = booted(&[ldi(Register::B, size), op(Ops::Load)])?;
    let err = machine.run_for(&mut NullConsole, 2).unwrap_err();
    assert_eq!(err, MachineError::OutOfBoundsMemoryAccess(size));

    let mut machine = booted(&[ldi(Register::B, size + 5), op(Ops::Store)])?;
    let err = machine.run_for(&mut NullConsole, 2).unwrap_err();
    assert_eq!(err, MachineError::OutOfBoundsMemoryAccess(size + 5));

    let mut machine = booted(&[ldi(Register::B, size - 1), op(Ops::Store)])?;
    machine.run_for(&mut NullConsole, 2)?;
    Ok(())
}

#[test]
fn test_jumps() -> Result<(), MachineError> {
    let mut machine = booted(&[ldi(Register::A, 0), op(Ops::Jump)])?;
    machine.run_for(&mut NullConsole, 2)?;
    assert_eq!(machine.registers().ip, 0);

    let mut machine = booted(&[
        ldi(Register::A, 40),
        ldi(Register::B, 1),
        op(Ops::JumpIfZero),
    ])?;
    machine.run_for(&mut NullConsole, 3)?;
    assert_eq!(machine.registers().ip, 6);

    let mut machine = booted(&[
        ldi(Register::A, 40),
        ldi(Register::B, 1),
        op(Ops::JumpIfNotZero),
    ])?;
    machine.run_for(&mut NullConsole, 3)?;
    assert_eq!(machine.registers().ip, 40);
    Ok(())
}

#[test]
fn test_invalid_op_faults() -> Result<(), MachineError> {
    let bogus = EncodedInstruction {
        info: 0x0BAD,
        immediate: 0,
    };
    let mut machine = booted(&[bogus])?;
    let err = machine.tick(&mut NullConsole).unwrap_err();
    assert_eq!(err, MachineError::InvalidOp(0x0BAD));
    Ok(())
}

#[test]
fn test_clearing_flags_halts() -> Result<(), MachineError> {
    let mut machine = Machine::<SMALL_MEMORY>::new();
    machine.load_program(&[ldi(Register::C, 9), ldi(Register::Flg, 0), ldi(Register::C, 1)])?;
    machine.launch(&mut NullConsole)?;
    assert_eq!(machine.state(), MachineState::Halted);
    assert_eq!(machine.registers().c, 9);
    assert_eq!(machine.tick(&mut NullConsole), Err(MachineError::Halted));
    Ok(())
}

#[test]
fn test_run_for_stops_endless_loop() -> Result<(), MachineError> {
    let mut machine = Machine::<SMALL_MEMORY>::new();
    machine.load_program(&[ldi(Register::A, 0), op(Ops::Jump)])?;
    let state = machine.run_for(&mut NullConsole, 101)?;
    assert_eq!(state, MachineState::Running);
    assert_eq!(machine.registers().ip, 0);
    Ok(())
}

#[test]
fn test_program_too_large() {
    let mut machine = Machine::<4>::new();
    let program = [op(Ops::Add), op(Ops::Add), op(Ops::Add)];
    assert_eq!(
        machine.load_program(&program),
        Err(MachineError::ProgramTooLarge(3))
    );
    assert!(machine.load_program(&program[..2]).is_ok());
}

#[test]
fn test_fetch_past_end_of_memory() -> Result<(), MachineError> {
    let mut machine = Machine::<4>::new();
    machine.load_program(&[op(Ops::Add), op(Ops::Add)])?;
    let err = machine.run_for(&mut NullConsole, 4).unwrap_err();
    assert_eq!(err, MachineError::OutOfBoundsMemoryAccess(4));
    Ok(())
}
