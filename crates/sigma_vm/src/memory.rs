use crate::{MachineError, Word};

/// Flat word addressed memory of a fixed size.
///
/// Addresses are 0 based. Any access at or past `SIZE` is a fault, it never
/// wraps.
#[derive(Debug, Clone)]
pub struct Memory<const SIZE: usize> {
    words: [Word; SIZE],
}

impl<const SIZE: usize> Memory<SIZE> {
    pub const fn new() -> Self {
        Self { words: [0; SIZE] }
    }

    pub const fn len(&self) -> usize {
        SIZE
    }

    pub const fn is_empty(&self) -> bool {
        SIZE == 0
    }

    pub fn read(&self, address: Word) -> Result<Word, MachineError> {
        let index = to_index(address)?;
        match self.words.get(index) {
            None => Err(MachineError::OutOfBoundsMemoryAccess(address)),
            Some(word) => Ok(*word),
        }
    }

    pub fn write(&mut self, address: Word, value: Word) -> Result<(), MachineError> {
        let index = to_index(address)?;
        *get_mut_or(
            &mut self.words,
            index,
            MachineError::OutOfBoundsMemoryAccess(address),
        )? = value;
        Ok(())
    }

    /// Raw view of the whole memory, for dumping.
    pub fn as_slice(&self) -> &[Word] {
        &self.words
    }
}

impl<const SIZE: usize> Default for Memory<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

fn to_index(address: Word) -> Result<usize, MachineError> {
    usize::try_from(address).map_err(|_| MachineError::OutOfBoundsMemoryAccess(address))
}

fn get_mut_or<E>(slice: &mut [Word], index: usize, err: E) -> Result<&mut Word, E> {
    slice.get_mut(index).ok_or(err)
}
