//! Program images: an assembled program framed as a single COBS encoded
//! postcard message, ready to be written to a file or a serial link.

use heapless::Vec;
use postcard::{from_bytes_cobs, to_slice_cobs};
use sigma_vm::EncodedInstruction;

use crate::AssemblerError;

/// Writes `program` into `buffer` and returns the used part of it.
pub fn write_image<'buf>(
    program: &[EncodedInstruction],
    buffer: &'buf mut [u8],
) -> Result<&'buf mut [u8], AssemblerError> {
    Ok(to_slice_cobs(program, buffer)?)
}

/// Decodes a frame written by [`write_image`]. The frame is decoded in
/// place.
pub fn read_image<const N: usize>(
    frame: &mut [u8],
) -> Result<Vec<EncodedInstruction, N>, AssemblerError> {
    Ok(from_bytes_cobs(frame)?)
}
