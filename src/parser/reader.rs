use thiserror::Error;

use crate::error::ErrorState;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unexpected end of gif stream")]
pub struct EndOfStream;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubBlockError {
    #[error("stream ended before the sub-block terminator")]
    EndOfStream,

    #[error("sub-block declares {declared} bytes but only {available} remain")]
    Truncated { declared: usize, available: usize },
}

impl From<EndOfStream> for SubBlockError {
    fn from(_: EndOfStream) -> Self {
        SubBlockError::EndOfStream
    }
}

impl SubBlockError {
    pub fn error_state(&self) -> ErrorState {
        match self {
            SubBlockError::EndOfStream => ErrorState::END_OF_INPUT_STREAM,
            SubBlockError::Truncated { .. } => {
                ErrorState::DATA_BLOCK_TOO_SHORT | ErrorState::END_OF_INPUT_STREAM
            }
        }
    }
}

/// Concatenated payload of a sub-block sequence.
#[derive(Debug, Default)]
pub struct SubBlocks {
    pub data: Vec<u8>,
    pub blocks: usize,
    pub errors: ErrorState,
}

/// Cursor over an in-memory gif stream.
///
/// Every read either advances the position or fails with [`EndOfStream`]
/// without consuming anything.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, position: 0 }
    }

    pub fn at(buf: &'a [u8], position: usize) -> Self {
        Self {
            buf,
            position: position.min(buf.len()),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.buf.len());
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.position
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_byte(&mut self) -> Result<u8, EndOfStream> {
        let byte = *self.buf.get(self.position).ok_or(EndOfStream)?;
        self.position += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self) -> Result<u16, EndOfStream> {
        // multi-byte numeric fields are least significant byte first
        let bytes = self.read_array::<2>()?;
        Ok(u16::from_le_bytes(bytes))
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], EndOfStream> {
        let mut array = [0; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], EndOfStream> {
        if count > self.remaining() {
            return Err(EndOfStream);
        }
        let bytes = &self.buf[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    /// Skips a sub-block sequence including its zero terminator and returns
    /// the number of payload bytes skipped.
    pub fn skip_sub_blocks(&mut self) -> Result<usize, SubBlockError> {
        let mut skipped = 0;
        loop {
            let block_size = self.read_byte()? as usize;
            if block_size == 0 {
                return Ok(skipped);
            }

            if block_size > self.remaining() {
                let available = self.remaining();
                self.position = self.buf.len();
                return Err(SubBlockError::Truncated {
                    declared: block_size,
                    available,
                });
            }

            self.position += block_size;
            skipped += block_size;
        }
    }

    /// Collects a sub-block sequence. A truncated last block still
    /// contributes the bytes that are present.
    pub fn read_sub_blocks(&mut self) -> SubBlocks {
        let mut result = SubBlocks::default();

        loop {
            let block_size = match self.read_byte() {
                Ok(0) => break,
                Ok(size) => size as usize,
                Err(EndOfStream) => {
                    result.errors |= ErrorState::END_OF_INPUT_STREAM;
                    break;
                }
            };

            let available = block_size.min(self.remaining());
            result
                .data
                .extend_from_slice(&self.buf[self.position..self.position + available]);
            self.position += available;
            result.blocks += 1;

            if available < block_size {
                result.errors |= SubBlockError::Truncated {
                    declared: block_size,
                    available,
                }
                .error_state();
                break;
            }
        }

        result
    }
}
