use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Faults found while cataloguing or decoding a stream.
    ///
    /// Faults are recorded, never raised: a frame or stream can carry several
    /// at once and decoding carries on with whatever could be recovered.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ErrorState: u32 {
        /// The first three header bytes are not `GIF`.
        const BAD_SIGNATURE = 1 << 0;
        /// The stream ended before the structure being read was complete.
        const END_OF_INPUT_STREAM = 1 << 1;
        /// A block or sub-block holds fewer bytes than it declares.
        const DATA_BLOCK_TOO_SHORT = 1 << 2;
        /// A fixed-size block declares more bytes than its layout has.
        const DATA_BLOCK_TOO_LONG = 1 << 3;
        /// Data sub-blocks were found where a block terminator belongs.
        const UNEXPECTED_BLOCK_TERMINATOR = 1 << 4;
        /// A block started with a byte that is not 0x21, 0x2c or 0x3b.
        const BAD_DATA_BLOCK_INTRODUCER = 1 << 5;
        /// The LZW minimum code size would overflow the 4096 entry dictionary.
        const LZW_MINIMUM_CODE_SIZE_TOO_LARGE = 1 << 6;
        /// A code referenced a dictionary entry that was not defined yet.
        const CODE_NOT_IN_DICTIONARY = 1 << 7;
        /// The image data ended before every pixel was produced.
        const TOO_FEW_PIXELS_IN_IMAGE_DATA = 1 << 8;
        /// Neither a local nor a global colour table is available.
        const FRAME_HAS_NO_COLOR_TABLE = 1 << 9;
        /// The image descriptor is not followed by any image data.
        const FRAME_HAS_NO_IMAGE_DATA = 1 << 10;
        /// A pixel index points past the end of the active colour table.
        const BAD_COLOR_INDEX = 1 << 11;
        /// No graphic control extension preceded the image.
        const NO_GRAPHIC_CONTROL_EXTENSION = 1 << 12;
    }
}

impl ErrorState {
    pub fn is_ok(&self) -> bool {
        self.is_empty()
    }
}

/// Anything that can report an [`ErrorState`].
///
/// Composite nodes OR their own flags with those of an explicit list of
/// children, so the stream-level state is the union of everything below it.
pub trait HasErrorState {
    fn error_state(&self) -> ErrorState;
}

impl<T: HasErrorState> HasErrorState for Option<T> {
    fn error_state(&self) -> ErrorState {
        self.as_ref().map(HasErrorState::error_state).unwrap_or_default()
    }
}

impl<T: HasErrorState> HasErrorState for [T] {
    fn error_state(&self) -> ErrorState {
        self.iter()
            .fold(ErrorState::empty(), |state, child| state | child.error_state())
    }
}

/// Hard failures, as opposed to the faults recorded in [`ErrorState`].
#[derive(Error, Debug)]
pub enum GifError {
    #[error("failed to read gif stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame {index} requested but the stream only has {count} frames")]
    FrameOutOfRange { index: usize, count: usize },

    #[error("logical screen is {width}x{height}, there is nothing to composite onto")]
    EmptyCanvas { width: u16, height: u16 },

    #[error("a colour table holds at most 256 entries, got {0}")]
    ColorTableTooLarge(usize),

    #[error("colour table size bits are only defined for power of two lengths, got {0}")]
    ColorTableNotPowerOfTwo(usize),
}

pub type Result<T> = std::result::Result<T, GifError>;
