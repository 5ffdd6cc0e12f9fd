mod bit_reader;
mod blocks;
mod decoder;
mod lzw;
mod reader;

pub use blocks::{
    ApplicationExtension, ColorTable, GraphicControlExtension, Header, ImageDescriptor,
    LogicalScreenDescriptor, LoopCount, Rgba, Version,
};
pub use decoder::StreamDecoder;
pub use lzw::{decompress, lzw_decode, Decompressed};
pub use reader::{ByteReader, EndOfStream, SubBlockError, SubBlocks};

pub(crate) const EXTENSION_INTRODUCER: u8 = 0x21;
pub(crate) const IMAGE_DESCRIPTOR_LABEL: u8 = 0x2c;
pub(crate) const TRAILER_LABEL: u8 = 0x3b;

// Extension labels
pub(crate) const APPLICATION_EXTENSION: u8 = 0xff;
pub(crate) const COMMENT_EXTENSION: u8 = 0xfe;
pub(crate) const GRAPHIC_CONTROL_EXTENSION: u8 = 0xf9;
pub(crate) const PLAIN_TEXT_EXTENSION: u8 = 0x01;

/// What happens to a frame's pixels before the next frame is drawn.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposalMethod {
    #[default]
    NotSpecified = 0,
    DoNotDispose = 1,
    RestoreToBackground = 2,
    RestoreToPrevious = 3,
}

impl DisposalMethod {
    /// Reserved values 4 through 7 are read as `NotSpecified`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => DisposalMethod::DoNotDispose,
            2 => DisposalMethod::RestoreToBackground,
            3 => DisposalMethod::RestoreToPrevious,
            _ => DisposalMethod::NotSpecified,
        }
    }
}
