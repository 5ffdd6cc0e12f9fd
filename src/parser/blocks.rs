use log::{debug, warn};

use super::reader::{ByteReader, EndOfStream, SubBlockError};
use super::DisposalMethod;
use crate::error::{ErrorState, GifError, HasErrorState};

const GRAPHIC_CONTROL_BLOCK_SIZE: u8 = 4;
const APPLICATION_BLOCK_SIZE: u8 = 11;
const MAX_COLOR_TABLE_ENTRIES: usize = 256;

pub type Rgba = [u8; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V87a,
    V89a,
    Unknown([u8; 3]),
}

impl From<[u8; 3]> for Version {
    fn from(value: [u8; 3]) -> Self {
        match &value {
            b"87a" => Version::V87a,
            b"89a" => Version::V89a,
            _ => Version::Unknown(value),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub signature: [u8; 3],
    pub version: Version,
}

impl Header {
    pub fn read(reader: &mut ByteReader) -> Result<Self, EndOfStream> {
        let signature = reader.read_array::<3>()?;
        let version = Version::from(reader.read_array::<3>()?);

        if let Version::Unknown(raw) = version {
            warn!("unknown gif version {:?}", String::from_utf8_lossy(&raw));
        }

        Ok(Self { signature, version })
    }

    pub fn is_valid(&self) -> bool {
        &self.signature == b"GIF"
    }
}

impl HasErrorState for Header {
    fn error_state(&self) -> ErrorState {
        if self.is_valid() {
            ErrorState::empty()
        } else {
            ErrorState::BAD_SIGNATURE
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogicalScreenDescriptor {
    pub screen_width: u16,
    pub screen_height: u16,
    pub global_color_table_flag: bool,
    pub color_resolution: u8,
    pub sort_flag: bool,
    pub global_color_table_size_bits: u8,
    pub background_color_index: u8,
    pub pixel_aspect_ratio: u8,
}

impl LogicalScreenDescriptor {
    pub fn read(reader: &mut ByteReader) -> Result<Self, EndOfStream> {
        let screen_width = reader.read_u16()?;
        let screen_height = reader.read_u16()?;
        let packed_fields = reader.read_byte()?;
        let background_color_index = reader.read_byte()?;
        let pixel_aspect_ratio = reader.read_byte()?;

        Ok(Self {
            screen_width,
            screen_height,
            global_color_table_flag: packed_fields & 0b1000_0000 != 0,
            color_resolution: (packed_fields >> 4) & 0b0000_0111,
            sort_flag: packed_fields & 0b0000_1000 != 0,
            global_color_table_size_bits: packed_fields & 0b0000_0111,
            background_color_index,
            pixel_aspect_ratio,
        })
    }

    /// Number of entries in the global colour table, if there is one.
    pub fn global_color_table_len(&self) -> Option<usize> {
        self.global_color_table_flag
            .then(|| table_len(self.global_color_table_size_bits))
    }

    pub fn pixel_count(&self) -> usize {
        self.screen_width as usize * self.screen_height as usize
    }
}

impl HasErrorState for LogicalScreenDescriptor {
    fn error_state(&self) -> ErrorState {
        ErrorState::empty()
    }
}

fn table_len(size_bits: u8) -> usize {
    1 << ((size_bits & 0b111) + 1)
}

/// A palette of at most 256 opaque colours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    entries: Box<[Rgba]>,
}

impl ColorTable {
    pub fn new(entries: Vec<Rgba>) -> Result<Self, GifError> {
        if entries.len() > MAX_COLOR_TABLE_ENTRIES {
            return Err(GifError::ColorTableTooLarge(entries.len()));
        }
        Ok(Self {
            entries: entries.into_boxed_slice(),
        })
    }

    pub fn from_rgb(rgb: &[u8]) -> Result<Self, GifError> {
        Self::new(
            rgb.chunks_exact(3)
                .map(|color| [color[0], color[1], color[2], 0xff])
                .collect(),
        )
    }

    pub fn read(reader: &mut ByteReader, len: usize) -> Result<Self, EndOfStream> {
        let rgb = reader.read_bytes(3 * len.min(MAX_COLOR_TABLE_ENTRIES))?;
        Ok(Self {
            entries: rgb
                .chunks_exact(3)
                .map(|color| [color[0], color[1], color[2], 0xff])
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u8) -> Option<Rgba> {
        self.entries.get(index as usize).copied()
    }

    /// The packed-field encoding of this table's length.
    pub fn size_bits(&self) -> Result<u8, GifError> {
        let len = self.entries.len();
        if !(2..=MAX_COLOR_TABLE_ENTRIES).contains(&len) || !len.is_power_of_two() {
            return Err(GifError::ColorTableNotPowerOfTwo(len));
        }
        Ok(len.trailing_zeros() as u8 - 1)
    }
}

impl HasErrorState for ColorTable {
    fn error_state(&self) -> ErrorState {
        ErrorState::empty()
    }
}

/// Checks a fixed-size block's size byte and returns the flags it earns.
fn check_block_size(name: &str, actual: u8, expected: u8) -> ErrorState {
    if actual < expected {
        warn!("{name} block declares {actual} bytes, expected {expected}");
        ErrorState::DATA_BLOCK_TOO_SHORT
    } else if actual > expected {
        warn!("{name} block declares {actual} bytes, expected {expected}");
        ErrorState::DATA_BLOCK_TOO_LONG
    } else {
        ErrorState::empty()
    }
}

/// Consumes whatever follows a fixed-size block. Anything but an immediate
/// terminator is skipped and flagged.
fn expect_terminator(reader: &mut ByteReader) -> ErrorState {
    match reader.skip_sub_blocks() {
        Ok(0) => ErrorState::empty(),
        Ok(skipped) => {
            warn!("skipped {skipped} bytes where a block terminator was expected");
            ErrorState::UNEXPECTED_BLOCK_TERMINATOR
        }
        Err(SubBlockError::EndOfStream) => ErrorState::END_OF_INPUT_STREAM,
        Err(err) => ErrorState::UNEXPECTED_BLOCK_TERMINATOR | err.error_state(),
    }
}

/// Reads a block that announces its own length, padding or trimming it to
/// the expected `N` bytes.
fn read_sized_block<const N: usize>(
    reader: &mut ByteReader,
    name: &str,
) -> Result<([u8; N], ErrorState), EndOfStream> {
    let block_size = reader.read_byte()?;
    let errors = check_block_size(name, block_size, N as u8);

    let mut block = [0; N];
    let bytes = reader.read_bytes(block_size as usize)?;
    let used = bytes.len().min(N);
    block[..used].copy_from_slice(&bytes[..used]);

    Ok((block, errors))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicControlExtension {
    pub disposal_method: DisposalMethod,
    pub user_input_flag: bool,
    pub transparent_color_flag: bool,
    pub delay_time: u16,
    pub transparent_color_index: u8,
    pub(crate) errors: ErrorState,
}

impl Default for GraphicControlExtension {
    fn default() -> Self {
        Self {
            disposal_method: DisposalMethod::DoNotDispose,
            user_input_flag: false,
            transparent_color_flag: false,
            delay_time: 0,
            transparent_color_index: 0,
            errors: ErrorState::empty(),
        }
    }
}

impl GraphicControlExtension {
    /// Reads the extension body, starting right after the 0xf9 label.
    pub fn read(reader: &mut ByteReader) -> Result<Self, EndOfStream> {
        let (block, mut errors) =
            read_sized_block::<{ GRAPHIC_CONTROL_BLOCK_SIZE as usize }>(reader, "graphic control")?;

        // packed fields definition
        // XXXYYYZW
        // XXX = reserved, not needed
        // YYY = disposal method, indicates what to do with graphic after displaying
        // Z = user input flag
        // W = transparent color flag
        let packed_fields = block[0];
        let disposal_method = DisposalMethod::from_u8((packed_fields >> 2) & 0b0000_0111);

        errors |= expect_terminator(reader);

        let extension = Self {
            disposal_method,
            user_input_flag: packed_fields & 0b0000_0010 != 0,
            transparent_color_flag: packed_fields & 0b0000_0001 != 0,
            delay_time: u16::from_le_bytes([block[1], block[2]]),
            transparent_color_index: block[3],
            errors,
        };
        debug!("processed graphic control extension: {:?}", extension);

        Ok(extension)
    }

    pub fn transparent_index(&self) -> Option<u8> {
        self.transparent_color_flag
            .then_some(self.transparent_color_index)
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_time as u32 * 10
    }
}

impl HasErrorState for GraphicControlExtension {
    fn error_state(&self) -> ErrorState {
        self.errors
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub left_position: u16,
    pub top_position: u16,
    pub width: u16,
    pub height: u16,
    pub local_color_table_flag: bool,
    pub interlace_flag: bool,
    pub sort_flag: bool,
    pub local_color_table_size_bits: u8,
}

impl ImageDescriptor {
    /// Reads the descriptor, starting right after the 0x2c separator.
    pub fn read(reader: &mut ByteReader) -> Result<Self, EndOfStream> {
        let left_position = reader.read_u16()?;
        let top_position = reader.read_u16()?;
        let width = reader.read_u16()?;
        let height = reader.read_u16()?;
        let packed_fields = reader.read_byte()?;

        Ok(Self {
            left_position,
            top_position,
            width,
            height,
            local_color_table_flag: packed_fields & 0b1000_0000 != 0,
            interlace_flag: packed_fields & 0b0100_0000 != 0,
            sort_flag: packed_fields & 0b0010_0000 != 0,
            local_color_table_size_bits: packed_fields & 0b0000_0111,
        })
    }

    pub fn local_color_table_len(&self) -> Option<usize> {
        self.local_color_table_flag
            .then(|| table_len(self.local_color_table_size_bits))
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn covers(&self, screen: &LogicalScreenDescriptor) -> bool {
        self.left_position == 0
            && self.top_position == 0
            && self.width >= screen.screen_width
            && self.height >= screen.screen_height
    }
}

impl HasErrorState for ImageDescriptor {
    fn error_state(&self) -> ErrorState {
        ErrorState::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCount {
    Infinite,
    Number(u16),
}

#[derive(Debug, Clone)]
pub struct ApplicationExtension {
    pub application_identifier: [u8; 8],
    pub application_authentication_code: [u8; 3],
    pub application_data: Box<[u8]>,
    errors: ErrorState,
}

impl ApplicationExtension {
    /// Reads the extension body, starting right after the 0xff label.
    pub fn read(reader: &mut ByteReader) -> Result<Self, EndOfStream> {
        let (block, mut errors) =
            read_sized_block::<{ APPLICATION_BLOCK_SIZE as usize }>(reader, "application")?;

        let sub_blocks = reader.read_sub_blocks();
        errors |= sub_blocks.errors;

        let mut application_identifier = [0; 8];
        application_identifier.copy_from_slice(&block[..8]);
        let mut application_authentication_code = [0; 3];
        application_authentication_code.copy_from_slice(&block[8..]);

        Ok(Self {
            application_identifier,
            application_authentication_code,
            application_data: sub_blocks.data.into_boxed_slice(),
            errors,
        })
    }

    pub fn is_netscape(&self) -> bool {
        &self.application_identifier == b"NETSCAPE" && &self.application_authentication_code == b"2.0"
    }

    pub fn loop_count(&self) -> Option<LoopCount> {
        if !self.is_netscape() {
            return None;
        }

        match *self.application_data {
            [1, low, high, ..] => Some(match u16::from_le_bytes([low, high]) {
                0 => LoopCount::Infinite,
                number => LoopCount::Number(number),
            }),
            _ => {
                warn!(
                    "netscape extension carries {} bytes of unexpected data",
                    self.application_data.len()
                );
                None
            }
        }
    }
}

impl HasErrorState for ApplicationExtension {
    fn error_state(&self) -> ErrorState {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_logical_screen_descriptor() {
        let data = [0x0a, 0x00, 0x05, 0x00, 0b1001_0010, 3, 0];
        let screen = LogicalScreenDescriptor::read(&mut ByteReader::new(&data)).unwrap();

        assert_eq!(screen.screen_width, 10);
        assert_eq!(screen.screen_height, 5);
        assert!(screen.global_color_table_flag);
        assert_eq!(screen.color_resolution, 1);
        assert_eq!(screen.global_color_table_len(), Some(8));
        assert_eq!(screen.background_color_index, 3);
    }

    #[test]
    fn bad_signature_is_flagged() {
        let header = Header::read(&mut ByteReader::new(b"JIF89a")).unwrap();
        assert_eq!(header.version, Version::V89a);
        assert_eq!(header.error_state(), ErrorState::BAD_SIGNATURE);
    }

    #[test]
    fn color_table_size_limits() {
        assert!(ColorTable::new(vec![[0; 4]; 256]).is_ok());
        assert!(matches!(
            ColorTable::new(vec![[0; 4]; 257]),
            Err(GifError::ColorTableTooLarge(257))
        ));
    }

    #[test]
    fn size_bits_only_for_powers_of_two() {
        assert_eq!(ColorTable::new(vec![[0; 4]; 2]).unwrap().size_bits().unwrap(), 0);
        assert_eq!(ColorTable::new(vec![[0; 4]; 4]).unwrap().size_bits().unwrap(), 1);
        assert_eq!(ColorTable::new(vec![[0; 4]; 256]).unwrap().size_bits().unwrap(), 7);
        assert!(ColorTable::new(vec![[0; 4]; 12]).unwrap().size_bits().is_err());
        assert!(ColorTable::new(Vec::new()).unwrap().size_bits().is_err());
    }

    #[test]
    fn parses_graphic_control_extension() {
        let data = [4, 0b0000_1001, 0x0a, 0x00, 7, 0];
        let mut reader = ByteReader::new(&data);
        let extension = GraphicControlExtension::read(&mut reader).unwrap();

        assert_eq!(extension.disposal_method, DisposalMethod::RestoreToBackground);
        assert_eq!(extension.transparent_index(), Some(7));
        assert_eq!(extension.delay_ms(), 100);
        assert!(extension.error_state().is_ok());
        assert!(reader.is_at_end());
    }

    #[test]
    fn graphic_control_extension_with_wrong_size() {
        let data = [5, 0b0000_0100, 0x02, 0x00, 0, 0xee, 0];
        let mut reader = ByteReader::new(&data);
        let extension = GraphicControlExtension::read(&mut reader).unwrap();

        assert_eq!(extension.disposal_method, DisposalMethod::DoNotDispose);
        assert_eq!(extension.delay_time, 2);
        assert_eq!(extension.error_state(), ErrorState::DATA_BLOCK_TOO_LONG);
        assert!(reader.is_at_end());
    }

    #[test]
    fn graphic_control_extension_missing_terminator() {
        let data = [4, 0, 0, 0, 0, 2, 0xaa, 0xbb, 0];
        let extension = GraphicControlExtension::read(&mut ByteReader::new(&data)).unwrap();
        assert_eq!(
            extension.error_state(),
            ErrorState::UNEXPECTED_BLOCK_TERMINATOR
        );
    }

    #[test]
    fn default_graphic_control_extension() {
        let extension = GraphicControlExtension::default();
        assert_eq!(extension.disposal_method, DisposalMethod::DoNotDispose);
        assert_eq!(extension.transparent_index(), None);
        assert_eq!(extension.delay_time, 0);
    }

    #[test]
    fn parses_image_descriptor() {
        let data = [1, 0, 2, 0, 3, 0, 4, 0, 0b1100_0010];
        let descriptor = ImageDescriptor::read(&mut ByteReader::new(&data)).unwrap();

        assert_eq!(descriptor.left_position, 1);
        assert_eq!(descriptor.top_position, 2);
        assert_eq!(descriptor.width, 3);
        assert_eq!(descriptor.height, 4);
        assert!(descriptor.interlace_flag);
        assert_eq!(descriptor.local_color_table_len(), Some(8));
    }

    #[test]
    fn netscape_loop_count() {
        let mut data = vec![11];
        data.extend_from_slice(b"NETSCAPE2.0");
        data.extend_from_slice(&[3, 1, 5, 0, 0]);
        let extension = ApplicationExtension::read(&mut ByteReader::new(&data)).unwrap();

        assert!(extension.is_netscape());
        assert_eq!(extension.loop_count(), Some(LoopCount::Number(5)));
    }
}
