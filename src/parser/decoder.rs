use log::{debug, warn};

use super::blocks::{
    ApplicationExtension, ColorTable, GraphicControlExtension, Header, ImageDescriptor,
    LogicalScreenDescriptor, LoopCount,
};
use super::lzw::{self, Decompressed};
use super::reader::{ByteReader, EndOfStream};
use super::{
    APPLICATION_EXTENSION, COMMENT_EXTENSION, EXTENSION_INTRODUCER, GRAPHIC_CONTROL_EXTENSION,
    IMAGE_DESCRIPTOR_LABEL, PLAIN_TEXT_EXTENSION, TRAILER_LABEL,
};
use crate::error::{ErrorState, HasErrorState};
use crate::frame::{base_source, BaseSource, Frame};

#[derive(Debug)]
enum ExtensionType {
    Application,
    Comment,
    GraphicControl,
    PlainText,
    Unknown(u8),
}

impl From<u8> for ExtensionType {
    fn from(value: u8) -> Self {
        use ExtensionType::*;

        match value {
            APPLICATION_EXTENSION => Application,
            COMMENT_EXTENSION => Comment,
            GRAPHIC_CONTROL_EXTENSION => GraphicControl,
            PLAIN_TEXT_EXTENSION => PlainText,
            label => Unknown(label),
        }
    }
}

#[derive(Debug)]
enum ParserState {
    ReadingHeader,
    ReadingLogicalScreenDescriptor,
    ReadingGlobalColorTable(usize),
    ReadingBlocks(Option<GraphicControlExtension>),
    ReadingExtension(u8, Option<GraphicControlExtension>),
    ReadingImage(Option<GraphicControlExtension>),
    Trailer,
    Done,
}

/// Everything the catalogue pass learns about a stream.
#[derive(Debug, Default)]
struct Catalogue {
    header: Option<Header>,
    logical_screen_descriptor: Option<LogicalScreenDescriptor>,
    global_color_table: Option<ColorTable>,
    application_extensions: Vec<ApplicationExtension>,
    loop_count: Option<LoopCount>,
    frames: Vec<Frame>,
    errors: ErrorState,
}

/// Single pass over the block structure. Image data is skipped, not decoded.
struct Decoder<'a> {
    inner: ByteReader<'a>,
    catalogue: Catalogue,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            inner: ByteReader::new(data),
            catalogue: Catalogue::default(),
        }
    }

    fn parse(mut self) -> Catalogue {
        let mut state = ParserState::ReadingHeader;

        loop {
            debug!("begin parsing state {:?}", state);

            state = match self.process_next_state(state) {
                Ok(ParserState::Done) => break,
                Ok(next_state) => next_state,
                Err(EndOfStream) => {
                    warn!(
                        "gif stream ended at byte {} before the trailer",
                        self.inner.position()
                    );
                    self.catalogue.errors |= ErrorState::END_OF_INPUT_STREAM;
                    break;
                }
            };
        }

        self.catalogue
    }

    fn process_next_state(&mut self, next_state: ParserState) -> Result<ParserState, EndOfStream> {
        use ParserState::*;

        match next_state {
            ReadingHeader => {
                let header = Header::read(&mut self.inner)?;
                if !header.is_valid() {
                    warn!("gif signature is invalid, continuing for inspection");
                }
                debug!("processed header, got {:?}", header);
                self.catalogue.header = Some(header);

                Ok(ReadingLogicalScreenDescriptor)
            }
            ReadingLogicalScreenDescriptor => {
                let screen = LogicalScreenDescriptor::read(&mut self.inner)?;
                debug!("processed logical screen descriptor, got: {:#?}", screen);
                self.catalogue.logical_screen_descriptor = Some(screen);

                Ok(match screen.global_color_table_len() {
                    Some(len) => ReadingGlobalColorTable(len),
                    None => ReadingBlocks(None),
                })
            }
            ReadingGlobalColorTable(len) => {
                let table = ColorTable::read(&mut self.inner, len)?;
                debug!("processed global color table with {} entries", table.len());
                self.catalogue.global_color_table = Some(table);

                Ok(ReadingBlocks(None))
            }
            ReadingBlocks(graphic_control_extension) => {
                let introducer_or_label = self.inner.read_byte()?;

                match introducer_or_label {
                    // extension introducer means that a label follows determining what exact type
                    // of extension it is.
                    EXTENSION_INTRODUCER => Ok(ReadingExtension(
                        self.inner.read_byte()?,
                        graphic_control_extension,
                    )),
                    IMAGE_DESCRIPTOR_LABEL => Ok(ReadingImage(graphic_control_extension)),
                    TRAILER_LABEL => Ok(Trailer),
                    label => {
                        warn!(
                            "unexpected block introducer 0x{label:02x} at byte {}",
                            self.inner.position() - 1
                        );
                        self.catalogue.errors |= ErrorState::BAD_DATA_BLOCK_INTRODUCER;
                        Ok(ReadingBlocks(graphic_control_extension))
                    }
                }
            }
            ReadingExtension(label, graphic_control_extension) => {
                self.process_extension(ExtensionType::from(label), graphic_control_extension)
            }
            ReadingImage(graphic_control_extension) => {
                self.process_image(graphic_control_extension)?;
                Ok(ReadingBlocks(None))
            }
            Trailer => Ok(Done),
            Done => Ok(Done),
        }
    }

    fn process_extension(
        &mut self,
        label: ExtensionType,
        pending: Option<GraphicControlExtension>,
    ) -> Result<ParserState, EndOfStream> {
        use ExtensionType::*;

        debug!("processing extension type: {:?}", label);
        match label {
            GraphicControl => {
                if pending.is_some() {
                    warn!("graphic control extension replaces one that was never used");
                }
                let extension = GraphicControlExtension::read(&mut self.inner)?;
                Ok(ParserState::ReadingBlocks(Some(extension)))
            }
            Application => {
                let extension = ApplicationExtension::read(&mut self.inner)?;
                if let Some(loop_count) = extension.loop_count() {
                    debug!("processed netscape extension, loop count {:?}", loop_count);
                    self.catalogue.loop_count = Some(loop_count);
                }
                self.catalogue.application_extensions.push(extension);
                Ok(ParserState::ReadingBlocks(pending))
            }
            Comment => {
                let skipped = self.skip_sub_blocks()?;
                debug!("skipped {skipped} bytes of comment");
                Ok(ParserState::ReadingBlocks(pending))
            }
            Unknown(label) => {
                let skipped = self.skip_sub_blocks()?;
                warn!("skipped {skipped} bytes of unknown extension 0x{label:02x}");
                Ok(ParserState::ReadingBlocks(pending))
            }
            PlainText => {
                // a plain text block is a graphic rendering block of its own and
                // consumes the control extension in front of it
                let skipped = self.skip_sub_blocks()?;
                debug!("skipped {skipped} bytes of plain text extension");
                Ok(ParserState::ReadingBlocks(None))
            }
        }
    }

    fn skip_sub_blocks(&mut self) -> Result<usize, EndOfStream> {
        self.inner.skip_sub_blocks().map_err(|err| {
            self.catalogue.errors |= err.error_state();
            EndOfStream
        })
    }

    fn process_image(
        &mut self,
        graphic_control_extension: Option<GraphicControlExtension>,
    ) -> Result<(), EndOfStream> {
        let descriptor_offset = self.inner.position() - 1;
        let descriptor = ImageDescriptor::read(&mut self.inner)?;
        let index = self.catalogue.frames.len();

        let control = graphic_control_extension.unwrap_or_default();
        let mut frame = Frame::new(index, descriptor_offset, descriptor, control);
        if graphic_control_extension.is_none() {
            frame.errors |= ErrorState::NO_GRAPHIC_CONTROL_EXTENSION;
        }
        if !descriptor.local_color_table_flag && self.catalogue.global_color_table.is_none() {
            warn!("frame {index} has no colour table");
            frame.errors |= ErrorState::FRAME_HAS_NO_COLOR_TABLE;
        }

        let result = self.process_image_data(&mut frame);
        debug!("catalogued frame {}: {:?}", index, frame.info());
        self.catalogue.frames.push(frame);
        result
    }

    fn process_image_data(&mut self, frame: &mut Frame) -> Result<(), EndOfStream> {
        if let Some(len) = frame.descriptor.local_color_table_len() {
            match ColorTable::read(&mut self.inner, len) {
                Ok(table) => frame.local_color_table = Some(table),
                Err(EndOfStream) => {
                    frame.errors |= ErrorState::END_OF_INPUT_STREAM
                        | ErrorState::FRAME_HAS_NO_IMAGE_DATA;
                    return Err(EndOfStream);
                }
            }
        }

        frame.data_offset = self.inner.position();
        let result = match self.inner.read_byte() {
            Ok(_) => self.inner.skip_sub_blocks().map_err(|err| err.error_state()),
            Err(EndOfStream) => Err(ErrorState::END_OF_INPUT_STREAM),
        };

        match result {
            Ok(0) => {
                warn!("frame {} has no image data", frame.index);
                frame.errors |= ErrorState::FRAME_HAS_NO_IMAGE_DATA;
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(state) => {
                warn!("image data of frame {} is cut short", frame.index);
                frame.errors |= state;
                if frame.data_offset + 1 >= self.inner.position() {
                    frame.errors |= ErrorState::FRAME_HAS_NO_IMAGE_DATA;
                }
                Err(EndOfStream)
            }
        }
    }
}

/// Owns the stream and the frame arena built from it.
#[derive(Debug)]
pub struct StreamDecoder {
    data: Box<[u8]>,
    pub(crate) header: Option<Header>,
    pub(crate) logical_screen_descriptor: Option<LogicalScreenDescriptor>,
    pub(crate) global_color_table: Option<ColorTable>,
    pub(crate) application_extensions: Vec<ApplicationExtension>,
    pub(crate) loop_count: Option<LoopCount>,
    pub(crate) frames: Vec<Frame>,
    errors: ErrorState,
}

impl StreamDecoder {
    /// Catalogues every frame of `data`. Never fails: faults are recorded in
    /// the error state and whatever could be catalogued is kept.
    pub fn new(data: impl Into<Box<[u8]>>) -> Self {
        let data = data.into();
        let catalogue = Decoder::new(&data).parse();

        let mut decoder = Self {
            data,
            header: catalogue.header,
            logical_screen_descriptor: catalogue.logical_screen_descriptor,
            global_color_table: catalogue.global_color_table,
            application_extensions: catalogue.application_extensions,
            loop_count: catalogue.loop_count,
            frames: catalogue.frames,
            errors: catalogue.errors,
        };
        decoder.compute_independence();

        debug!(
            "catalogued {} frames on a {}x{} canvas",
            decoder.frames.len(),
            decoder.screen().screen_width,
            decoder.screen().screen_height
        );
        decoder
    }

    fn compute_independence(&mut self) {
        let screen = self.screen();
        for index in 0..self.frames.len() {
            let independent = matches!(
                base_source(&self.frames, &screen, index),
                BaseSource::Blank | BaseSource::Background(_)
            );
            self.frames[index].independent = independent;
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// The logical screen, all zero when the stream ended before it.
    pub fn screen(&self) -> LogicalScreenDescriptor {
        self.logical_screen_descriptor.unwrap_or_default()
    }

    pub fn global_color_table(&self) -> Option<&ColorTable> {
        self.global_color_table.as_ref()
    }

    pub fn loop_count(&self) -> Option<LoopCount> {
        self.loop_count
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// The colour table a frame paints with.
    pub(crate) fn color_table_for(&self, index: usize) -> Option<&ColorTable> {
        self.frames[index]
            .local_color_table
            .as_ref()
            .or(self.global_color_table.as_ref())
    }

    /// Decompresses the image data of a frame into colour-table indices.
    pub(crate) fn decode_indices(&self, index: usize) -> Decompressed {
        let frame = &self.frames[index];
        let mut reader = ByteReader::at(&self.data, frame.data_offset);
        lzw::decompress(&mut reader, frame.descriptor.pixel_count())
    }
}

impl HasErrorState for StreamDecoder {
    fn error_state(&self) -> ErrorState {
        self.errors
            | self.header.error_state()
            | self.logical_screen_descriptor.error_state()
            | self.global_color_table.error_state()
            | self.application_extensions.error_state()
            | self.frames.error_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DisposalMethod;

    fn two_by_two() -> Vec<u8> {
        let mut data = b"GIF89a".to_vec();
        // 2x2 canvas, 2 entry global table, background 0
        data.extend_from_slice(&[2, 0, 2, 0, 0b1000_0000, 0, 0]);
        data.extend_from_slice(&[0, 0, 0, 0xff, 0xff, 0xff]);
        // loop forever
        data.extend_from_slice(&[0x21, 0xff, 11]);
        data.extend_from_slice(b"NETSCAPE2.0");
        data.extend_from_slice(&[3, 1, 0, 0, 0]);
        // comment
        data.extend_from_slice(&[0x21, 0xfe, 2, b'h', b'i', 0]);
        // restore to background, delay 5
        data.extend_from_slice(&[0x21, 0xf9, 4, 0b0000_1000, 5, 0, 0, 0]);
        data.extend_from_slice(&[0x2c, 0, 0, 0, 0, 2, 0, 2, 0, 0]);
        data.extend_from_slice(&[0x02, 0x03, 0x0c, 0x10, 0x05, 0x00]);
        data.push(0x3b);
        data
    }

    #[test]
    fn catalogues_single_frame() {
        let decoder = StreamDecoder::new(two_by_two());

        assert_eq!(decoder.screen().screen_width, 2);
        assert_eq!(decoder.frames().len(), 1);
        assert_eq!(decoder.loop_count(), Some(LoopCount::Infinite));
        assert!(decoder.error_state().is_ok());

        let frame = &decoder.frames()[0];
        assert_eq!(frame.control().disposal_method, DisposalMethod::RestoreToBackground);
        assert_eq!(frame.control().delay_ms(), 50);
        assert_eq!(decoder.data()[frame.descriptor_offset], 0x2c);
        assert!(frame.independent);

        let decoded = decoder.decode_indices(0);
        assert_eq!(decoded.indices, vec![1, 0, 0, 1]);
    }

    #[test]
    fn unknown_introducer_is_skipped() {
        let mut data = two_by_two();
        let trailer = data.len() - 1;
        data.insert(trailer, 0x99);

        let decoder = StreamDecoder::new(data);
        assert_eq!(decoder.frames().len(), 1);
        assert_eq!(decoder.error_state(), ErrorState::BAD_DATA_BLOCK_INTRODUCER);
    }

    #[test]
    fn missing_trailer() {
        let mut data = two_by_two();
        data.pop();

        let decoder = StreamDecoder::new(data);
        assert_eq!(decoder.frames().len(), 1);
        assert_eq!(decoder.error_state(), ErrorState::END_OF_INPUT_STREAM);
    }

    #[test]
    fn bad_signature_keeps_structure() {
        let mut data = two_by_two();
        data[0] = b'J';

        let decoder = StreamDecoder::new(data);
        assert_eq!(decoder.frames().len(), 1);
        assert!(decoder.error_state().contains(ErrorState::BAD_SIGNATURE));
    }

    #[test]
    fn image_without_control_extension() {
        let mut data = b"GIF87a".to_vec();
        data.extend_from_slice(&[2, 0, 2, 0, 0b1000_0000, 0, 0]);
        data.extend_from_slice(&[0, 0, 0, 0xff, 0xff, 0xff]);
        data.extend_from_slice(&[0x2c, 0, 0, 0, 0, 2, 0, 2, 0, 0]);
        data.extend_from_slice(&[0x02, 0x03, 0x0c, 0x10, 0x05, 0x00]);
        data.push(0x3b);

        let decoder = StreamDecoder::new(data);
        let frame = &decoder.frames()[0];
        assert_eq!(frame.control().disposal_method, DisposalMethod::DoNotDispose);
        assert_eq!(
            frame.error_state(),
            ErrorState::NO_GRAPHIC_CONTROL_EXTENSION
        );
    }

    #[test]
    fn empty_stream() {
        let decoder = StreamDecoder::new(Vec::new());
        assert!(decoder.frames().is_empty());
        assert_eq!(decoder.error_state(), ErrorState::END_OF_INPUT_STREAM);
    }
}
