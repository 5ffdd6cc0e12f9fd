use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{debug, info};

use crate::cache::{resident_buffer_count, KeyframeCache};
use crate::compositor::Compositor;
use crate::config::{BackgroundFill, MemoryLimits, Options};
use crate::error::{ErrorState, GifError, HasErrorState, Result};
use crate::frame::{FrameInfo, FrameState};
use crate::parser::{LoopCount, StreamDecoder, Version};

/// A catalogued GIF animation that composites frames on demand.
///
/// Loading never fails on malformed data. Whatever could be catalogued is
/// available and the faults are reported through [`GifAnimation::error_state`].
///
/// ```no_run
/// # fn main() -> Result<(), gifreel::GifError> {
/// let mut animation = gifreel::GifAnimation::load("spinner.gif")?;
/// let frame_len = animation.width() * animation.height() * 4;
/// for index in 0..animation.frame_count() {
///     let rgba = animation.get_frame(index)?;
///     assert_eq!(rgba.len(), frame_len);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GifAnimation {
    stream: StreamDecoder,
    compositor: Compositor,
    cache: KeyframeCache,
}

impl GifAnimation {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("loading {}", path.display());
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self::from_bytes(data))
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::with_options(data, Options::default())
    }

    pub fn with_options(data: Vec<u8>, options: Options) -> Self {
        let mut stream = StreamDecoder::new(data);
        let screen = stream.screen();
        let compositor = Compositor::new(
            &screen,
            stream.global_color_table(),
            options.background_fill,
        );

        let cache = KeyframeCache::new(options.memory, compositor.buffer_len(), &mut stream.frames);

        let errors = stream.error_state();
        if !errors.is_ok() {
            debug!("stream carries faults: {:?}", errors);
        }

        Self {
            stream,
            compositor,
            cache,
        }
    }

    pub fn width(&self) -> usize {
        self.compositor.width()
    }

    pub fn height(&self) -> usize {
        self.compositor.height()
    }

    pub fn frame_count(&self) -> usize {
        self.stream.frames().len()
    }

    pub fn frame_delays_ms(&self) -> Vec<u32> {
        self.stream
            .frames()
            .iter()
            .map(|frame| frame.control().delay_ms())
            .collect()
    }

    /// `None` when the stream has no NETSCAPE2.0 extension and plays once.
    pub fn loop_count(&self) -> Option<LoopCount> {
        self.stream.loop_count()
    }

    pub fn version(&self) -> Option<Version> {
        self.stream.header().map(|header| header.version)
    }

    pub fn frame_info(&self, index: usize) -> Result<FrameInfo> {
        self.check_index(index)?;
        Ok(self.stream.frames()[index].info())
    }

    pub fn frame_state(&self, index: usize) -> Result<FrameState> {
        self.check_index(index)?;
        Ok(self.stream.frames()[index].state())
    }

    pub fn resident_buffer_count(&self) -> usize {
        resident_buffer_count(self.stream.frames())
    }

    pub fn memory_limits(&self) -> MemoryLimits {
        self.cache.limits()
    }

    /// Faults of the whole stream, every frame included.
    pub fn error_state(&self) -> ErrorState {
        self.stream.error_state()
    }

    pub fn frame_error_state(&self, index: usize) -> Result<ErrorState> {
        self.check_index(index)?;
        Ok(self.stream.frames()[index].error_state())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let count = self.frame_count();
        if index >= count {
            return Err(GifError::FrameOutOfRange { index, count });
        }
        Ok(())
    }

    /// Composited RGBA pixels of frame `index`, `width * height * 4` bytes in
    /// row-major order.
    ///
    /// When the keyframe reach is too short to find a clean base the buffer
    /// is still returned and [`FrameState::requires_redraw`] is set.
    pub fn get_frame(&mut self, index: usize) -> Result<&[u8]> {
        self.check_index(index)?;
        if self.compositor.buffer_len() == 0 {
            let screen = self.stream.screen();
            return Err(GifError::EmptyCanvas {
                width: screen.screen_width,
                height: screen.screen_height,
            });
        }

        let pixels = self.cache.render(&mut self.stream, &self.compositor, index);
        debug_assert_eq!(pixels.len(), self.compositor.buffer_len());
        Ok(pixels)
    }

    /// Replaces the memory limits. `max_keyframe_reach` of zero means no limit.
    pub fn set_memory_limits(
        &mut self,
        buffer_bytes: usize,
        keyframe_bytes: usize,
        max_keyframe_reach: usize,
    ) {
        let limits = MemoryLimits::new(buffer_bytes, keyframe_bytes, max_keyframe_reach);
        self.cache.configure(limits, &mut self.stream.frames);
    }

    /// Changes how restore-to-background disposals are painted. Resident
    /// buffers were painted with the old fill, so all of them are dropped.
    pub fn set_background_fill(&mut self, background_fill: BackgroundFill) {
        self.compositor.set_background_fill(background_fill);
        self.unload();
    }

    /// Drops every composited buffer. The catalogue is kept.
    pub fn unload(&mut self) {
        debug!("unloading {} buffers", self.resident_buffer_count());
        self.cache.unload_all(&mut self.stream.frames);
    }
}
