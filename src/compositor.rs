use log::{trace, warn};

use crate::config::BackgroundFill;
use crate::error::ErrorState;
use crate::frame::{BaseSource, Frame};
use crate::parser::{ColorTable, ImageDescriptor, LogicalScreenDescriptor, Rgba};

/// Composited frames are 32bit RGBA
pub const N_CHANNELS: usize = 4;

const TRANSPARENT: Rgba = [0, 0, 0, 0];
const OPAQUE_BLACK: Rgba = [0, 0, 0, 0xff];

/// Result of painting one frame onto its base image.
#[derive(Debug)]
pub struct Composited {
    pub pixels: Vec<u8>,
    /// The base image came from the frame's real predecessor state.
    pub complete: bool,
    pub errors: ErrorState,
}

/// Destination rows in the order interlaced source rows arrive.
pub fn interlaced_rows(height: usize) -> impl Iterator<Item = usize> {
    (0..height)
        .step_by(8)
        .chain((4..height).step_by(8))
        .chain((2..height).step_by(4))
        .chain((1..height).step_by(2))
}

/// Paints frames onto screen-sized RGBA canvases.
#[derive(Debug, Clone)]
pub struct Compositor {
    width: usize,
    height: usize,
    background_index: u8,
    background_color: Option<Rgba>,
    background_fill: BackgroundFill,
}

impl Compositor {
    pub fn new(
        screen: &LogicalScreenDescriptor,
        global_color_table: Option<&ColorTable>,
        background_fill: BackgroundFill,
    ) -> Self {
        let background_index = screen.background_color_index;
        Self {
            width: screen.screen_width as usize,
            height: screen.screen_height as usize,
            background_index,
            background_color: global_color_table.and_then(|table| table.get(background_index)),
            background_fill,
        }
    }

    pub fn set_background_fill(&mut self, background_fill: BackgroundFill) {
        self.background_fill = background_fill;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn buffer_len(&self) -> usize {
        self.width * self.height * N_CHANNELS
    }

    pub fn blank(&self) -> Vec<u8> {
        vec![0; self.buffer_len()]
    }

    /// The colour a restore-to-background disposal of `disposed` leaves behind.
    pub fn background_for(&self, disposed: &Frame) -> Rgba {
        let keyed = disposed.control.transparent_index() == Some(self.background_index);
        if keyed && self.background_fill == BackgroundFill::TransparentWhenKeyed {
            return TRANSPARENT;
        }
        self.background_color.unwrap_or(TRANSPARENT)
    }

    /// Builds the canvas a frame is painted onto. The flag is false when the
    /// source needed pixels that are not resident and a blank canvas stands in.
    pub(crate) fn base_image(&self, source: BaseSource, frames: &[Frame]) -> (Vec<u8>, bool) {
        match source {
            BaseSource::Blank => (self.blank(), true),
            BaseSource::Background(disposed) => {
                let color = self.background_for(&frames[disposed]);
                let mut canvas = Vec::with_capacity(self.buffer_len());
                for _ in 0..self.width * self.height {
                    canvas.extend_from_slice(&color);
                }
                (canvas, true)
            }
            BaseSource::Copy(previous) => match &frames[previous].pixels {
                Some(pixels) => (pixels.to_vec(), true),
                None => (self.blank(), false),
            },
            BaseSource::ClearRegion(disposed) => {
                let frame = &frames[disposed];
                match &frame.pixels {
                    Some(pixels) => {
                        let mut canvas = pixels.to_vec();
                        self.fill_region(&mut canvas, &frame.descriptor, self.background_for(frame));
                        (canvas, true)
                    }
                    None => (self.blank(), false),
                }
            }
        }
    }

    fn fill_region(&self, canvas: &mut [u8], region: &ImageDescriptor, color: Rgba) {
        let left = (region.left_position as usize).min(self.width);
        let right = (left + region.width as usize).min(self.width);
        let top = (region.top_position as usize).min(self.height);
        let bottom = (top + region.height as usize).min(self.height);

        for y in top..bottom {
            let row = &mut canvas[(y * self.width + left) * N_CHANNELS..(y * self.width + right) * N_CHANNELS];
            for pixel in row.chunks_exact_mut(N_CHANNELS) {
                pixel.copy_from_slice(&color);
            }
        }
    }

    /// Paints a frame's indices onto `canvas` at the frame's position.
    pub fn paint(
        &self,
        canvas: &mut [u8],
        frame: &Frame,
        color_table: Option<&ColorTable>,
        indices: &[u8],
    ) -> ErrorState {
        let descriptor = &frame.descriptor;
        let left = descriptor.left_position as usize;
        let top = descriptor.top_position as usize;
        let width = descriptor.width as usize;
        let height = descriptor.height as usize;
        let transparent = frame.control.transparent_index();

        let mut errors = ErrorState::empty();
        if color_table.is_none() {
            errors |= ErrorState::FRAME_HAS_NO_COLOR_TABLE;
        }

        let rows: Vec<usize> = if descriptor.interlace_flag {
            interlaced_rows(height).collect()
        } else {
            (0..height).collect()
        };

        for (source_row, destination_row) in rows.into_iter().enumerate() {
            let y = top + destination_row;
            if y >= self.height {
                continue;
            }

            let Some(source) = indices.get(source_row * width..(source_row + 1) * width) else {
                break;
            };

            for (column, &index) in source.iter().enumerate() {
                let x = left + column;
                if x >= self.width {
                    break;
                }
                if Some(index) == transparent {
                    continue;
                }

                let color = match color_table {
                    Some(table) => table.get(index).unwrap_or_else(|| {
                        errors |= ErrorState::BAD_COLOR_INDEX;
                        OPAQUE_BLACK
                    }),
                    None => OPAQUE_BLACK,
                };

                let offset = (y * self.width + x) * N_CHANNELS;
                canvas[offset..offset + N_CHANNELS].copy_from_slice(&color);
            }
        }

        if errors.contains(ErrorState::BAD_COLOR_INDEX) {
            warn!("frame {} uses colour indices past its table", frame.index);
        }
        errors
    }

    /// Produces a frame's final pixels from its base source and indices.
    pub(crate) fn composite(
        &self,
        frames: &[Frame],
        index: usize,
        source: BaseSource,
        color_table: Option<&ColorTable>,
        indices: &[u8],
    ) -> Composited {
        trace!("compositing frame {index} onto {:?}", source);
        let (mut pixels, complete) = self.base_image(source, frames);
        let errors = self.paint(&mut pixels, &frames[index], color_table, indices);

        Composited {
            pixels,
            complete,
            errors,
        }
    }
}
