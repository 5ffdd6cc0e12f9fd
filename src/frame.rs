use crate::error::{ErrorState, HasErrorState};
use crate::parser::{
    ColorTable, DisposalMethod, GraphicControlExtension, ImageDescriptor, LogicalScreenDescriptor,
};

/// One image of the animation, addressed by its position in the frame arena.
///
/// Descriptor data is filled in by the catalogue pass and never changes.
/// `indices` and `pixels` are populated on demand and dropped on eviction.
#[derive(Debug)]
pub struct Frame {
    pub(crate) index: usize,
    /// Offset of the 0x2c image separator.
    pub(crate) descriptor_offset: usize,
    /// Offset of the LZW minimum code size byte.
    pub(crate) data_offset: usize,
    pub(crate) descriptor: ImageDescriptor,
    pub(crate) local_color_table: Option<ColorTable>,
    pub(crate) control: GraphicControlExtension,
    pub(crate) previous: Option<usize>,
    pub(crate) previous_but_one: Option<usize>,

    pub(crate) indices: Option<Box<[u8]>>,
    pub(crate) pixels: Option<Box<[u8]>>,
    /// The resident pixels were painted onto an incomplete base.
    pub(crate) requires_redraw: bool,
    /// Composited at least once from a complete base. Survives eviction.
    pub(crate) composited: bool,
    pub(crate) keyframe: bool,
    pub(crate) keyframe_ready: bool,
    pub(crate) independent: bool,

    pub(crate) errors: ErrorState,
    pub(crate) decode_errors: ErrorState,
}

impl Frame {
    pub(crate) fn new(
        index: usize,
        descriptor_offset: usize,
        descriptor: ImageDescriptor,
        control: GraphicControlExtension,
    ) -> Self {
        Self {
            index,
            descriptor_offset,
            data_offset: descriptor_offset,
            descriptor,
            local_color_table: None,
            control,
            previous: index.checked_sub(1),
            previous_but_one: index.checked_sub(2),
            indices: None,
            pixels: None,
            requires_redraw: false,
            composited: false,
            keyframe: false,
            keyframe_ready: false,
            independent: false,
            errors: ErrorState::empty(),
            decode_errors: ErrorState::empty(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    pub fn control(&self) -> &GraphicControlExtension {
        &self.control
    }

    pub fn local_color_table(&self) -> Option<&ColorTable> {
        self.local_color_table.as_ref()
    }

    pub fn is_resident(&self) -> bool {
        self.pixels.is_some()
    }

    /// Resident and painted onto a complete base.
    pub fn has_clean_pixels(&self) -> bool {
        self.pixels.is_some() && !self.requires_redraw
    }

    /// Paints every canvas pixel, so whatever lies underneath is irrelevant.
    pub(crate) fn is_opaque_cover(&self, screen: &LogicalScreenDescriptor) -> bool {
        !self.control.transparent_color_flag && self.descriptor.covers(screen)
    }

    pub(crate) fn unload(&mut self) {
        self.indices = None;
        self.pixels = None;
        self.requires_redraw = false;
        self.keyframe_ready = false;
    }

    pub fn info(&self) -> FrameInfo {
        FrameInfo {
            index: self.index,
            left: self.descriptor.left_position,
            top: self.descriptor.top_position,
            width: self.descriptor.width,
            height: self.descriptor.height,
            interlaced: self.descriptor.interlace_flag,
            delay_ms: self.control.delay_ms(),
            disposal_method: self.control.disposal_method,
            transparent_index: self.control.transparent_index(),
            user_input: self.control.user_input_flag,
        }
    }

    pub fn state(&self) -> FrameState {
        FrameState {
            resident: self.is_resident(),
            requires_redraw: self.requires_redraw,
            keyframe: self.keyframe,
            keyframe_ready: self.keyframe_ready,
            independent: self.independent,
            errors: self.error_state(),
        }
    }
}

impl HasErrorState for Frame {
    fn error_state(&self) -> ErrorState {
        self.errors
            | self.decode_errors
            | self.descriptor.error_state()
            | self.local_color_table.error_state()
            | self.control.error_state()
    }
}

/// Descriptor and timing data of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub index: usize,
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub interlaced: bool,
    pub delay_ms: u32,
    pub disposal_method: DisposalMethod,
    pub transparent_index: Option<u8>,
    pub user_input: bool,
}

/// Cache and fault status of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameState {
    pub resident: bool,
    pub requires_redraw: bool,
    pub keyframe: bool,
    pub keyframe_ready: bool,
    pub independent: bool,
    pub errors: ErrorState,
}

/// Where a frame's base image comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BaseSource {
    /// All zero.
    Blank,
    /// The whole canvas in the background colour of the given frame's disposal.
    Background(usize),
    /// An exact copy of the given frame's pixels.
    Copy(usize),
    /// The given frame's pixels with its own region restored to background.
    ClearRegion(usize),
}

impl BaseSource {
    /// The frame whose pixels must be resident to build this base.
    pub(crate) fn dependency(&self) -> Option<usize> {
        match *self {
            BaseSource::Copy(index) | BaseSource::ClearRegion(index) => Some(index),
            BaseSource::Blank | BaseSource::Background(_) => None,
        }
    }
}

pub(crate) fn base_source(
    frames: &[Frame],
    screen: &LogicalScreenDescriptor,
    index: usize,
) -> BaseSource {
    let frame = &frames[index];
    if frame.is_opaque_cover(screen) {
        return BaseSource::Blank;
    }

    let Some(previous) = frame.previous else {
        return BaseSource::Blank;
    };

    let restore_to_background = |index: usize| {
        if frames[index].descriptor.covers(screen) {
            BaseSource::Background(index)
        } else {
            BaseSource::ClearRegion(index)
        }
    };

    match frames[previous].control.disposal_method {
        DisposalMethod::NotSpecified => BaseSource::Blank,
        DisposalMethod::DoNotDispose => BaseSource::Copy(previous),
        DisposalMethod::RestoreToBackground => restore_to_background(previous),
        DisposalMethod::RestoreToPrevious => match frame.previous_but_one {
            Some(previous_but_one) => BaseSource::Copy(previous_but_one),
            None => restore_to_background(previous),
        },
    }
}
