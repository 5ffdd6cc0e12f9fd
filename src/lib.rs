//! Memory-bounded GIF animation decoding.
//!
//! A [`GifAnimation`] catalogues every frame of a GIF87a/89a stream up front
//! without decoding image data. Frames are decompressed and composited into
//! RGBA8 buffers on request, in any order. A keyframe cache keeps a bounded
//! set of buffers resident and replays frames forward from the nearest clean
//! buffer when a frame has to be rebuilt.

pub mod animation;
pub mod cache;
pub mod compositor;
pub mod config;
pub mod error;
pub mod frame;
pub mod parser;

pub use animation::GifAnimation;
pub use config::{BackgroundFill, MemoryLimits, Options};
pub use error::{ErrorState, GifError, HasErrorState};
pub use frame::{FrameInfo, FrameState};
pub use parser::{DisposalMethod, LoopCount, Version};
