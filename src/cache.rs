use std::collections::VecDeque;

use log::{debug, trace};

use crate::compositor::Compositor;
use crate::config::MemoryLimits;
use crate::frame::{base_source, BaseSource, Frame};
use crate::parser::StreamDecoder;

/// Keyframes are never spaced closer than this.
pub const MIN_KEYFRAME_INTERVAL: usize = 10;

/// Non-keyframe buffers kept resident no matter how small the budget.
pub const MIN_QUEUE_CAPACITY: usize = 2;

/// Decides which composited buffers stay resident and rebuilds the missing
/// ones by replaying frames forward from the nearest clean buffer.
///
/// Keyframes hold on to their buffers. Every other buffer lives in an LRU
/// queue bounded by the buffer budget.
#[derive(Debug)]
pub struct KeyframeCache {
    limits: MemoryLimits,
    bytes_per_frame: usize,
    capacity: usize,
    interval: Option<usize>,
    queue: VecDeque<usize>,
}

impl KeyframeCache {
    /// Builds the cache for `frames` and picks its keyframes.
    pub(crate) fn new(limits: MemoryLimits, bytes_per_frame: usize, frames: &mut [Frame]) -> Self {
        let mut cache = Self {
            limits,
            bytes_per_frame,
            capacity: MIN_QUEUE_CAPACITY,
            interval: None,
            queue: VecDeque::new(),
        };
        cache.configure(limits, frames);
        cache
    }

    pub fn limits(&self) -> MemoryLimits {
        self.limits
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Distance between keyframes, `None` when keyframing is disabled.
    pub fn keyframe_interval(&self) -> Option<usize> {
        self.interval
    }

    fn compute_layout(&mut self, limits: MemoryLimits, frame_count: usize) {
        self.limits = limits;
        if self.bytes_per_frame == 0 {
            self.capacity = MIN_QUEUE_CAPACITY;
            self.interval = None;
            return;
        }

        self.capacity = (limits.buffer_bytes / self.bytes_per_frame).max(MIN_QUEUE_CAPACITY);
        let affordable = limits.keyframe_bytes / self.bytes_per_frame;
        self.interval = (affordable > 0)
            .then(|| frame_count.div_ceil(affordable).max(MIN_KEYFRAME_INTERVAL));
    }

    /// Applies new limits: keyframes are re-chosen and the queue is trimmed to
    /// the new capacity.
    pub fn configure(&mut self, limits: MemoryLimits, frames: &mut [Frame]) {
        self.compute_layout(limits, frames.len());

        for frame in frames.iter_mut() {
            frame.keyframe = self
                .interval
                .is_some_and(|interval| frame.index % interval == 0);
        }

        // resident frames that lost keyframe status join the queue
        self.queue.retain(|&index| !frames[index].keyframe);
        for frame in frames.iter() {
            if frame.is_resident() && !frame.keyframe && !self.queue.contains(&frame.index) {
                self.queue.push_back(frame.index);
            }
        }
        while self.queue.len() > self.capacity {
            if let Some(victim) = self.queue.pop_front() {
                trace!("evicting frame {victim} after limit change");
                frames[victim].unload();
            }
        }

        debug!(
            "cache limits {:?}: queue capacity {}, keyframe interval {:?}",
            limits, self.capacity, self.interval
        );
        update_readiness(frames);
    }

    /// Buffers currently held in the LRU queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn touch(&mut self, index: usize) {
        if let Some(position) = self.queue.iter().position(|&queued| queued == index) {
            self.queue.remove(position);
            self.queue.push_back(index);
        }
    }

    fn enqueue(&mut self, frames: &mut [Frame], index: usize, dependency: Option<usize>) {
        self.queue.retain(|&queued| queued != index);
        self.queue.push_back(index);

        while self.queue.len() > self.capacity {
            let Some(position) = self
                .queue
                .iter()
                .position(|&queued| queued != index && Some(queued) != dependency)
            else {
                break;
            };

            if let Some(victim) = self.queue.remove(position) {
                trace!("evicting frame {victim}");
                frames[victim].unload();
            }
        }
    }

    /// Returns the composited pixels of frame `index`, decoding and replaying
    /// as many predecessors as needed.
    ///
    /// `index` must be in range. The returned buffer may be marked
    /// `requires_redraw` when the keyframe reach ran out before a clean base
    /// was found.
    pub fn render<'s>(
        &mut self,
        stream: &'s mut StreamDecoder,
        compositor: &Compositor,
        index: usize,
    ) -> &'s [u8] {
        if stream.frames[index].has_clean_pixels() {
            trace!("frame {index} is resident");
            self.touch(index);
            return stream.frames[index].pixels.as_deref().unwrap_or_default();
        }

        let chain = self.backtrack(stream, index);
        trace!("replaying frames {:?}", chain);
        for &frame_index in chain.iter().rev() {
            self.produce(stream, compositor, frame_index);
        }
        update_readiness(&mut stream.frames);

        stream.frames[index].pixels.as_deref().unwrap_or_default()
    }

    /// Frames to replay, newest first. Ends at the first frame whose base is
    /// available, or where the reach runs out.
    ///
    /// Any clean resident buffer ends the walk, so a ready keyframe always
    /// does. Readiness is reported through `FrameState`, not consulted here.
    fn backtrack(&self, stream: &StreamDecoder, index: usize) -> Vec<usize> {
        let screen = stream.screen();
        let reach = self.limits.reach();
        let mut chain = vec![index];
        let mut current = index;

        while let Some(dependency) = base_source(&stream.frames, &screen, current).dependency() {
            if stream.frames[dependency].has_clean_pixels() {
                break;
            }
            if Some(chain.len() - 1) == reach {
                debug!(
                    "keyframe reach of {} exhausted at frame {current}, frame {index} will need a redraw",
                    chain.len() - 1
                );
                break;
            }
            chain.push(dependency);
            current = dependency;
        }

        chain
    }

    fn produce(&mut self, stream: &mut StreamDecoder, compositor: &Compositor, index: usize) {
        let screen = stream.screen();
        let source = base_source(&stream.frames, &screen, index);
        let base_clean = match source {
            BaseSource::Copy(dependency) | BaseSource::ClearRegion(dependency) => {
                stream.frames[dependency].has_clean_pixels()
            }
            BaseSource::Blank | BaseSource::Background(_) => true,
        };

        let indices = match stream.frames[index].indices.take() {
            Some(indices) => indices,
            None => {
                trace!("decoding image data of frame {index}");
                let decompressed = stream.decode_indices(index);
                stream.frames[index].decode_errors |= decompressed.errors;
                decompressed.indices.into_boxed_slice()
            }
        };

        let composited = compositor.composite(
            &stream.frames,
            index,
            source,
            stream.color_table_for(index),
            &indices,
        );

        let frame = &mut stream.frames[index];
        frame.pixels = Some(composited.pixels.into_boxed_slice());
        frame.requires_redraw = !(base_clean && composited.complete);
        // only a redraw reads the indices again
        frame.indices = frame.requires_redraw.then_some(indices);
        frame.composited |= !frame.requires_redraw;
        frame.decode_errors |= composited.errors;
        let keyframe = frame.keyframe;

        if !keyframe {
            self.enqueue(&mut stream.frames, index, source.dependency());
        }
    }

    /// Drops every buffer. Keyframe choices are kept.
    pub fn unload_all(&mut self, frames: &mut [Frame]) {
        self.queue.clear();
        for frame in frames.iter_mut() {
            frame.unload();
            frame.composited = false;
        }
    }
}

/// A keyframe is ready when its buffer is clean and every frame since the
/// previous ready keyframe has been composited cleanly.
pub(crate) fn update_readiness(frames: &mut [Frame]) {
    let mut run_ok = true;

    for frame in frames.iter_mut() {
        if frame.keyframe {
            frame.keyframe_ready = run_ok && frame.composited && frame.has_clean_pixels();
            run_ok = frame.keyframe_ready || (run_ok && frame.composited);
        } else {
            run_ok &= frame.composited;
        }
    }
}

pub fn resident_buffer_count(frames: &[Frame]) -> usize {
    frames.iter().filter(|frame| frame.is_resident()).count()
}
