/// Default budget for resident non-keyframe buffers: 64 MiB.
pub const DEFAULT_BUFFER_BYTES: usize = 64 * 1024 * 1024;

/// Default budget for keyframe buffers: 128 MiB.
pub const DEFAULT_KEYFRAME_BYTES: usize = 128 * 1024 * 1024;

/// A reach of zero places no limit on backtracking.
pub const UNLIMITED_REACH: usize = 0;

/// Memory limits for decoded frames, as handed over by the embedding
/// application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimits {
    /// Bytes available for resident non-keyframe buffers.
    pub buffer_bytes: usize,
    /// Bytes available for keyframe buffers. Zero disables keyframes.
    pub keyframe_bytes: usize,
    /// Backward hops allowed when looking for a clean base, zero for no limit.
    pub max_keyframe_reach: usize,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            buffer_bytes: DEFAULT_BUFFER_BYTES,
            keyframe_bytes: DEFAULT_KEYFRAME_BYTES,
            max_keyframe_reach: UNLIMITED_REACH,
        }
    }
}

impl MemoryLimits {
    pub fn new(buffer_bytes: usize, keyframe_bytes: usize, max_keyframe_reach: usize) -> Self {
        Self {
            buffer_bytes,
            keyframe_bytes,
            max_keyframe_reach,
        }
    }

    pub(crate) fn reach(&self) -> Option<usize> {
        (self.max_keyframe_reach != UNLIMITED_REACH).then_some(self.max_keyframe_reach)
    }
}

/// What a restore-to-background disposal paints when the background index
/// is also the disposed frame's transparent index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundFill {
    /// Clear to fully transparent.
    #[default]
    TransparentWhenKeyed,
    /// Always paint the opaque background colour.
    Opaque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Options {
    pub memory: MemoryLimits,
    pub background_fill: BackgroundFill,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory_limits(mut self, memory: MemoryLimits) -> Self {
        self.memory = memory;
        self
    }

    pub fn background_fill(mut self, background_fill: BackgroundFill) -> Self {
        self.background_fill = background_fill;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_reach_is_unlimited() {
        assert_eq!(MemoryLimits::default().reach(), None);
        assert_eq!(MemoryLimits::new(0, 0, 3).reach(), Some(3));
    }

    #[test]
    fn builder_sets_fields() {
        let options = Options::new()
            .memory_limits(MemoryLimits::new(1, 2, 3))
            .background_fill(BackgroundFill::Opaque);

        assert_eq!(options.memory.buffer_bytes, 1);
        assert_eq!(options.memory.keyframe_bytes, 2);
        assert_eq!(options.background_fill, BackgroundFill::Opaque);
    }
}
