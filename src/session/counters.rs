/// Per-session artifact indices.
///
/// Every attempted sequence consumes exactly one index, successful or not,
/// so an index always identifies one attempt and its log file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureCounters {
    picture: u32,
    video: u32,
}

impl CaptureCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next still sequence will use.
    #[inline]
    pub fn picture(&self) -> u32 {
        self.picture
    }

    /// Index the next video sequence will use.
    #[inline]
    pub fn video(&self) -> u32 {
        self.video
    }

    /// Consumes the current picture index.
    pub fn advance_picture(&mut self) -> u32 {
        let used = self.picture;
        self.picture += 1;
        used
    }

    /// Consumes the current video index.
    pub fn advance_video(&mut self) -> u32 {
        let used = self.video;
        self.video += 1;
        used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_independent() {
        let mut counters = CaptureCounters::new();
        assert_eq!(counters.advance_picture(), 0);
        assert_eq!(counters.advance_picture(), 1);
        assert_eq!(counters.advance_video(), 0);

        assert_eq!(counters.picture(), 2);
        assert_eq!(counters.video(), 1);
    }
}
