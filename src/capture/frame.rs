//! Frame type representing a captured image with metadata.

/// A single captured frame from the camera.
///
/// Pixels are tightly packed RGB, 8 bits per channel.
#[derive(Clone)]
pub struct Frame {
    /// Raw pixel data.
    pixels: Vec<u8>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Monotonic sequence number assigned by the camera.
    sequence: u64,
}

impl Frame {
    /// Bytes per pixel.
    pub const CHANNELS: usize = 3;

    /// Creates a new RGB frame.
    pub fn rgb(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            sequence,
        }
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `(width, height)`.
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// True when the grab produced no image data.
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty() || self.width == 0 || self.height == 0
    }

    /// Validates that the pixel buffer size matches the geometry.
    pub fn is_valid(&self) -> bool {
        let expected =
            (self.width as usize) * (self.height as usize) * Self::CHANNELS;
        !self.is_empty() && self.pixels.len() == expected
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = Frame::rgb(vec![0u8; 8 * 6 * 3], 8, 6, 1);

        assert_eq!(frame.size(), (8, 6));
        assert_eq!(frame.sequence(), 1);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_frame_invalid_size() {
        let frame = Frame::rgb(vec![0u8; 10], 8, 6, 1);
        assert!(!frame.is_valid());
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_empty_frame() {
        let frame = Frame::rgb(Vec::new(), 0, 0, 0);
        assert!(frame.is_empty());
        assert!(!frame.is_valid());
    }
}
