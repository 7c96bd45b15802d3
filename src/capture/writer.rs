//! Still-image encoding and video container writing.

use super::Frame;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension of still images.
pub const STILL_EXTENSION: &str = "jpg";

/// Errors that can occur while encoding or writing captures.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("video writer is not open")]
    NotOpen,
    #[error("frame {got_w}x{got_h} does not match stream geometry {want_w}x{want_h}")]
    GeometryMismatch {
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },
    #[error("frame buffer does not match its geometry")]
    InvalidFrame,
    #[error("AVI container exceeds 4 GiB")]
    ContainerFull,
    #[error("encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Video codecs the rig can record with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// Motion JPEG: every frame is an independent JPEG image.
    Mjpeg,
}

impl VideoCodec {
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            VideoCodec::Mjpeg => *b"MJPG",
        }
    }

    /// File extension of the container written for this codec.
    pub fn extension(self) -> &'static str {
        match self {
            VideoCodec::Mjpeg => "avi",
        }
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.fourcc()))
    }
}

/// Encodes an RGB frame as JPEG.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, WriterError> {
    if !frame.is_valid() {
        return Err(WriterError::InvalidFrame);
    }
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder.encode(
        frame.pixels(),
        frame.width(),
        frame.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buffer)
}

/// Encodes `frame` and writes it to `path`.
pub fn save_still(frame: &Frame, path: &Path, quality: u8) -> Result<(), WriterError> {
    let jpeg = encode_jpeg(frame, quality)?;
    std::fs::write(path, jpeg).map_err(|source| WriterError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Trait for video container writers.
pub trait VideoWriter {
    /// Creates the output file for a stream of `size` frames at `fps`.
    fn open(
        &mut self,
        path: &Path,
        codec: VideoCodec,
        fps: f64,
        size: (u32, u32),
    ) -> Result<(), WriterError>;

    /// Appends one frame.
    fn write(&mut self, frame: &Frame) -> Result<(), WriterError>;

    fn is_open(&self) -> bool;

    /// Finalizes the container and closes the output file.
    fn release(&mut self) -> Result<(), WriterError>;
}

// RIFF/AVI layout. Offsets are absolute file positions of the fields
// patched when the stream is finalized.
const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;
const HEADER_LEN: u64 = 224;
const RIFF_SIZE_AT: u64 = 4;
const MAX_BYTES_PER_SEC_AT: u64 = 36;
const TOTAL_FRAMES_AT: u64 = 48;
const AVIH_BUFFER_AT: u64 = 60;
const STREAM_LENGTH_AT: u64 = 140;
const STRH_BUFFER_AT: u64 = 144;
const MOVI_SIZE_AT: u64 = 216;
/// Position of the `movi` fourcc; index offsets are relative to it.
const MOVI_AT: u64 = 220;

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Builds the RIFF header, `hdrl` list and `movi` list header for a
/// single MJPEG video stream. Frame counts and sizes start at zero.
fn avi_header(codec: VideoCodec, fps: f64, (width, height): (u32, u32)) -> Vec<u8> {
    let us_per_frame = (1_000_000.0 / fps).round() as u32;
    let rate = (fps * 1000.0).round() as u32;
    let fourcc = codec.fourcc();
    let mut h = Vec::with_capacity(HEADER_LEN as usize);

    h.extend_from_slice(b"RIFF");
    put_u32(&mut h, 0);
    h.extend_from_slice(b"AVI ");

    h.extend_from_slice(b"LIST");
    put_u32(&mut h, 192);
    h.extend_from_slice(b"hdrl");

    h.extend_from_slice(b"avih");
    put_u32(&mut h, 56);
    put_u32(&mut h, us_per_frame);
    put_u32(&mut h, 0); // max bytes per second
    put_u32(&mut h, 0); // padding granularity
    put_u32(&mut h, AVIF_HASINDEX);
    put_u32(&mut h, 0); // total frames
    put_u32(&mut h, 0); // initial frames
    put_u32(&mut h, 1); // streams
    put_u32(&mut h, 0); // suggested buffer
    put_u32(&mut h, width);
    put_u32(&mut h, height);
    h.extend_from_slice(&[0u8; 16]);

    h.extend_from_slice(b"LIST");
    put_u32(&mut h, 116);
    h.extend_from_slice(b"strl");

    h.extend_from_slice(b"strh");
    put_u32(&mut h, 56);
    h.extend_from_slice(b"vids");
    h.extend_from_slice(&fourcc);
    put_u32(&mut h, 0); // flags
    put_u16(&mut h, 0); // priority
    put_u16(&mut h, 0); // language
    put_u32(&mut h, 0); // initial frames
    put_u32(&mut h, 1000); // scale
    put_u32(&mut h, rate);
    put_u32(&mut h, 0); // start
    put_u32(&mut h, 0); // length
    put_u32(&mut h, 0); // suggested buffer
    put_u32(&mut h, u32::MAX); // quality: driver default
    put_u32(&mut h, 0); // sample size
    put_u16(&mut h, 0);
    put_u16(&mut h, 0);
    put_u16(&mut h, width.min(u32::from(u16::MAX)) as u16);
    put_u16(&mut h, height.min(u32::from(u16::MAX)) as u16);

    h.extend_from_slice(b"strf");
    put_u32(&mut h, 40);
    put_u32(&mut h, 40);
    put_u32(&mut h, width);
    put_u32(&mut h, height);
    put_u16(&mut h, 1); // planes
    put_u16(&mut h, 24); // bits per pixel
    h.extend_from_slice(&fourcc);
    put_u32(&mut h, width.saturating_mul(height).saturating_mul(3));
    h.extend_from_slice(&[0u8; 16]);

    h.extend_from_slice(b"LIST");
    put_u32(&mut h, 0);
    h.extend_from_slice(b"movi");
    h
}

struct IndexEntry {
    offset: u32,
    len: u32,
}

struct OpenStream {
    out: BufWriter<File>,
    size: (u32, u32),
    fps: f64,
    position: u64,
    index: Vec<IndexEntry>,
    largest: u32,
}

impl OpenStream {
    fn patch(&mut self, at: u64, value: u32) -> std::io::Result<()> {
        self.out.seek(SeekFrom::Start(at))?;
        self.out.write_all(&value.to_le_bytes())
    }

    fn finalize(&mut self) -> Result<(), WriterError> {
        let frames = u32::try_from(self.index.len()).map_err(|_| WriterError::ContainerFull)?;
        let idx1_at = self.position;

        let mut idx1 = Vec::with_capacity(8 + self.index.len() * 16);
        idx1.extend_from_slice(b"idx1");
        put_u32(&mut idx1, frames.saturating_mul(16));
        for entry in &self.index {
            idx1.extend_from_slice(b"00dc");
            put_u32(&mut idx1, AVIIF_KEYFRAME);
            put_u32(&mut idx1, entry.offset);
            put_u32(&mut idx1, entry.len);
        }
        self.out.write_all(&idx1)?;
        let end = idx1_at + idx1.len() as u64;

        let riff_size = u32::try_from(end - 8).map_err(|_| WriterError::ContainerFull)?;
        let movi_size = u32::try_from(idx1_at - MOVI_AT).map_err(|_| WriterError::ContainerFull)?;
        let bytes_per_sec = (f64::from(self.largest) * self.fps).round() as u32;

        self.patch(RIFF_SIZE_AT, riff_size)?;
        self.patch(MAX_BYTES_PER_SEC_AT, bytes_per_sec)?;
        self.patch(TOTAL_FRAMES_AT, frames)?;
        self.patch(AVIH_BUFFER_AT, self.largest)?;
        self.patch(STREAM_LENGTH_AT, frames)?;
        self.patch(STRH_BUFFER_AT, self.largest)?;
        self.patch(MOVI_SIZE_AT, movi_size)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Writes MJPEG frames into an AVI container.
///
/// Every frame is a keyframe `00dc` chunk. The `idx1` index and the frame
/// counts in the headers are written on [`VideoWriter::release`].
pub struct AviWriter {
    quality: u8,
    stream: Option<OpenStream>,
}

impl AviWriter {
    pub fn new(quality: u8) -> Self {
        Self {
            quality,
            stream: None,
        }
    }
}

impl VideoWriter for AviWriter {
    fn open(
        &mut self,
        path: &Path,
        codec: VideoCodec,
        fps: f64,
        size: (u32, u32),
    ) -> Result<(), WriterError> {
        self.release()?;
        let file = File::create(path).map_err(|source| WriterError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut out = BufWriter::new(file);
        out.write_all(&avi_header(codec, fps, size))?;
        tracing::debug!(
            path = %path.display(),
            %codec,
            fps,
            width = size.0,
            height = size.1,
            "Video stream opened"
        );
        self.stream = Some(OpenStream {
            out,
            size,
            fps,
            position: HEADER_LEN,
            index: Vec::new(),
            largest: 0,
        });
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), WriterError> {
        let stream = self.stream.as_mut().ok_or(WriterError::NotOpen)?;
        if frame.size() != stream.size {
            return Err(WriterError::GeometryMismatch {
                got_w: frame.width(),
                got_h: frame.height(),
                want_w: stream.size.0,
                want_h: stream.size.1,
            });
        }
        let jpeg = encode_jpeg(frame, self.quality)?;
        let len = u32::try_from(jpeg.len()).map_err(|_| WriterError::ContainerFull)?;
        let offset =
            u32::try_from(stream.position - MOVI_AT).map_err(|_| WriterError::ContainerFull)?;
        let pad = jpeg.len() % 2;

        stream.out.write_all(b"00dc")?;
        stream.out.write_all(&len.to_le_bytes())?;
        stream.out.write_all(&jpeg)?;
        if pad == 1 {
            stream.out.write_all(&[0])?;
        }
        stream.position += 8 + jpeg.len() as u64 + pad as u64;
        stream.index.push(IndexEntry { offset, len });
        stream.largest = stream.largest.max(len);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn release(&mut self) -> Result<(), WriterError> {
        match self.stream.take() {
            Some(mut stream) => stream.finalize(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: u32, h: u32) -> Frame {
        Frame::rgb(vec![128u8; (w * h * 3) as usize], w, h, 1)
    }

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn test_encode_jpeg_has_markers() {
        let jpeg = encode_jpeg(&frame(8, 6), 90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_rejects_invalid_frame() {
        let bad = Frame::rgb(vec![0u8; 5], 8, 6, 1);
        assert!(matches!(encode_jpeg(&bad, 90), Err(WriterError::InvalidFrame)));
    }

    #[test]
    fn test_header_layout() {
        let header = avi_header(VideoCodec::Mjpeg, 30.0, (8, 6));
        assert_eq!(header.len() as u64, HEADER_LEN);
        assert_eq!(&header[108..116], b"vidsMJPG");
        assert_eq!(&header[164..168], b"strf");
        assert_eq!(&header[MOVI_AT as usize..], b"movi");
    }

    #[test]
    fn test_avi_writer_records_frame_rate_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.avi");
        let mut writer = AviWriter::new(80);

        writer.open(&path, VideoCodec::Mjpeg, 30.0, (8, 6)).unwrap();
        writer.write(&frame(8, 6)).unwrap();
        writer.write(&frame(8, 6)).unwrap();
        writer.release().unwrap();
        assert!(!writer.is_open());

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"AVI ");
        assert_eq!(u32_at(&bytes, 4) as usize, bytes.len() - 8);

        // microseconds per frame, then scale/rate of the video stream
        assert_eq!(u32_at(&bytes, 32), 33_333);
        assert_eq!(u32_at(&bytes, 128), 1000);
        assert_eq!(u32_at(&bytes, 132), 30_000);
        assert_eq!(u32_at(&bytes, 48), 2);
        assert_eq!(u32_at(&bytes, 140), 2);
        assert_eq!((u32_at(&bytes, 64), u32_at(&bytes, 68)), (8, 6));

        let single = encode_jpeg(&frame(8, 6), 80).unwrap();
        assert_eq!(&bytes[224..228], b"00dc");
        assert_eq!(u32_at(&bytes, 228) as usize, single.len());
        assert_eq!(&bytes[232..232 + single.len()], single.as_slice());
        assert_eq!(u32_at(&bytes, 60) as usize, single.len());

        let idx1 = MOVI_AT as usize + u32_at(&bytes, 216) as usize;
        assert_eq!(&bytes[idx1..idx1 + 4], b"idx1");
        assert_eq!(u32_at(&bytes, idx1 + 4), 32);
        assert_eq!(bytes.len(), idx1 + 8 + 32);

        let chunk = 8 + single.len() + single.len() % 2;
        assert_eq!(u32_at(&bytes, idx1 + 8 + 8), 4);
        assert_eq!(u32_at(&bytes, idx1 + 24 + 8) as usize, 4 + chunk);
        assert_eq!(u32_at(&bytes, idx1 + 24 + 12) as usize, single.len());
    }

    #[test]
    fn test_empty_recording_is_still_a_valid_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.avi");
        let mut writer = AviWriter::new(80);
        writer.open(&path, VideoCodec::Mjpeg, 25.0, (8, 6)).unwrap();
        writer.release().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, HEADER_LEN + 8);
        assert_eq!(u32_at(&bytes, 48), 0);
        assert_eq!(u32_at(&bytes, 216), 4);
        assert_eq!(&bytes[224..228], b"idx1");
    }

    #[test]
    fn test_avi_writer_rejects_geometry_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = AviWriter::new(80);
        writer
            .open(&dir.path().join("v.avi"), VideoCodec::Mjpeg, 30.0, (8, 6))
            .unwrap();
        assert!(matches!(
            writer.write(&frame(4, 4)),
            Err(WriterError::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = AviWriter::new(80);
        let result = writer.open(
            &dir.path().join("missing").join("v.avi"),
            VideoCodec::Mjpeg,
            30.0,
            (8, 6),
        );
        assert!(matches!(result, Err(WriterError::Open { .. })));
        assert!(!writer.is_open());
    }

    #[test]
    fn test_write_without_open() {
        let mut writer = AviWriter::new(80);
        assert!(matches!(writer.write(&frame(8, 6)), Err(WriterError::NotOpen)));
    }
}
