// SPDX-License-Identifier: GPL-3.0-only

//! MJPEG encoder sink
//!
//! Writes captured frames as JPEG chunks into an AVI container. The
//! header is written with placeholder sizes on open; `finalize` appends
//! the index and patches the header so the file is a valid container even
//! for short or early-stopped recordings.

use crate::errors::RecordingError;
use crate::media;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;

/// Encoder sink owned by the active recording session
pub struct MjpegSink {
    writer: BufWriter<File>,
    path: PathBuf,
    width: u32,
    height: u32,
    quality: u8,
    frames: u32,
    /// (offset within movi list, chunk length) per frame
    index: Vec<(u32, u32)>,
    /// Next chunk offset, measured from the `movi` fourcc
    movi_offset: u32,
    riff_size_pos: u64,
    total_frames_pos: u64,
    stream_length_pos: u64,
    movi_size_pos: u64,
}

impl MjpegSink {
    /// Open the container at `path` and write its header
    pub fn open(
        path: &Path,
        width: u32,
        height: u32,
        frame_rate: u32,
        quality: u8,
    ) -> Result<Self, RecordingError> {
        let file = File::create(path)
            .map_err(|e| RecordingError::EncoderOpen(format!("{}: {}", path.display(), e)))?;

        let mut sink = Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            width,
            height,
            quality,
            frames: 0,
            index: Vec::new(),
            movi_offset: 4,
            riff_size_pos: 0,
            total_frames_pos: 0,
            stream_length_pos: 0,
            movi_size_pos: 0,
        };

        sink.write_header(frame_rate.max(1))
            .map_err(|e| RecordingError::EncoderOpen(format!("{}: {}", path.display(), e)))?;

        info!(
            path = %path.display(),
            width,
            height,
            fps = frame_rate,
            "Encoder sink opened"
        );
        Ok(sink)
    }

    /// Encode one RGB frame as JPEG and append it to the container
    pub fn write_frame(&mut self, rgb: &[u8]) -> Result<(), RecordingError> {
        let jpeg = media::encode_jpeg(rgb, self.width, self.height, self.quality)
            .map_err(RecordingError::EncoderWrite)?;

        let len = jpeg.len() as u32;
        self.write_chunk(&jpeg)
            .map_err(|e| RecordingError::EncoderWrite(e.to_string()))?;

        let padded = len + len % 2;
        self.index.push((self.movi_offset, len));
        self.movi_offset += 8 + padded;
        self.frames += 1;
        Ok(())
    }

    /// Flush, append the frame index, and patch the container sizes
    pub fn finalize(mut self) -> Result<PathBuf, RecordingError> {
        self.write_trailer()
            .map_err(|e| RecordingError::EncoderWrite(format!("finalize: {}", e)))?;

        debug!(
            path = %self.path.display(),
            frames = self.frames,
            "Encoder sink finalized"
        );
        Ok(self.path)
    }

    fn write_trailer(&mut self) -> std::io::Result<()> {
        // idx1
        self.fourcc(b"idx1")?;
        self.u32(16 * self.index.len() as u32)?;
        let entries = std::mem::take(&mut self.index);
        for (offset, len) in entries {
            self.fourcc(b"00dc")?;
            self.u32(AVIIF_KEYFRAME)?;
            self.u32(offset)?;
            self.u32(len)?;
        }

        let end = self.writer.stream_position()?;

        self.patch(self.riff_size_pos, end as u32 - 8)?;
        self.patch(self.movi_size_pos, self.movi_offset)?;
        self.patch(self.total_frames_pos, self.frames)?;
        self.patch(self.stream_length_pos, self.frames)?;

        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    fn write_header(&mut self, fps: u32) -> std::io::Result<()> {
        let frame_bytes = self.width * self.height * 3;

        self.fourcc(b"RIFF")?;
        self.riff_size_pos = self.writer.stream_position()?;
        self.u32(0)?; // patched on finalize
        self.fourcc(b"AVI ")?;

        // hdrl list: avih (8 + 56) + strl list (8 + 116)
        self.fourcc(b"LIST")?;
        self.u32(192)?;
        self.fourcc(b"hdrl")?;

        self.fourcc(b"avih")?;
        self.u32(56)?;
        self.u32(1_000_000 / fps)?; // microseconds per frame
        self.u32(frame_bytes.saturating_mul(fps))?;
        self.u32(0)?; // padding granularity
        self.u32(AVIF_HASINDEX)?;
        self.total_frames_pos = self.writer.stream_position()?;
        self.u32(0)?; // patched on finalize
        self.u32(0)?; // initial frames
        self.u32(1)?; // stream count
        self.u32(frame_bytes)?;
        self.u32(self.width)?;
        self.u32(self.height)?;
        for _ in 0..4 {
            self.u32(0)?;
        }

        // strl list: strh (8 + 56) + strf (8 + 40)
        self.fourcc(b"LIST")?;
        self.u32(116)?;
        self.fourcc(b"strl")?;

        self.fourcc(b"strh")?;
        self.u32(56)?;
        self.fourcc(b"vids")?;
        self.fourcc(b"MJPG")?;
        self.u32(0)?; // flags
        self.u16(0)?; // priority
        self.u16(0)?; // language
        self.u32(0)?; // initial frames
        self.u32(1)?; // scale
        self.u32(fps)?; // rate
        self.u32(0)?; // start
        self.stream_length_pos = self.writer.stream_position()?;
        self.u32(0)?; // patched on finalize
        self.u32(frame_bytes)?;
        self.u32(u32::MAX)?; // quality: driver default
        self.u32(0)?; // sample size
        self.u16(0)?;
        self.u16(0)?;
        self.u16(self.width as u16)?;
        self.u16(self.height as u16)?;

        self.fourcc(b"strf")?;
        self.u32(40)?;
        self.u32(40)?; // BITMAPINFOHEADER size
        self.u32(self.width)?;
        self.u32(self.height)?;
        self.u16(1)?; // planes
        self.u16(24)?; // bits per pixel
        self.fourcc(b"MJPG")?;
        self.u32(frame_bytes)?;
        for _ in 0..4 {
            self.u32(0)?;
        }

        // movi list, filled by write_frame
        self.fourcc(b"LIST")?;
        self.movi_size_pos = self.writer.stream_position()?;
        self.u32(0)?; // patched on finalize
        self.fourcc(b"movi")
    }

    fn write_chunk(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.fourcc(b"00dc")?;
        self.u32(data.len() as u32)?;
        self.writer.write_all(data)?;
        if data.len() % 2 == 1 {
            self.writer.write_all(&[0])?;
        }
        Ok(())
    }

    fn patch(&mut self, pos: u64, value: u32) -> std::io::Result<()> {
        self.writer.seek(SeekFrom::Start(pos))?;
        self.u32(value)
    }

    fn fourcc(&mut self, tag: &[u8; 4]) -> std::io::Result<()> {
        self.writer.write_all(tag)
    }

    fn u32(&mut self, value: u32) -> std::io::Result<()> {
        self.writer.write_all(&value.to_le_bytes())
    }

    fn u16(&mut self, value: u16) -> std::io::Result<()> {
        self.writer.write_all(&value.to_le_bytes())
    }
}
