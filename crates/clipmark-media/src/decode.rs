// crates/clipmark-media/src/decode.rs
//
// FfmpegSource: stateful sequential decoder for one video file.
// FfmpegOpener: the production SourceOpener handed to ClipLoader.
//
// Frames are addressed by index at the stream's average frame rate. A decoded
// frame's index is recovered from its PTS, so after a keyframe-aligned seek
// the pre-roll frames are recognised and dropped without scaling them. The
// recovered index travels with each frame so the loader can reject gaps.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::{input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::error::EAGAIN;

use clipmark_core::media_types::Frame;

use crate::helpers::seek::seek_to_frame;
use crate::source::{FrameSource, SourceOpener};

// ── Opener ────────────────────────────────────────────────────────────────────

/// Opens files with FFmpeg, downscaling anything wider than `max_width`.
/// `ffmpeg_the_third::init()` must have run before the first open.
#[derive(Clone, Copy, Debug)]
pub struct FfmpegOpener {
    pub max_width: u32,
}

impl SourceOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegSource::open(path, self.max_width)?))
    }
}

// ── Source ────────────────────────────────────────────────────────────────────

pub struct FfmpegSource {
    path:        PathBuf,
    ictx:        ffmpeg::format::context::Input,
    decoder:     ffmpeg::decoder::video::Video,
    video_idx:   usize,
    fps:         f64,
    /// Seconds per PTS tick.
    tb:          f64,
    start_pts:   i64,
    frame_count: u64,
    /// Frames with a lower index are decoded and discarded (seek pre-roll).
    skip_until:  u64,
    last_index:  Option<u64>,
    /// EOF has been sent to the decoder; only buffered frames remain.
    draining:    bool,
    out_w:       u32,
    out_h:       u32,
    scaler:      SwsContext,
}

impl FfmpegSource {
    pub fn open(path: &Path, max_width: u32) -> Result<Self> {
        let ictx = input(path).with_context(|| format!("open {}", path.display()))?;
        let container_secs = ictx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;

        let (video_idx, fps, tb, start_pts, nb_frames) = {
            let stream = ictx.streams().best(Type::Video)
                .ok_or_else(|| anyhow!("no video stream"))?;
            let mut fps = f64::from(stream.avg_frame_rate());
            if !fps.is_finite() || fps <= 0.0 {
                fps = f64::from(stream.rate());
            }
            if !fps.is_finite() || fps <= 0.0 {
                return Err(anyhow!("unknown frame rate"));
            }
            let start = stream.start_time();
            let start = if start == ffmpeg::ffi::AV_NOPTS_VALUE { 0 } else { start };
            (stream.index(), fps, f64::from(stream.time_base()), start, stream.frames())
        };

        // Container header count when present, otherwise estimated from duration.
        let frame_count = if nb_frames > 0 {
            nb_frames as u64
        } else {
            (container_secs.max(0.0) * fps).round() as u64
        };

        // Second context for decoder params (avoids borrow conflict with ictx).
        let ictx2   = input(path)?;
        let stream2 = ictx2.stream(video_idx).ok_or_else(|| anyhow!("stream gone"))?;
        let dec_ctx = ffmpeg::codec::context::Context::from_parameters(stream2.parameters())?;
        let decoder = dec_ctx.decoder().video()?;

        let (out_w, out_h) = fit_width(decoder.width(), decoder.height(), max_width);
        let scaler = SwsContext::get(
            decoder.format(), decoder.width(), decoder.height(),
            Pixel::RGB24, out_w, out_h, Flags::BILINEAR,
        )?;

        debug!(
            "[decode] opened {}: {frame_count} frames @ {fps:.3} fps, {}x{} → {out_w}x{out_h}",
            path.display(), decoder.width(), decoder.height(),
        );

        Ok(Self {
            path: path.to_path_buf(), ictx, decoder, video_idx, fps, tb, start_pts,
            frame_count, skip_until: 0, last_index: None, draining: false,
            out_w, out_h, scaler,
        })
    }

    fn pts_to_index(&self, pts: Option<i64>) -> u64 {
        match pts {
            Some(pts) => {
                let secs = (pts - self.start_pts) as f64 * self.tb;
                (secs * self.fps).round().max(0.0) as u64
            }
            None => self.last_index.map_or(0, |i| i + 1),
        }
    }

    /// Next packet belonging to the video stream, or None at EOF.
    fn next_video_packet(&mut self) -> Result<Option<ffmpeg::Packet>> {
        let idx  = self.video_idx;
        let path = &self.path;
        for result in self.ictx.packets() {
            let (stream, packet) = result
                .with_context(|| format!("read packet from {}", path.display()))?;
            if stream.index() == idx {
                return Ok(Some(packet));
            }
        }
        Ok(None)
    }

    /// Scale to RGB24 and copy out without the per-row stride padding.
    fn to_rgb(&mut self, decoded: &ffmpeg::util::frame::video::Video) -> Result<Frame> {
        let mut out = ffmpeg::util::frame::video::Video::empty();
        self.scaler.run(decoded, &mut out)?;
        let stride    = out.stride(0);
        let row_bytes = self.out_w as usize * 3;
        let raw       = out.data(0);
        let data: Vec<u8> = (0..self.out_h as usize)
            .flat_map(|row| {
                let s = row * stride;
                &raw[s..s + row_bytes]
            })
            .copied()
            .collect();
        Ok(Frame { width: self.out_w, height: self.out_h, data })
    }
}

impl FrameSource for FfmpegSource {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn seek(&mut self, index: u64) -> Result<()> {
        seek_to_frame(&mut self.ictx, index, self.fps, &self.path.display().to_string());
        self.decoder.flush();
        self.skip_until = index;
        self.last_index = None;
        self.draining   = false;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<(u64, Frame)>> {
        let mut decoded = ffmpeg::util::frame::video::Video::empty();
        loop {
            // Drain whatever the decoder already holds before feeding it more.
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    let index = self.pts_to_index(decoded.pts());
                    self.last_index = Some(index);
                    if index < self.skip_until {
                        continue;
                    }
                    return self.to_rgb(&decoded).map(|frame| Some((index, frame)));
                }
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(ffmpeg::Error::Other { errno }) if errno == EAGAIN => {}
                Err(e) => return Err(anyhow!("decode after frame {:?}: {e}", self.last_index)),
            }
            if self.draining {
                return Ok(None);
            }
            match self.next_video_packet()? {
                Some(packet) => self.decoder.send_packet(&packet)
                    .with_context(|| format!("bad packet after frame {:?}", self.last_index))?,
                None => {
                    self.decoder.send_eof()?;
                    self.draining = true;
                }
            }
        }
    }
}

/// Output size: native if it fits in `max_width`, otherwise scaled down with
/// the aspect ratio kept. Both dimensions are even and at least 2.
fn fit_width(w: u32, h: u32, max_width: u32) -> (u32, u32) {
    let (w, h) = (w.max(2), h.max(2));
    if max_width == 0 || w <= max_width {
        return (w & !1, h & !1);
    }
    let out_h = ((h as u64 * max_width as u64 / w as u64) as u32).max(2) & !1;
    ((max_width & !1).max(2), out_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_width_keeps_native_when_small() {
        assert_eq!(fit_width(320, 240, 640), (320, 240));
        assert_eq!(fit_width(321, 241, 640), (320, 240));
    }

    #[test]
    fn fit_width_scales_down_keeping_aspect() {
        assert_eq!(fit_width(1920, 1080, 640), (640, 360));
        assert_eq!(fit_width(1280, 1024, 640), (640, 512));
    }

    #[test]
    fn fit_width_zero_means_unbounded() {
        assert_eq!(fit_width(3840, 2160, 0), (3840, 2160));
    }
}
