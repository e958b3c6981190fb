// crates/clipmark-media/src/helpers/seek.rs
//
// Frame-index seek over avformat with soft-fail behaviour.
//
// All seeks route through here. A failed seek is not fatal: the demuxer keeps
// decoding from wherever it is and the caller's index filter discards frames
// before the target. Whether that is acceptable is the call site's decision.

use ffmpeg_the_third as ffmpeg;
use tracing::warn;

/// Seek `ictx` to the keyframe at or before frame `index` (at `fps`).
///
/// Returns `true` if the seek succeeded or was skipped because `index` is 0
/// (a fresh context already sits at the start, and some demuxers reject a
/// seek with `max_ts = 0`). Returns `false` on failure, after logging.
///
/// Always a backward seek (`..=ts`): landing on the keyframe after the target
/// would drop every frame between the two.
pub fn seek_to_frame(
    ictx:  &mut ffmpeg::format::context::Input,
    index: u64,
    fps:   f64,
    label: &str,   // caller description for log messages
) -> bool {
    if index == 0 || fps <= 0.0 {
        return true;
    }

    let ts = frame_to_av_ts(index, fps);
    match ictx.seek(ts, ..=ts) {
        Ok(()) => true,
        Err(e) => {
            warn!("[seek] soft-fail in {label} at frame {index}: {e}; decoding from current position");
            false
        }
    }
}

/// Frame index → `AV_TIME_BASE` timestamp.
pub fn frame_to_av_ts(index: u64, fps: f64) -> i64 {
    (index as f64 / fps * ffmpeg::ffi::AV_TIME_BASE as f64) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn av_ts_is_microseconds() {
        assert_eq!(frame_to_av_ts(0, 30.0), 0);
        assert_eq!(frame_to_av_ts(30, 30.0), 1_000_000);
        assert_eq!(frame_to_av_ts(25, 50.0), 500_000);
    }
}
