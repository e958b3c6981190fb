// crates/clipmark-core/src/playback.rs
//
// PlaybackScheduler: loops a DecodedClip at a fixed nominal rate.
//
// Driven by the event loop: tick(now) advances the cursor by however many
// whole frame intervals have elapsed (so a late tick skips frames instead of
// slowing the clip down) and wraps to 0 after the last frame. Dropping the
// scheduler stops playback and releases the frames.

use std::time::{Duration, Instant};

use crate::media_types::{DecodedClip, Frame};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The cursor moved to this frame.
    FrameReady(usize),
    /// The cursor wrapped past the last frame; it is now at this index.
    Looped(usize),
}

#[derive(Debug)]
pub struct PlaybackScheduler {
    clip:     DecodedClip,
    cursor:   usize,
    interval: Duration,
    next_due: Instant,
}

impl PlaybackScheduler {
    /// Begin at frame 0. The first advance happens one interval after `now`.
    pub fn start(clip: DecodedClip, interval: Duration, now: Instant) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        Self { clip, cursor: 0, interval, next_due: now + interval }
    }

    pub fn clip(&self) -> &DecodedClip { &self.clip }
    pub fn cursor(&self) -> usize { self.cursor }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.clip.frames.get(self.cursor)
    }

    /// Time left before the next advance (zero when overdue).
    pub fn time_until_next(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    pub fn tick(&mut self, now: Instant) -> Option<PlaybackEvent> {
        let len = self.clip.frames.len();
        if len == 0 || now < self.next_due {
            return None;
        }
        let late  = now.duration_since(self.next_due).as_nanos();
        let steps = 1 + (late / self.interval.as_nanos()) as usize;
        // Stay on the original grid so rounding never drifts the rate.
        self.next_due += self.interval * steps as u32;

        let advanced = self.cursor + steps;
        self.cursor  = advanced % len;
        Some(if advanced >= len {
            PlaybackEvent::Looped(self.cursor)
        } else {
            PlaybackEvent::FrameReady(self.cursor)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::ClipRef;

    fn decoded(n: u64) -> DecodedClip {
        DecodedClip {
            clip:   ClipRef::new("a.mp4", 0, n).unwrap(),
            frames: (0..n).map(|i| Frame { width: 1, height: 1, data: vec![i as u8; 3] }).collect(),
        }
    }

    const IV: Duration = Duration::from_millis(10);

    #[test]
    fn starts_at_zero_and_waits_one_interval() {
        let t0 = Instant::now();
        let mut p = PlaybackScheduler::start(decoded(3), IV, t0);
        assert_eq!(p.cursor(), 0);
        assert_eq!(p.tick(t0 + Duration::from_millis(9)), None);
        assert_eq!(p.tick(t0 + IV), Some(PlaybackEvent::FrameReady(1)));
    }

    #[test]
    fn loops_back_to_zero() {
        let t0 = Instant::now();
        let mut p = PlaybackScheduler::start(decoded(3), IV, t0);
        assert_eq!(p.tick(t0 + IV), Some(PlaybackEvent::FrameReady(1)));
        assert_eq!(p.tick(t0 + IV * 2), Some(PlaybackEvent::FrameReady(2)));
        assert_eq!(p.tick(t0 + IV * 3), Some(PlaybackEvent::Looped(0)));
        assert_eq!(p.current_frame().unwrap().data[0], 0);
    }

    #[test]
    fn late_tick_skips_frames() {
        let t0 = Instant::now();
        let mut p = PlaybackScheduler::start(decoded(10), IV, t0);
        assert_eq!(p.tick(t0 + Duration::from_millis(35)), Some(PlaybackEvent::FrameReady(3)));
        // Next due stays on the 10 ms grid.
        assert_eq!(p.time_until_next(t0 + Duration::from_millis(35)), Duration::from_millis(5));
    }

    #[test]
    fn single_frame_clip_loops_every_tick() {
        let t0 = Instant::now();
        let mut p = PlaybackScheduler::start(decoded(1), IV, t0);
        assert_eq!(p.tick(t0 + IV), Some(PlaybackEvent::Looped(0)));
    }
}
