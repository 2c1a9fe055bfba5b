//! Animated GIF decoding into a timed frame sequence.
//!
//! GIF stores only per-frame delays (in hundredths of a second), partial
//! frame rectangles and disposal instructions. Decoding composites every
//! frame onto a persistent canvas so each [`Frame`] holds the full image
//! the viewer would see, and converts delays to milliseconds so a timeline
//! can be sampled on the host's tick grid.

use gif::{ColorOutput, DecodeOptions, DisposalMethod, Repeat};
use image::{Rgba, RgbaImage};

/// Shortest duration a frame can occupy. Zero delays are clamped to this.
pub const MIN_FRAME_DURATION_MS: u32 = 10;

/// GIF delay unit in milliseconds.
const DELAY_UNIT_MS: u32 = 10;

/// A decoded, fully composited frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Full-canvas RGBA image.
    pub image: RgbaImage,
    /// Display duration in milliseconds.
    pub duration: u32,
}

/// How many times the animation plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopCount {
    /// Number of passes after the first one. `Finite(0)` plays once.
    Finite(u16),
    /// Loops forever.
    #[default]
    Infinite,
}

impl From<Repeat> for LoopCount {
    fn from(repeat: Repeat) -> Self {
        match repeat {
            Repeat::Finite(n) => LoopCount::Finite(n),
            Repeat::Infinite => LoopCount::Infinite,
        }
    }
}

/// Errors produced while decoding an animated source.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed GIF stream: {0}")]
    Format(#[from] gif::DecodingError),

    #[error("GIF logical screen has zero size")]
    EmptyCanvas,

    #[error("GIF stream contains no image frames")]
    NoFrames,
}

/// Ordered frames with cumulative timing.
#[derive(Debug, Clone)]
pub struct Timeline {
    frames: Vec<Frame>,
    /// Start offset of each frame within one pass.
    starts: Vec<u64>,
    total_duration: u64,
    loop_count: LoopCount,
}

impl Timeline {
    /// Build a timeline from already decoded frames.
    pub fn from_frames(mut frames: Vec<Frame>, loop_count: LoopCount) -> Result<Self, DecodeError> {
        if frames.is_empty() {
            return Err(DecodeError::NoFrames);
        }

        let mut starts = Vec::with_capacity(frames.len());
        let mut total_duration = 0u64;
        for frame in &mut frames {
            frame.duration = frame.duration.max(MIN_FRAME_DURATION_MS);
            starts.push(total_duration);
            total_duration += u64::from(frame.duration);
        }

        Ok(Self {
            frames,
            starts,
            total_duration,
            loop_count,
        })
    }

    /// Decode a GIF byte stream, compositing each frame per its disposal method.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut options = DecodeOptions::new();
        options.set_color_output(ColorOutput::RGBA);
        let mut decoder = options.read_info(bytes)?;

        let width = u32::from(decoder.width());
        let height = u32::from(decoder.height());
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyCanvas);
        }

        let mut canvas = RgbaImage::new(width, height);
        let mut frames = Vec::new();

        while let Some(frame) = decoder.read_next_frame()? {
            let rect = FrameRect::clipped(
                u32::from(frame.left),
                u32::from(frame.top),
                u32::from(frame.width),
                u32::from(frame.height),
                width,
                height,
            );

            // Canvas state to return to after a `Previous` disposal.
            let restore = matches!(frame.dispose, DisposalMethod::Previous).then(|| canvas.clone());

            let stride = usize::from(frame.width) * 4;
            for y in 0..rect.height {
                let row = y as usize * stride;
                for x in 0..rect.width {
                    let i = row + x as usize * 4;
                    let Some(px) = frame.buffer.get(i..i + 4) else {
                        continue;
                    };
                    if px[3] == 0 {
                        continue;
                    }
                    canvas.put_pixel(
                        rect.left + x,
                        rect.top + y,
                        Rgba([px[0], px[1], px[2], px[3]]),
                    );
                }
            }

            frames.push(Frame {
                image: canvas.clone(),
                duration: u32::from(frame.delay) * DELAY_UNIT_MS,
            });

            match frame.dispose {
                DisposalMethod::Background => rect.clear(&mut canvas),
                DisposalMethod::Previous => {
                    if let Some(previous) = restore {
                        canvas = previous;
                    }
                }
                DisposalMethod::Any | DisposalMethod::Keep => {}
            }
        }

        let loop_count = LoopCount::from(decoder.repeat());
        log::debug!(
            "Decoded GIF: {}x{}, {} frames, loop {:?}",
            width,
            height,
            frames.len(),
            loop_count
        );

        Self::from_frames(frames, loop_count)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame durations in milliseconds.
    pub fn durations(&self) -> impl Iterator<Item = u32> + '_ {
        self.frames.iter().map(|f| f.duration)
    }

    /// Duration of one pass in milliseconds.
    pub fn total_duration(&self) -> u64 {
        self.total_duration
    }

    pub fn loop_count(&self) -> LoopCount {
        self.loop_count
    }

    /// Canvas size in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.frames[0].image.dimensions()
    }

    /// Index of the frame showing at `elapsed` milliseconds, honoring loops.
    ///
    /// Returns `None` once every pass has finished.
    pub fn frame_at(&self, elapsed: u64) -> Option<usize> {
        if let LoopCount::Finite(extra) = self.loop_count {
            let passes = u64::from(extra) + 1;
            if elapsed >= self.total_duration.saturating_mul(passes) {
                return None;
            }
        }
        self.frame_in_first_pass(elapsed % self.total_duration)
    }

    /// Index of the frame showing at `elapsed` milliseconds within the first pass.
    pub fn frame_in_first_pass(&self, elapsed: u64) -> Option<usize> {
        if elapsed >= self.total_duration {
            return None;
        }
        Some(self.starts.partition_point(|&start| start <= elapsed) - 1)
    }

    /// Frame indices at 0, `step`, `2 * step`, ... across one pass.
    ///
    /// Looping is left to playback, which wraps `tick mod len`.
    pub fn sample(&self, step: u32) -> Vec<usize> {
        let step = u64::from(step.max(1));
        (0u64..)
            .map_while(|i| self.frame_in_first_pass(i * step))
            .collect()
    }
}

/// Frame rectangle clipped to the logical screen.
#[derive(Debug, Clone, Copy)]
struct FrameRect {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

impl FrameRect {
    fn clipped(left: u32, top: u32, width: u32, height: u32, screen_w: u32, screen_h: u32) -> Self {
        Self {
            left,
            top,
            width: width.min(screen_w.saturating_sub(left)),
            height: height.min(screen_h.saturating_sub(top)),
        }
    }

    fn clear(&self, canvas: &mut RgbaImage) {
        for y in self.top..self.top + self.height {
            for x in self.left..self.left + self.width {
                canvas.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    const RED_PX: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN_PX: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const BLUE_PX: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const CLEAR_PX: Rgba<u8> = Rgba([0, 0, 0, 0]);

    fn timeline_with(durations: &[u32], loop_count: LoopCount) -> Timeline {
        let frames = durations
            .iter()
            .map(|&duration| Frame {
                image: RgbaImage::new(1, 1),
                duration,
            })
            .collect();
        Timeline::from_frames(frames, loop_count).unwrap()
    }

    #[test]
    fn test_decode_preserves_order_and_durations() {
        let delays = [10u16, 4, 25, 7];
        let bytes = solid_animation(4, 3, &delays);
        let timeline = Timeline::decode(&bytes).unwrap();

        assert_eq!(timeline.len(), 4);
        assert_eq!(timeline.dimensions(), (4, 3));
        let durations: Vec<u32> = timeline.durations().collect();
        assert_eq!(durations, vec![100, 40, 250, 70]);

        let expected = [RED_PX, GREEN_PX, BLUE_PX, RED_PX];
        for (frame, px) in timeline.frames().iter().zip(expected) {
            assert!(frame.image.pixels().all(|p| *p == px));
        }
    }

    #[test]
    fn test_decode_reads_loop_count() {
        let frames = [TestFrame::solid(2, 2, RED, 10)];
        let once = Timeline::decode(&encode_gif(2, 2, &frames, None)).unwrap();
        assert_eq!(once.loop_count(), LoopCount::Finite(0));

        let forever = Timeline::decode(&encode_gif(2, 2, &frames, Some(Repeat::Infinite))).unwrap();
        assert_eq!(forever.loop_count(), LoopCount::Infinite);
    }

    #[test]
    fn test_zero_delay_uses_minimum_quantum() {
        let bytes = solid_animation(2, 2, &[0, 5]);
        let timeline = Timeline::decode(&bytes).unwrap();
        let durations: Vec<u32> = timeline.durations().collect();
        assert_eq!(durations, vec![MIN_FRAME_DURATION_MS, 50]);
        assert_eq!(timeline.total_duration(), 60);
    }

    #[test]
    fn test_keep_composites_partial_frame() {
        let base = TestFrame::solid(4, 4, RED, 10);
        let patch = TestFrame {
            left: 1,
            top: 1,
            width: 2,
            height: 2,
            indices: vec![GREEN, TRANSPARENT, TRANSPARENT, GREEN],
            delay_cs: 10,
            dispose: DisposalMethod::Keep,
        };
        let timeline = Timeline::decode(&encode_gif(4, 4, &[base, patch], None)).unwrap();
        let second = &timeline.frames()[1].image;

        assert_eq!(*second.get_pixel(1, 1), GREEN_PX);
        assert_eq!(*second.get_pixel(2, 2), GREEN_PX);
        // Transparent patch pixels show the frame underneath.
        assert_eq!(*second.get_pixel(2, 1), RED_PX);
        assert_eq!(*second.get_pixel(0, 0), RED_PX);
    }

    #[test]
    fn test_background_disposal_clears_rect() {
        let mut first = TestFrame::solid(4, 4, RED, 10);
        first.dispose = DisposalMethod::Background;
        let patch = TestFrame {
            left: 0,
            top: 0,
            width: 1,
            height: 1,
            indices: vec![BLUE],
            delay_cs: 10,
            dispose: DisposalMethod::Keep,
        };
        let timeline = Timeline::decode(&encode_gif(4, 4, &[first, patch], None)).unwrap();
        let second = &timeline.frames()[1].image;

        assert_eq!(*second.get_pixel(0, 0), BLUE_PX);
        assert_eq!(*second.get_pixel(3, 3), CLEAR_PX);
    }

    #[test]
    fn test_previous_disposal_restores_canvas() {
        let base = TestFrame::solid(4, 4, RED, 10);
        let flash = TestFrame {
            left: 0,
            top: 0,
            width: 2,
            height: 2,
            indices: vec![BLUE; 4],
            delay_cs: 10,
            dispose: DisposalMethod::Previous,
        };
        let tail = TestFrame {
            left: 3,
            top: 3,
            width: 1,
            height: 1,
            indices: vec![GREEN],
            delay_cs: 10,
            dispose: DisposalMethod::Keep,
        };
        let timeline = Timeline::decode(&encode_gif(4, 4, &[base, flash, tail], None)).unwrap();

        assert_eq!(*timeline.frames()[1].image.get_pixel(0, 0), BLUE_PX);
        let third = &timeline.frames()[2].image;
        assert_eq!(*third.get_pixel(0, 0), RED_PX);
        assert_eq!(*third.get_pixel(3, 3), GREEN_PX);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Timeline::decode(b"PNG\x89 definitely not a gif"),
            Err(DecodeError::Format(_))
        ));

        let bytes = solid_animation(4, 4, &[10, 10]);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(Timeline::decode(truncated).is_err());
    }

    #[test]
    fn test_sampling_three_frames_at_step_50() {
        let timeline = timeline_with(&[100, 100, 100], LoopCount::Finite(0));
        assert_eq!(timeline.sample(50), vec![0, 0, 1, 1, 2, 2]);
        assert_eq!(timeline.frame_at(250), Some(2));
        assert_eq!(timeline.frame_at(300), None);
    }

    #[test]
    fn test_sampling_ignores_loops() {
        let timeline = timeline_with(&[100, 100, 100], LoopCount::Infinite);
        assert_eq!(timeline.sample(50).len(), 6);
    }

    #[test]
    fn test_frame_at_wraps_when_looping() {
        let forever = timeline_with(&[30, 70], LoopCount::Infinite);
        assert_eq!(forever.frame_at(0), Some(0));
        assert_eq!(forever.frame_at(29), Some(0));
        assert_eq!(forever.frame_at(30), Some(1));
        assert_eq!(forever.frame_at(100), Some(0));
        assert_eq!(forever.frame_at(1_000_035), Some(1));

        let twice = timeline_with(&[30, 70], LoopCount::Finite(1));
        assert_eq!(twice.frame_at(130), Some(1));
        assert_eq!(twice.frame_at(199), Some(1));
        assert_eq!(twice.frame_at(200), None);
    }

    #[test]
    fn test_empty_frames_rejected() {
        assert!(matches!(
            Timeline::from_frames(Vec::new(), LoopCount::Infinite),
            Err(DecodeError::NoFrames)
        ));
    }
}
