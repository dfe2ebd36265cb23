use image::{Rgba, RgbaImage};
use screen_sieve_common::config::{CaptureConfig, SourceKind};
use tracing::info;

use crate::CaptureError;

/// Something that can hand out screen-sized pixel buffers on demand.
///
/// Implementations are driven from a blocking thread, so `grab` may block
/// for as long as the underlying capture API needs.
pub trait FrameSource: Send + 'static {
    fn grab(&mut self) -> Result<RgbaImage, CaptureError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Acquire the source selected in the config. Failure here is fatal for the
/// session: it never enters `Running` without a source.
pub fn open_source(config: &CaptureConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
    match config.source {
        SourceKind::TestPattern => {
            info!(
                width = config.width,
                height = config.height,
                scene_frames = config.scene_frames,
                "using test-pattern frame source"
            );
            Ok(Box::new(TestPatternSource::new(
                config.width,
                config.height,
                config.scene_frames,
            )?))
        }
        SourceKind::Screen => open_screen(),
    }
}

#[cfg(feature = "screen")]
fn open_screen() -> Result<Box<dyn FrameSource>, CaptureError> {
    Ok(Box::new(screen::ScreenSource::open()?))
}

#[cfg(not(feature = "screen"))]
fn open_screen() -> Result<Box<dyn FrameSource>, CaptureError> {
    Err(CaptureError::Unsupported("screen".into()))
}

/// Synthetic source that renders a sequence of "scenes".
///
/// Every scene is a distinct block layout held for `scene_frames` grabs,
/// with a small cursor that moves each frame. Consecutive frames of one scene
/// are near-duplicates; frames of different scenes are structurally distinct.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    scene_frames: u64,
    grabbed: u64,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32, scene_frames: u64) -> Result<Self, CaptureError> {
        if width < 16 || height < 16 {
            return Err(CaptureError::Acquire(format!(
                "test pattern needs at least 16x16 pixels, got {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            scene_frames: scene_frames.max(1),
            grabbed: 0,
        })
    }

    pub fn render(&self, index: u64) -> RgbaImage {
        let scene = index / self.scene_frames;
        let step = index % self.scene_frames;

        // Cell size and phase vary per scene so the coarse layout changes.
        let cell = (self.width / (4 + (scene % 6) as u32)).max(2);
        let phase = (scene.wrapping_mul(7919) % 13) as u32;
        let tint = (scene.wrapping_mul(53) % 200) as u8;

        let mut img = RgbaImage::from_fn(self.width, self.height, |x, y| {
            let cx = (x + phase * cell / 3) / cell;
            let cy = y / cell;
            let lit = (cx * 3 + cy * (1 + (scene % 4) as u32) + phase) % 5 < 2;
            let v = if lit { 230 } else { 25 };
            Rgba([v, v.saturating_sub(tint / 4), tint, 255])
        });

        // Cursor: small square walking across the top-left area.
        let cursor = 6u32;
        let ox = (step as u32 * 3) % (self.width / 4);
        let oy = (step as u32 * 2) % (self.height / 4);
        for y in oy..(oy + cursor).min(self.height) {
            for x in ox..(ox + cursor).min(self.width) {
                img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        img
    }
}

impl FrameSource for TestPatternSource {
    fn grab(&mut self) -> Result<RgbaImage, CaptureError> {
        let img = self.render(self.grabbed);
        self.grabbed += 1;
        Ok(img)
    }

    fn name(&self) -> &str {
        "test_pattern"
    }
}

#[cfg(feature = "screen")]
mod screen {
    use image::RgbaImage;
    use tracing::info;

    use super::FrameSource;
    use crate::CaptureError;

    /// Primary display captured through the `screenshots` crate.
    pub struct ScreenSource {
        screen: screenshots::Screen,
    }

    impl ScreenSource {
        pub fn open() -> Result<Self, CaptureError> {
            let screens =
                screenshots::Screen::all().map_err(|e| CaptureError::Acquire(e.to_string()))?;
            let screen = screens
                .into_iter()
                .next()
                .ok_or_else(|| CaptureError::Acquire("no displays found".into()))?;
            // Probe once so missing permissions fail at startup, not per frame.
            screen
                .capture()
                .map_err(|e| CaptureError::Acquire(e.to_string()))?;
            info!(
                display = screen.display_info.id,
                width = screen.display_info.width,
                height = screen.display_info.height,
                "screen capture source acquired"
            );
            Ok(Self { screen })
        }
    }

    impl FrameSource for ScreenSource {
        fn grab(&mut self) -> Result<RgbaImage, CaptureError> {
            let shot = self
                .screen
                .capture()
                .map_err(|e| CaptureError::Grab(e.to_string()))?;
            let (width, height) = (shot.width(), shot.height());
            RgbaImage::from_raw(width, height, shot.into_raw())
                .ok_or_else(|| CaptureError::Grab("screen buffer size mismatch".into()))
        }

        fn name(&self) -> &str {
            "screen"
        }
    }
}
