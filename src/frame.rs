// src/frame.rs - Frames moving through the pipeline
use image::DynamicImage;

use crate::reps::AnalysisResult;

pub const SIGNAL_LOST_TEXT: &str = "Video signal lost...";

/// Presentation timing carried by the transport. Passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub pts: i64,
    /// (numerator, denominator) of the stream time base.
    pub time_base: (u32, u32),
}

#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: DynamicImage,
    pub timing: FrameTiming,
}

/// Text the transport should draw on the outgoing frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayText {
    pub text: String,
    pub origin: (u32, u32),
    pub scale: f32,
    pub color: [u8; 3],
}

#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub image: DynamicImage,
    /// `None` for synthesized frames that have no source timing.
    pub timing: Option<FrameTiming>,
    pub overlay: Vec<OverlayText>,
}

impl ProcessedFrame {
    pub fn annotated(frame: VideoFrame, result: &AnalysisResult) -> Self {
        Self {
            image: frame.image,
            timing: Some(frame.timing),
            overlay: vec![
                OverlayText {
                    text: format!("Reps: {}", result.rep_count),
                    origin: (10, 30),
                    scale: 1.0,
                    color: [0, 255, 0],
                },
                OverlayText {
                    text: format!("Position: {}", result.position_label()),
                    origin: (10, 70),
                    scale: 0.7,
                    color: [255, 0, 255],
                },
            ],
        }
    }

    /// Solid black stand-in sent while the inbound stream is silent.
    pub fn signal_lost(width: u32, height: u32) -> Self {
        Self {
            image: DynamicImage::new_rgb8(width, height),
            timing: None,
            overlay: vec![OverlayText {
                text: SIGNAL_LOST_TEXT.to_string(),
                origin: (50, height / 2),
                scale: 1.0,
                color: [255, 255, 255],
            }],
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.timing.is_none()
            && self.overlay.iter().any(|o| o.text == SIGNAL_LOST_TEXT)
    }
}
