//! Deinterlacing by field selection.
//!
//! Keeps only the odd or even scanlines, then rescales the half-height
//! field back to the original size with a fast (nearest) resample.

use serde::{Deserialize, Serialize};

use reelkit_core::{ImageBuffer, VideoFrame};

use crate::Effect;

/// Deinterlace effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deinterlace {
    /// Keep odd scanlines (start at row 1) instead of even (row 0).
    pub use_odd_lines: bool,
}

impl Default for Deinterlace {
    fn default() -> Self {
        Self {
            use_odd_lines: true,
        }
    }
}

impl Deinterlace {
    pub fn new(use_odd_lines: bool) -> Self {
        Self { use_odd_lines }
    }
}

impl Effect for Deinterlace {
    fn name(&self) -> &'static str {
        "Deinterlace"
    }

    fn apply(&self, mut frame: VideoFrame, _frame_number: i64) -> VideoFrame {
        let width = frame.image.width();
        let height = frame.image.height();
        if height < 2 {
            return frame;
        }

        let start = u32::from(self.use_odd_lines);
        // start = 0 keeps ceil(H/2) rows, start = 1 keeps floor(H/2)
        let rows_to_copy = (height - start + 1) / 2;

        let mut field = ImageBuffer::new(width, rows_to_copy);
        for i in 0..rows_to_copy {
            let src_row = start + 2 * i;
            field.row_mut(i).copy_from_slice(frame.image.row(src_row));
        }

        frame.image = field.scaled_nearest(width, height);
        frame
    }
}
