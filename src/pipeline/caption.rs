//! Caption association for extracted images.

use crate::pipeline::layout::{Rect, TextBlock};

/// Maximum distance (PDF points) between an image's bottom edge and the top
/// of its caption block.
pub const CAPTION_WINDOW: f32 = 60.0;

/// Text of the nearest block that starts at or below the image's bottom edge
/// and within [`CAPTION_WINDOW`]. Ties go to the earlier block.
pub fn select_caption<'a>(blocks: &'a [TextBlock], image: &Rect) -> Option<&'a str> {
    blocks
        .iter()
        .filter_map(|block| {
            let distance = block.rect.top - image.bottom;
            (block.rect.top >= image.bottom && distance <= CAPTION_WINDOW)
                .then_some((distance, block))
        })
        // `min_by` keeps the first of equal elements.
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, block)| block.text.as_str())
}
