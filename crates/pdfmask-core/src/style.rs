//! Style lookup: font, size and color of the text under a matched rectangle

use crate::geometry::Rect;
use crate::record::{Style, StyleSource};
use crate::text::{PageText, TextRun};

/// Rendered height above which the nominal size is considered understated.
const SCALE_RATIO: f32 = 1.5;
/// Share of the rendered height used as the corrected size.
const HEIGHT_TO_SIZE: f32 = 0.85;

/// Size to render replacement text at, given a run's nominal size and the
/// height of its bounding box.
pub fn corrected_size(reported_size: f32, visual_height: f32) -> f32 {
    if visual_height > SCALE_RATIO * reported_size {
        HEIGHT_TO_SIZE * visual_height
    } else {
        reported_size
    }
}

/// Page-scoped index of text runs sorted by top edge.
pub struct RunIndex<'a> {
    /// `(position in page order, run)`, sorted by `rect.y0`.
    entries: Vec<(usize, &'a TextRun)>,
    max_height: f32,
}

impl<'a> RunIndex<'a> {
    pub fn new(page: &'a PageText) -> Self {
        let mut entries: Vec<(usize, &TextRun)> = page.runs().enumerate().collect();
        entries.sort_by(|a, b| a.1.rect.y0.total_cmp(&b.1.rect.y0));
        let max_height = entries
            .iter()
            .map(|(_, run)| run.rect.height())
            .fold(0.0f32, f32::max);
        Self {
            entries,
            max_height,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The earliest run in page order whose box intersects `rect`.
    pub fn first_intersecting(&self, rect: &Rect) -> Option<&'a TextRun> {
        let lowest_top = rect.y0 - self.max_height;
        let start = self.entries.partition_point(|(_, run)| run.rect.y0 <= lowest_top);
        let end = self.entries.partition_point(|(_, run)| run.rect.y0 < rect.y1);
        self.entries
            .get(start..end.max(start))?
            .iter()
            .filter(|(_, run)| run.rect.intersects(rect))
            .min_by_key(|(position, _)| *position)
            .map(|(_, run)| *run)
    }

    /// Style of the text under `rect`, or the default style on a miss.
    pub fn style_at(&self, rect: &Rect) -> (Style, StyleSource) {
        match self.first_intersecting(rect) {
            Some(run) => (
                Style {
                    font_family: run.font_family.clone(),
                    font_size: corrected_size(run.font_size, run.rect.height()),
                    color: run.color,
                },
                StyleSource::Matched,
            ),
            None => (Style::default(), StyleSource::Default),
        }
    }
}
