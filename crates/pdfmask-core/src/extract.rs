//! Overlap-aware text extraction for the entity oracle
//!
//! Lines are taken in reading order; a line whose area is mostly covered by
//! a previously accepted line is treated as an overlay (watermarks, stamped
//! duplicates, fake-bold double printing) and dropped.

use crate::config::MaskConfig;
use crate::geometry::Rect;
use crate::text::PageText;
use serde::Serialize;
use tracing::{debug, warn};

/// Text kept for one page.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageExtract {
    pub page: u32,
    pub lines: Vec<String>,
    pub overlays_dropped: usize,
}

impl PageExtract {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Page-marked document text as handed to the oracle.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExtractedText {
    pub pages: Vec<PageExtract>,
    /// Formatted text cut to the configured budget.
    pub text: String,
    /// Character count before truncation.
    pub full_length: usize,
    pub text_truncated: bool,
}

/// Keep the lines of `page` that are not overlays of earlier lines.
pub fn page_lines(page: &PageText, overlay_threshold: f32) -> PageExtract {
    let mut accepted: Vec<Rect> = Vec::new();
    let mut lines = Vec::new();
    let mut overlays_dropped = 0;

    for line in &page.lines {
        let is_overlay = accepted
            .iter()
            .any(|seen| line.rect.coverage_by(seen) > overlay_threshold);
        if is_overlay {
            overlays_dropped += 1;
            continue;
        }
        accepted.push(line.rect);
        lines.push(line.text());
    }

    if overlays_dropped > 0 {
        debug!(page = page.page, overlays_dropped, "Dropped overlay lines");
    }

    PageExtract {
        page: page.page,
        lines,
        overlays_dropped,
    }
}

/// `--- Page N ---` sections joined by blank lines; empty pages are omitted.
pub fn format_pages(pages: &[PageExtract]) -> String {
    pages
        .iter()
        .filter_map(|p| {
            let text = p.text();
            if text.trim().is_empty() {
                None
            } else {
                Some(format!("--- Page {} ---\n{}", p.page, text))
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Cut `text` to at most `budget` characters.
pub fn apply_budget(text: &str, budget: usize) -> (String, bool) {
    match text.char_indices().nth(budget) {
        Some((byte_index, _)) => (text[..byte_index].to_string(), true),
        None => (text.to_string(), false),
    }
}

pub fn extract_pages(pages: &[PageText], config: &MaskConfig) -> ExtractedText {
    let pages: Vec<PageExtract> = pages
        .iter()
        .map(|page| page_lines(page, config.overlay_threshold))
        .collect();
    let formatted = format_pages(&pages);
    let full_length = formatted.chars().count();
    let (text, text_truncated) = apply_budget(&formatted, config.text_budget);
    if text_truncated {
        warn!(
            full_length,
            budget = config.text_budget,
            "Document text truncated for analysis"
        );
    }
    ExtractedText {
        pages,
        text,
        full_length,
        text_truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(lines: &[&str], page: u32) -> PageExtract {
        PageExtract {
            page,
            lines: lines.iter().map(|l| l.to_string()).collect(),
            overlays_dropped: 0,
        }
    }

    #[test]
    fn test_format_skips_empty_pages() {
        let pages = vec![extract(&["Hello", "World"], 1), extract(&[], 2), extract(&["Bye"], 3)];
        assert_eq!(
            format_pages(&pages),
            "--- Page 1 ---\nHello\nWorld\n\n--- Page 3 ---\nBye"
        );
    }

    #[test]
    fn test_budget_counts_characters() {
        assert_eq!(apply_budget("héllo", 3), ("hél".to_string(), true));
        assert_eq!(apply_budget("abc", 3), ("abc".to_string(), false));
        assert_eq!(apply_budget("", 3), (String::new(), false));
    }
}
