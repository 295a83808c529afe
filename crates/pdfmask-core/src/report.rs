//! Accounting over a finished run

use crate::compose::ComposeReport;
use crate::locate::LocateOutcome;
use crate::record::{NotFoundRecord, SensitiveRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// Read-only accounting of one anonymization run.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProcessingSummary {
    /// Records received from the oracle.
    pub total_elements: usize,
    /// Occurrences matched and replaced.
    pub total_replacements: usize,
    /// Records received, by type.
    pub elements_by_type: BTreeMap<String, usize>,
    pub not_found_count: usize,
    pub not_found: Vec<NotFoundRecord>,
    pub text_truncated: bool,
    pub skipped_out_of_range: usize,
    pub style_misses: usize,
    /// Replacements drawn per font strategy.
    pub font_resolutions: BTreeMap<String, usize>,
    pub pages_redacted: usize,
}

impl ProcessingSummary {
    pub fn build(
        records: &[SensitiveRecord],
        located: &LocateOutcome,
        composed: &ComposeReport,
        text_truncated: bool,
    ) -> Self {
        let mut elements_by_type = BTreeMap::new();
        for record in records {
            *elements_by_type.entry(record.record_type.clone()).or_insert(0) += 1;
        }
        Self {
            total_elements: records.len(),
            total_replacements: located.occurrences.len(),
            elements_by_type,
            not_found_count: located.not_found.len(),
            not_found: located.not_found.clone(),
            text_truncated,
            skipped_out_of_range: located.skipped_out_of_range,
            style_misses: located.style_misses,
            font_resolutions: composed
                .font_resolutions
                .iter()
                .map(|(strategy, count)| (strategy.as_str().to_string(), *count))
                .collect(),
            pages_redacted: composed.pages_redacted,
        }
    }

    /// Share of received records found verbatim on their page.
    pub fn found_ratio(&self) -> f32 {
        if self.total_elements == 0 {
            return 1.0;
        }
        let found = self
            .total_elements
            .saturating_sub(self.not_found_count + self.skipped_out_of_range);
        found as f32 / self.total_elements as f32
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}
