//! Occurrence locator: maps oracle records to rectangles on their page

use crate::config::MaskConfig;
use crate::geometry::Rect;
use crate::record::{MatchedOccurrence, NotFoundRecord, SensitiveRecord, StyleSource};
use crate::style::RunIndex;
use crate::text::PageText;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Identity of an occurrence: page, searched text and the exact top-left
/// corner. A later record hitting the same key replaces the earlier entry.
type OccurrenceKey = (u32, String, u32, u32);

fn occurrence_key(page: u32, text: &str, rect: &Rect) -> OccurrenceKey {
    (page, text.to_string(), rect.x0.to_bits(), rect.y0.to_bits())
}

/// A string to search for and what to draw in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPair {
    pub text: String,
    pub replacement: String,
    /// First or last token of a split name.
    pub is_token: bool,
}

/// Everything the locator learned about a batch of records.
#[derive(Debug, Clone, Default)]
pub struct LocateOutcome {
    pub occurrences: Vec<MatchedOccurrence>,
    pub not_found: Vec<NotFoundRecord>,
    pub skipped_out_of_range: usize,
    pub style_misses: usize,
}

/// Search pairs for `record`: the full value, plus first and last tokens
/// when the record is a splittable name and both sides have two or more
/// tokens.
pub fn search_pairs(record: &SensitiveRecord, config: &MaskConfig) -> Vec<SearchPair> {
    let replacement = if record.replacement_value.is_empty() {
        config.placeholder_replacement.clone()
    } else {
        record.replacement_value.clone()
    };
    let mut pairs = vec![SearchPair {
        text: record.original_value.clone(),
        replacement: replacement.clone(),
        is_token: false,
    }];

    if config.splits_names_for(&record.record_type) {
        let names: Vec<&str> = record.original_value.split_whitespace().collect();
        let substitutes: Vec<&str> = replacement.split_whitespace().collect();
        if let ([first, .., last], [sub_first, .., sub_last]) =
            (names.as_slice(), substitutes.as_slice())
        {
            pairs.push(SearchPair {
                text: first.to_string(),
                replacement: sub_first.to_string(),
                is_token: true,
            });
            pairs.push(SearchPair {
                text: last.to_string(),
                replacement: sub_last.to_string(),
                is_token: true,
            });
        }
    }
    pairs
}

/// Locates records across a document's pages.
pub struct Locator<'a> {
    pages: &'a [PageText],
    indexes: Vec<RunIndex<'a>>,
    config: &'a MaskConfig,
    outcome: LocateOutcome,
    slots: HashMap<OccurrenceKey, usize>,
}

impl<'a> Locator<'a> {
    pub fn new(pages: &'a [PageText], config: &'a MaskConfig) -> Self {
        Self {
            pages,
            indexes: pages.iter().map(RunIndex::new).collect(),
            config,
            outcome: LocateOutcome::default(),
            slots: HashMap::new(),
        }
    }

    pub fn locate(&mut self, record: &SensitiveRecord) {
        let Some(page_number) = record.page_in(self.pages.len() as u32) else {
            debug!(
                page = record.page,
                record_type = %record.record_type,
                "Skipping record for a page outside the document"
            );
            self.outcome.skipped_out_of_range += 1;
            return;
        };
        let pages = self.pages;
        let position = (page_number - 1) as usize;
        let page = &pages[position];
        let pairs = search_pairs(record, self.config);

        let full_hits = if record.original_value.is_empty() {
            Vec::new()
        } else {
            page.search(&record.original_value)
        };

        for pair in &pairs {
            let hits = if pair.is_token {
                page.search(&pair.text)
                    .into_iter()
                    .filter(|rect| {
                        let (cx, cy) = rect.center();
                        !full_hits.iter().any(|full| full.contains_point(cx, cy))
                    })
                    .collect()
            } else {
                full_hits.clone()
            };
            if hits.is_empty() {
                continue;
            }
            info!(
                record_type = %record.record_type,
                text = %pair.text,
                page = page_number,
                count = hits.len(),
                "Found sensitive text"
            );
            for rect in hits {
                self.insert(page_number, position, record, pair, rect);
            }
        }

        if full_hits.is_empty() {
            warn!(
                record_type = %record.record_type,
                value = %record.original_value,
                page = page_number,
                "Value not found on its page"
            );
            self.outcome.not_found.push(NotFoundRecord {
                record_type: record.record_type.clone(),
                value: record.original_value.clone(),
                page: page_number,
                replacement: pairs[0].replacement.clone(),
            });
        }
    }

    fn insert(
        &mut self,
        page_number: u32,
        position: usize,
        record: &SensitiveRecord,
        pair: &SearchPair,
        rect: Rect,
    ) {
        let (style, style_source) = self.indexes[position].style_at(&rect);
        if style_source == StyleSource::Default {
            self.outcome.style_misses += 1;
        }
        let occurrence = MatchedOccurrence {
            page: page_number,
            rect,
            searched_text: pair.text.clone(),
            replacement_text: pair.replacement.clone(),
            record_type: record.record_type.clone(),
            style,
            style_source,
        };
        let key = occurrence_key(page_number, &pair.text, &rect);
        match self.slots.get(&key) {
            Some(slot) => self.outcome.occurrences[*slot] = occurrence,
            None => {
                self.slots.insert(key, self.outcome.occurrences.len());
                self.outcome.occurrences.push(occurrence);
            }
        }
    }

    pub fn finish(self) -> LocateOutcome {
        self.outcome
    }
}

/// Locate every record against the interpreted pages.
pub fn locate_all(
    records: &[SensitiveRecord],
    pages: &[PageText],
    config: &MaskConfig,
) -> LocateOutcome {
    let mut locator = Locator::new(pages, config);
    for record in records {
        locator.locate(record);
    }
    locator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pair_texts(pairs: &[SearchPair]) -> Vec<(&str, &str)> {
        pairs
            .iter()
            .map(|p| (p.text.as_str(), p.replacement.as_str()))
            .collect()
    }

    #[test]
    fn test_person_name_is_split() {
        let record = SensitiveRecord::new("Person Name", "John Michael Doe", "Jane Smith", 1);
        let pairs = search_pairs(&record, &MaskConfig::default());
        assert_eq!(
            pair_texts(&pairs),
            vec![
                ("John Michael Doe", "Jane Smith"),
                ("John", "Jane"),
                ("Doe", "Smith"),
            ]
        );
    }

    #[test]
    fn test_single_token_replacement_disables_split() {
        let record = SensitiveRecord::new("Client Name", "John Doe", "Anonymous", 1);
        assert_eq!(search_pairs(&record, &MaskConfig::default()).len(), 1);
    }

    #[test]
    fn test_other_types_are_not_split() {
        let record = SensitiveRecord::new("Address", "1 Main Street", "2 Side Road", 1);
        assert_eq!(search_pairs(&record, &MaskConfig::default()).len(), 1);
    }

    #[test]
    fn test_empty_replacement_uses_placeholder() {
        let record = SensitiveRecord::new("IBAN", "FR76", "", 1);
        let pairs = search_pairs(&record, &MaskConfig::default());
        assert_eq!(pairs[0].replacement, "XXXXX");
    }

    #[test]
    fn test_out_of_range_records_are_skipped_silently() {
        let pages: Vec<PageText> = Vec::new();
        let records = vec![
            SensitiveRecord::new("Person Name", "John Doe", "Jane Smith", 2),
            SensitiveRecord::new("Person Name", "John Doe", "Jane Smith", 0),
        ];
        let outcome = locate_all(&records, &pages, &MaskConfig::default());
        assert_eq!(outcome.skipped_out_of_range, 2);
        assert!(outcome.occurrences.is_empty());
        assert!(outcome.not_found.is_empty());
    }
}
