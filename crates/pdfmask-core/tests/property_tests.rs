//! Property-based tests for pdfmask-core
//!
//! Covers style correction, name splitting, page range handling and the
//! text budget using proptest.

mod common;

use common::FixtureBuilder;
use pdfmask_core::extract::apply_budget;
use pdfmask_core::locate::{locate_all, search_pairs};
use pdfmask_core::style::corrected_size;
use pdfmask_core::text::build_page_texts;
use pdfmask_core::{MaskConfig, SensitiveRecord};
use proptest::prelude::*;

fn tokens(min: usize, max: usize) -> impl Strategy<Value = String> {
    prop::collection::vec("[A-Za-z]{1,8}", min..=max).prop_map(|words| words.join(" "))
}

fn record_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Person Name".to_string()),
        Just("client name".to_string()),
        Just("IBAN".to_string()),
        Just("Address".to_string()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ============================================================
    // Style correction
    // ============================================================

    #[test]
    fn unscaled_sizes_are_kept_exactly(
        reported in 0.5f32..200.0,
        ratio in 0.0f32..=1.5
    ) {
        let visual = reported * ratio;
        prop_assume!(visual <= 1.5 * reported);
        prop_assert_eq!(corrected_size(reported, visual), reported);
    }

    #[test]
    fn scaled_sizes_follow_the_rendered_height(
        reported in 0.5f32..200.0,
        ratio in 1.51f32..10.0
    ) {
        let visual = reported * ratio;
        prop_assert_eq!(corrected_size(reported, visual), 0.85 * visual);
    }

    // ============================================================
    // Name splitting
    // ============================================================

    #[test]
    fn split_only_for_names_with_two_tokens_each_side(
        kind in record_type(),
        value in tokens(1, 4),
        replacement in tokens(1, 4)
    ) {
        let config = MaskConfig::default();
        let record = SensitiveRecord::new(kind.clone(), value.clone(), replacement.clone(), 1);
        let pairs = search_pairs(&record, &config);

        let is_name = kind.eq_ignore_ascii_case("person name")
            || kind.eq_ignore_ascii_case("client name");
        let splits = is_name
            && value.split_whitespace().count() >= 2
            && replacement.split_whitespace().count() >= 2;
        prop_assert_eq!(pairs.len(), if splits { 3 } else { 1 });
        prop_assert_eq!(&pairs[0].text, &value);
        prop_assert_eq!(&pairs[0].replacement, &replacement);
        if splits {
            prop_assert_eq!(Some(pairs[1].text.as_str()), value.split_whitespace().next());
            prop_assert_eq!(Some(pairs[2].text.as_str()), value.split_whitespace().last());
            prop_assert_eq!(Some(pairs[2].replacement.as_str()), replacement.split_whitespace().last());
        }
    }

    #[test]
    fn replacement_is_never_empty(value in tokens(1, 3)) {
        let record = SensitiveRecord::new("IBAN", value, "", 1);
        let pairs = search_pairs(&record, &MaskConfig::default());
        prop_assert!(pairs.iter().all(|p| !p.replacement.is_empty()));
    }

    // ============================================================
    // Text budget
    // ============================================================

    #[test]
    fn budget_keeps_a_prefix_within_limit(text in "\\PC{0,200}", budget in 1usize..100) {
        let (kept, truncated) = apply_budget(&text, budget);
        prop_assert!(text.starts_with(&kept));
        prop_assert!(kept.chars().count() <= budget);
        prop_assert_eq!(truncated, text.chars().count() > budget);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn out_of_range_pages_produce_nothing(
        page in prop_oneof![-50i64..=0, 3i64..100]
    ) {
        let pdf = FixtureBuilder::new()
            .text_page(&[(72, 720, 12, "John Doe")])
            .text_page(&[(72, 720, 12, "John Doe")])
            .build();
        let doc = pdfmask_core::document::load(&pdf).unwrap();
        let pages = build_page_texts(&doc, false).unwrap();
        let records = vec![SensitiveRecord::new("Person Name", "John Doe", "Jane Smith", page)];

        let outcome = locate_all(&records, &pages, &MaskConfig::default());
        prop_assert!(outcome.occurrences.is_empty());
        prop_assert!(outcome.not_found.is_empty());
        prop_assert_eq!(outcome.skipped_out_of_range, 1);
    }
}
