//! End-to-end anonymization tests on generated documents
//!
//! Run with: cargo test -p pdfmask-core --test anonymize_tests

mod common;

use common::{any_stream_contains, page_texts, raw_info, show_lines, FixtureBuilder};
use pdfmask_core::{
    anonymize, extract_text, page_count, redact_records, MaskConfig, MaskError, SensitiveRecord,
    StaticOracle,
};
use pretty_assertions::assert_eq;

const ATTRIBUTION: &str = "holomask https://holofin.ai";

fn config() -> MaskConfig {
    MaskConfig {
        parallel: false,
        ..MaskConfig::default()
    }
}

fn john_doe_pdf() -> Vec<u8> {
    FixtureBuilder::new()
        .text_page(&[(72, 720, 12, "John Doe")])
        .build()
}

#[test]
fn test_person_name_is_replaced() {
    let records = vec![SensitiveRecord::new("Person Name", "John Doe", "Jane Smith", 1)];
    let output = redact_records(&john_doe_pdf(), records, &config()).unwrap();

    assert!(output.summary.total_replacements >= 1);
    assert_eq!(output.summary.not_found_count, 0);
    let text = &page_texts(&output.pdf)[0];
    assert!(text.contains("Jane Smith"), "{text}");
    assert!(!text.contains("John Doe"), "{text}");
    assert!(!output.pdf.windows(4).any(|w| w == b"John"));
}

#[test]
fn test_text_inside_form_xobject_is_replaced() {
    let pdf = FixtureBuilder::new()
        .form_page(&show_lines(&[(72, 720, 12, "John Doe")]))
        .build();

    let extracted = extract_text(&pdf, &config()).unwrap();
    assert!(extracted.text.contains("John Doe"), "{}", extracted.text);

    let records = vec![SensitiveRecord::new("Person Name", "John Doe", "Jane Smith", 1)];
    let output = redact_records(&pdf, records, &config()).unwrap();

    assert!(output.summary.total_replacements >= 1);
    assert_eq!(output.summary.not_found_count, 0);
    let text = &page_texts(&output.pdf)[0];
    assert!(text.contains("Jane Smith"), "{text}");
    assert!(!text.contains("John"), "{text}");
    assert!(!any_stream_contains(&output.pdf, b"John"));
}

#[test]
fn test_surrounding_text_survives() {
    let pdf = FixtureBuilder::new()
        .text_page(&[
            (72, 720, 12, "Employee: John Doe"),
            (72, 700, 12, "Net salary: 2500 EUR"),
        ])
        .build();
    let records = vec![SensitiveRecord::new("Person Name", "John Doe", "Jane Smith", 1)];
    let output = redact_records(&pdf, records, &config()).unwrap();

    let text = &page_texts(&output.pdf)[0];
    assert!(text.contains("Employee:"), "{text}");
    assert!(text.contains("Net salary: 2500 EUR"), "{text}");
    assert!(text.contains("Jane Smith"), "{text}");
    assert!(!text.contains("John"), "{text}");
}

#[test]
fn test_hallucinated_value_is_reported_not_found() {
    let records = vec![SensitiveRecord::new(
        "IBAN",
        "FR1234567890123456789012345",
        "FR7630006000012345678912345",
        1,
    )];
    let output = redact_records(&john_doe_pdf(), records, &config()).unwrap();

    assert_eq!(output.summary.total_replacements, 0);
    assert_eq!(output.summary.not_found_count, 1);
    let missing = &output.summary.not_found[0];
    assert_eq!(missing.value, "FR1234567890123456789012345");
    assert_eq!(missing.page, 1);
    assert_eq!(missing.replacement, "FR7630006000012345678912345");
    assert!(page_texts(&output.pdf)[0].contains("John Doe"));
}

#[test]
fn test_out_of_range_page_is_skipped() {
    let records = vec![
        SensitiveRecord::new("Person Name", "John Doe", "Jane Smith", 5),
        SensitiveRecord::new("Person Name", "John Doe", "Jane Smith", 0),
    ];
    let output = redact_records(&john_doe_pdf(), records, &config()).unwrap();

    assert_eq!(output.summary.total_elements, 2);
    assert_eq!(output.summary.total_replacements, 0);
    assert_eq!(output.summary.not_found_count, 0);
    assert_eq!(output.summary.skipped_out_of_range, 2);
    assert!(page_texts(&output.pdf)[0].contains("John Doe"));
}

#[test]
fn test_records_only_touch_their_page() {
    let pdf = FixtureBuilder::new()
        .text_page(&[(72, 720, 12, "John Doe")])
        .text_page(&[(72, 720, 12, "John Doe")])
        .build();
    let records = vec![SensitiveRecord::new("Person Name", "John Doe", "Jane Smith", 2)];
    let output = redact_records(&pdf, records, &config()).unwrap();

    let texts = page_texts(&output.pdf);
    assert!(texts[0].contains("John Doe"));
    assert!(texts[1].contains("Jane Smith"));
    assert!(!texts[1].contains("John Doe"));
    assert_eq!(output.summary.pages_redacted, 1);
}

#[test]
fn test_metadata_round_trip() {
    let pdf = FixtureBuilder::new()
        .text_page(&[(72, 720, 12, "John Doe")])
        .info("Title", "Payslip March")
        .info("Author", "John Doe")
        .info("Producer", "Payroll 4.2")
        .build();
    let before = raw_info(&pdf);
    let records = vec![SensitiveRecord::new("Person Name", "John Doe", "Jane Smith", 1)];
    let output = redact_records(&pdf, records, &config()).unwrap();
    let after = raw_info(&output.pdf);

    let without_author = |entries: &[(Vec<u8>, Vec<u8>)]| -> Vec<(Vec<u8>, Vec<u8>)> {
        entries
            .iter()
            .filter(|(key, _)| key.as_slice() != b"Author")
            .cloned()
            .collect()
    };
    assert_eq!(without_author(&before), without_author(&after));
    let author = after.iter().find(|(key, _)| key.as_slice() == b"Author");
    assert_eq!(author.map(|(_, v)| v.as_slice()), Some(ATTRIBUTION.as_bytes()));
}

#[test]
fn test_author_is_added_when_document_has_no_info() {
    let output = redact_records(&john_doe_pdf(), Vec::new(), &config()).unwrap();
    let info = raw_info(&output.pdf);
    assert_eq!(info, vec![(b"Author".to_vec(), ATTRIBUTION.as_bytes().to_vec())]);
    assert_eq!(output.summary.pages_redacted, 0);
}

#[test]
fn test_surname_alone_is_replaced_by_split_token() {
    let pdf = FixtureBuilder::new()
        .text_page(&[(72, 720, 12, "John Doe"), (72, 60, 8, "Signed: Doe")])
        .build();
    let records = vec![SensitiveRecord::new("Person Name", "John Doe", "Jane Smith", 1)];
    let output = redact_records(&pdf, records, &config()).unwrap();

    assert_eq!(output.summary.total_replacements, 2);
    assert_eq!(output.summary.not_found_count, 0);
    let text = &page_texts(&output.pdf)[0];
    assert!(text.contains("Signed: Smith"), "{text}");
    assert!(!text.contains("Doe"), "{text}");
}

#[test]
fn test_partial_match_is_still_reported_not_found() {
    let pdf = FixtureBuilder::new()
        .text_page(&[(72, 720, 12, "Mr Doe")])
        .build();
    let records = vec![SensitiveRecord::new("Client Name", "John Doe", "Jane Smith", 1)];
    let output = redact_records(&pdf, records, &config()).unwrap();

    assert_eq!(output.summary.total_replacements, 1);
    assert_eq!(output.summary.not_found_count, 1);
    assert!(page_texts(&output.pdf)[0].contains("Smith"));
}

#[test]
fn test_other_types_are_not_split() {
    let pdf = FixtureBuilder::new()
        .text_page(&[(72, 720, 12, "1 Main Street"), (72, 700, 12, "Main office")])
        .build();
    let records = vec![SensitiveRecord::new("Address", "1 Main Street", "9 Side Road", 1)];
    let output = redact_records(&pdf, records, &config()).unwrap();

    assert_eq!(output.summary.total_replacements, 1);
    assert!(page_texts(&output.pdf)[0].contains("Main office"));
}

#[test]
fn test_every_occurrence_on_the_page_is_replaced() {
    let pdf = FixtureBuilder::new()
        .text_page(&[
            (72, 720, 12, "IBAN FR7612345"),
            (72, 400, 12, "Payment to FR7612345"),
        ])
        .build();
    let records = vec![SensitiveRecord::new("IBAN", "FR7612345", "FR0098765", 1)];
    let output = redact_records(&pdf, records, &config()).unwrap();

    assert_eq!(output.summary.total_replacements, 2);
    let text = &page_texts(&output.pdf)[0];
    assert_eq!(text.matches("FR0098765").count(), 2, "{text}");
    assert!(!text.contains("FR7612345"));
}

#[test]
fn test_duplicate_records_produce_one_occurrence() {
    let records = vec![
        SensitiveRecord::new("Person Name", "John Doe", "Jane Smith", 1),
        SensitiveRecord::new("Person Name", "John Doe", "Mary Major", 1),
    ];
    let output = redact_records(&john_doe_pdf(), records, &config()).unwrap();

    assert_eq!(output.summary.total_elements, 2);
    assert_eq!(output.summary.total_replacements, 1);
    let text = &page_texts(&output.pdf)[0];
    assert!(text.contains("Mary Major"), "{text}");
    assert!(!text.contains("Jane Smith"), "{text}");
}

#[test]
fn test_anonymize_with_oracle() {
    let payload = r#"{"sensitive_elements":[
        {"type":"Person Name","value":"John Doe","replacement":"Jane Smith","page":1,"confidence":0.9}
    ]}"#;
    let oracle = StaticOracle::from_payload(payload, &config()).unwrap();
    let output = anonymize(&john_doe_pdf(), &oracle, &config()).unwrap();

    assert_eq!(output.entities.len(), 1);
    assert_eq!(output.summary.elements_by_type.get("Person Name"), Some(&1));
    assert_eq!(output.summary.font_resolutions.get("page_resource"), Some(&1));
    assert_eq!(output.metrics.page_count, 1);
    assert_eq!(output.metrics.output_size_bytes, output.pdf.len());
    assert!(page_texts(&output.pdf)[0].contains("Jane Smith"));
}

#[test]
fn test_parallel_and_sequential_agree() {
    let pdf = FixtureBuilder::new()
        .text_page(&[(72, 720, 12, "John Doe")])
        .text_page(&[(72, 720, 12, "John Doe")])
        .text_page(&[(72, 720, 12, "John Doe")])
        .build();
    let records: Vec<SensitiveRecord> = (1..=3)
        .map(|page| SensitiveRecord::new("Person Name", "John Doe", "Jane Smith", page))
        .collect();
    let parallel = MaskConfig {
        parallel: true,
        ..MaskConfig::default()
    };
    let a = redact_records(&pdf, records.clone(), &parallel).unwrap();
    let b = redact_records(&pdf, records, &config()).unwrap();
    assert_eq!(page_texts(&a.pdf), page_texts(&b.pdf));
    assert_eq!(a.summary, b.summary);
}

#[test]
fn test_overlay_lines_are_dropped_from_extraction() {
    let pdf = FixtureBuilder::new()
        .page(
            b"BT /F1 12 Tf 72 720 Td (CONFIDENTIAL) Tj ET \
              BT /F1 12 Tf 72.5 720 Td (CONFIDENTIAL) Tj ET \
              BT /F1 12 Tf 72 700 Td (Body text) Tj ET",
        )
        .build();
    let extracted = extract_text(&pdf, &config()).unwrap();
    assert_eq!(extracted.text, "--- Page 1 ---\nCONFIDENTIAL\nBody text");
    assert_eq!(extracted.pages[0].overlays_dropped, 1);
}

#[test]
fn test_empty_pages_are_not_marked() {
    let pdf = FixtureBuilder::new()
        .text_page(&[(72, 720, 12, "First")])
        .page(b"")
        .text_page(&[(72, 720, 12, "Third")])
        .build();
    let extracted = extract_text(&pdf, &config()).unwrap();
    assert_eq!(extracted.text, "--- Page 1 ---\nFirst\n\n--- Page 3 ---\nThird");
}

#[test]
fn test_truncation_is_flagged() {
    let pdf = FixtureBuilder::new()
        .text_page(&[(72, 720, 12, "A line that is much longer than the budget")])
        .build();
    let small = MaskConfig {
        text_budget: 20,
        ..config()
    };
    let extracted = extract_text(&pdf, &small).unwrap();
    assert!(extracted.text_truncated);
    assert_eq!(extracted.text.chars().count(), 20);
    assert!(extracted.full_length > 20);

    let output = redact_records(&pdf, Vec::new(), &small).unwrap();
    assert!(output.summary.text_truncated);
}

#[test]
fn test_invalid_documents_are_rejected() {
    let err = redact_records(b"%PDF-1.7 garbage", Vec::new(), &config()).unwrap_err();
    assert!(matches!(err, MaskError::SourceInvalid(_)));
    assert!(page_count(b"").unwrap_err().is_source_error());
}

#[test]
fn test_page_count() {
    let pdf = FixtureBuilder::new()
        .text_page(&[(72, 720, 12, "One")])
        .text_page(&[(72, 720, 12, "Two")])
        .build();
    assert_eq!(page_count(&pdf).unwrap(), 2);
}
