//! Document-level operations
//!
//! Every operation loads the document from bytes and either returns a
//! complete result or an error; the input is never modified and no partial
//! output is produced.

use crate::compose::fonts::FontCatalog;
use crate::compose::{compose, ComposeReport};
use crate::config::MaskConfig;
use crate::document;
use crate::error::MaskError;
use crate::extract::{extract_pages, ExtractedText};
use crate::locate::locate_all;
use crate::metadata::set_author;
use crate::oracle::{EntityOracle, OracleRequest};
use crate::record::SensitiveRecord;
use crate::report::{ProcessMetrics, ProcessingSummary};
use crate::text::{build_page_texts, PageText};
use lopdf::Document;
use std::time::Instant;
use tracing::{info, warn};

/// Result of an anonymization run.
#[derive(Debug, Clone)]
pub struct AnonymizeOutput {
    pub pdf: Vec<u8>,
    pub summary: ProcessingSummary,
    /// Records as received from the oracle.
    pub entities: Vec<SensitiveRecord>,
    pub metrics: ProcessMetrics,
}

/// Number of pages in the document.
pub fn page_count(bytes: &[u8]) -> Result<u32, MaskError> {
    let doc = document::load(bytes)?;
    Ok(doc.get_pages().len() as u32)
}

/// Page-marked, overlay-free text of the document, cut to the text budget.
pub fn extract_text(bytes: &[u8], config: &MaskConfig) -> Result<ExtractedText, MaskError> {
    config.validate()?;
    let doc = document::load(bytes)?;
    let pages = build_page_texts(&doc, config.parallel)?;
    Ok(extract_pages(&pages, config))
}

/// Extract the text, ask `oracle` for sensitive values and replace them.
pub fn anonymize(
    bytes: &[u8],
    oracle: &dyn EntityOracle,
    config: &MaskConfig,
) -> Result<AnonymizeOutput, MaskError> {
    let started = Instant::now();
    config.validate()?;
    let doc = document::load(bytes)?;
    let pages = build_page_texts(&doc, config.parallel)?;
    let extracted = extract_pages(&pages, config);
    info!(
        pages = pages.len(),
        characters = extracted.text.chars().count(),
        truncated = extracted.text_truncated,
        "Text extracted for analysis"
    );

    let request = OracleRequest {
        text: extracted.text,
        text_truncated: extracted.text_truncated,
        page_count: pages.len() as u32,
    };
    let records = oracle.detect(&request)?;
    info!(records = records.len(), "Oracle analysis complete");

    run(
        doc,
        &pages,
        records,
        request.text_truncated,
        config,
        bytes.len(),
        started,
    )
}

/// Replace already-detected `records` in the document.
pub fn redact_records(
    bytes: &[u8],
    records: Vec<SensitiveRecord>,
    config: &MaskConfig,
) -> Result<AnonymizeOutput, MaskError> {
    let started = Instant::now();
    config.validate()?;
    let doc = document::load(bytes)?;
    let pages = build_page_texts(&doc, config.parallel)?;
    let text_truncated = extract_pages(&pages, config).text_truncated;
    run(
        doc,
        &pages,
        records,
        text_truncated,
        config,
        bytes.len(),
        started,
    )
}

fn run(
    mut doc: Document,
    pages: &[PageText],
    records: Vec<SensitiveRecord>,
    text_truncated: bool,
    config: &MaskConfig,
    input_size_bytes: usize,
    started: Instant,
) -> Result<AnonymizeOutput, MaskError> {
    let located = locate_all(&records, pages, config);
    if !located.not_found.is_empty() {
        warn!(
            not_found = located.not_found.len(),
            total = records.len(),
            "Some reported values are absent from their page"
        );
    }

    let catalog = if config.font_dirs.is_empty() {
        FontCatalog::standard()
    } else {
        FontCatalog::load(&config.font_dirs)
    };
    let composed: ComposeReport = compose(
        &mut doc,
        pages,
        &located.occurrences,
        &catalog,
        config.parallel,
    )?;

    set_author(&mut doc, &config.author_attribution)?;
    let pdf = save(doc)?;

    let summary = ProcessingSummary::build(&records, &located, &composed, text_truncated);
    info!(
        total_elements = summary.total_elements,
        total_replacements = summary.total_replacements,
        not_found = summary.not_found_count,
        pages_redacted = summary.pages_redacted,
        "Anonymization complete"
    );

    let metrics = ProcessMetrics {
        input_size_bytes,
        output_size_bytes: pdf.len(),
        page_count: pages.len() as u32,
        processing_time_ms: started.elapsed().as_millis() as u64,
    };
    Ok(AnonymizeOutput {
        pdf,
        summary,
        entities: records,
        metrics,
    })
}

/// Drop unreachable objects (the replaced content streams among them),
/// renumber, compress and serialize.
fn save(mut doc: Document) -> Result<Vec<u8>, MaskError> {
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();
    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| MaskError::Operation(e.to_string()))?;
    Ok(output)
}
