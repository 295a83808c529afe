//! PDF anonymization
//!
//! This crate replaces sensitive text in PDF documents with synthetic values
//! using lopdf. Matched glyphs are removed from the page content, their
//! area is painted white and the replacement is drawn in the style of the
//! original text.
//!
//! - `extract_text`: overlay-free, page-marked text for an entity oracle
//! - `anonymize`: extraction, oracle call and redaction in one pass
//! - `redact_records`: redaction with records detected beforehand

pub mod compose;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod locate;
pub mod metadata;
pub mod oracle;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod style;
pub mod text;

pub use compose::fonts::{FontCatalog, FontStrategy};
pub use config::MaskConfig;
pub use error::MaskError;
pub use extract::ExtractedText;
pub use oracle::{parse_oracle_payload, EntityOracle, OracleRequest, StaticOracle};
pub use pipeline::{anonymize, extract_text, page_count, redact_records, AnonymizeOutput};
pub use record::{MatchedOccurrence, NotFoundRecord, SensitiveRecord, Style};
pub use report::{ProcessMetrics, ProcessingSummary};
