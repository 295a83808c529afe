use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("Invalid source document: {0}")]
    SourceInvalid(String),

    #[error("Entity oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Entity oracle returned malformed content: {0}")]
    OracleMalformed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("PDF operation failed: {0}")]
    Operation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MaskError {
    /// Fatal errors abort the whole document; everything else in the
    /// pipeline degrades locally and never reaches the caller.
    pub fn is_source_error(&self) -> bool {
        matches!(self, MaskError::SourceInvalid(_))
    }

    pub fn is_oracle_error(&self) -> bool {
        matches!(
            self,
            MaskError::OracleUnavailable(_) | MaskError::OracleMalformed(_)
        )
    }
}
