use thiserror::Error;

/// Single error enum for all engine operations.
///
/// Parse and configuration errors abort construction before any decision is
/// possible. Syntax and evaluation errors abort the single decision that
/// raised them and propagate to the caller; an evaluation failure is never
/// silently resolved into a deny.
#[derive(Debug, Error)]
pub enum WardenError {
    #[error("model parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("matcher syntax error: {0}")]
    Syntax(String),

    #[error("matcher evaluation error: {0}")]
    Evaluation(String),
}

pub type WardenResult<T> = Result<T, WardenError>;
