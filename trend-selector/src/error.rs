//! Error types for selection runs.

use thiserror::Error;
use trend_common::ValidationError;

use crate::screener::types::FilterStage;

/// Fatal failure of a selection run.
#[derive(Debug, Error)]
pub enum SelectorError {
    /// Invalid configuration, reported before any stage runs
    #[error("Invalid configuration: {0}")]
    Config(#[from] ValidationError),

    /// No candidate survived a stage that must not come out empty
    #[error("No candidates left after stage {stage}")]
    EmptyPool { stage: FilterStage },

    /// The history provider could not list the universe
    #[error("Provider error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, SelectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_cause() {
        let err = SelectorError::from(ValidationError::MissingField {
            field: "benchmark".into(),
        });
        assert!(err.to_string().contains("benchmark"));

        let err = SelectorError::EmptyPool {
            stage: FilterStage::Liquidity,
        };
        assert!(err.to_string().contains("流动性筛选"));
    }
}
