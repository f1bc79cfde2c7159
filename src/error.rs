use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatementError {
    #[error("Duplicate calculation rule for target subject: {0}")]
    DuplicateRuleTarget(String),

    #[error("Calculation rule for {0} has an empty formula")]
    EmptyFormula(String),

    #[error("Calculation rules form a cycle through subject: {0}")]
    CyclicRule(String),

    #[error("Duplicate subject name in statement template: {0}")]
    DuplicateSubject(String),

    #[error("Unknown subject: {0}")]
    UnknownSubject(String),

    #[error("Row index {index} out of range for statement with {len} rows")]
    RowIndexOutOfRange { index: usize, len: usize },

    #[error("Subject {0} is not an input row and cannot be edited")]
    NotEditable(String),

    #[error("Subject {0} has no calculation rule and cannot be corrected")]
    NotCorrectable(String),

    #[error("Amount {amount} for subject {subject} exceeds the supported range")]
    AmountOutOfRange { subject: String, amount: Decimal },

    #[error("Invalid report period '{0}': expected YYYYMM")]
    InvalidPeriod(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StatementError>;
