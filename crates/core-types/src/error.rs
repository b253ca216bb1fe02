use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Unknown {kind} variant: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
