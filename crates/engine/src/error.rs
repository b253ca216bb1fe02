use database::StorageError;
use executor::ExecutorError;
use thiserror::Error;

/// Non-recoverable failures of a decision-execution call.
///
/// Everything recoverable (bad decision, clamp to zero, missing references)
/// comes back as an `ExecutionResult` rejection instead; this error only
/// carries storage faults the caller may want to retry or abort on.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
