//! Error taxonomy shared by the backend and the session.
//!
//! Every variant is terminal for the action that raised it only; none of
//! them ends the session.

use std::path::PathBuf;
use thiserror::Error;

/// Rejected user input. Never reaches the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("prompt is empty")]
    EmptyPrompt,
}

/// Anything that goes wrong while loading or running the model.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to fetch model weights: {0}")]
    Weights(#[from] hf_hub::api::sync::ApiError),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("inference failed: {0}")]
    Inference(#[from] candle_core::Error),

    #[error("model returned an invalid image ({0})")]
    InvalidOutput(String),

    #[error("generation task failed: {0}")]
    Task(String),

    #[error("{0}")]
    Backend(String),
}

/// Failure while persisting the current image.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
