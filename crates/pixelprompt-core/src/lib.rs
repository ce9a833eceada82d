pub mod backend;
pub mod config;
pub mod error;
pub mod picture;
pub mod prompt;
pub mod session;

// Re-export main types for convenience
pub use backend::{ComputeDevice, Generator, StableDiffusion};
pub use config::Config;
pub use error::{GenerationError, SaveError, ValidationError};
pub use picture::{GeneratedImage, DISPLAY_SIZE, GUIDANCE_SCALE, IMAGE_SIZE};
pub use prompt::Prompt;
pub use session::{Notice, NoticeLevel, Session, SessionState};
