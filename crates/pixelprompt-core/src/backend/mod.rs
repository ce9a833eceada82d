//! Generation backends
//!
//! A backend turns one validated prompt into one image. It is constructed
//! once at startup and shared by reference for the rest of the process;
//! every call is independent of the previous ones.

pub mod device;
pub mod stable_diffusion;

pub use device::ComputeDevice;
pub use stable_diffusion::StableDiffusion;

use crate::error::GenerationError;
use crate::picture::GeneratedImage;
use crate::prompt::Prompt;

pub trait Generator: Send + Sync {
    /// Render exactly one image for `prompt`. Blocks until sampling is done.
    fn generate(&self, prompt: &Prompt, guidance_scale: f64) -> Result<GeneratedImage, GenerationError>;

    /// Short label for status displays, e.g. the model and device in use.
    fn description(&self) -> String;
}
