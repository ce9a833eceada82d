//! UI-agnostic session state
//!
//! The session owns the single "current image" slot and turns every user
//! action into at most one [`Notice`] for the shell to show. It does not
//! know how the shell draws anything, so the TUI and tests drive it the
//! same way.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::backend::Generator;
use crate::error::{GenerationError, SaveError, ValidationError};
use crate::picture::{GeneratedImage, GUIDANCE_SCALE};
use crate::prompt::Prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Generating,
    HasImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A blocking, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: &'static str,
    pub message: String,
}

impl Notice {
    pub fn invalid_prompt(_err: &ValidationError) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "Input Error",
            message: "Please enter a prompt!".to_string(),
        }
    }

    pub fn generation_failed(err: &GenerationError) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "Error",
            message: format!("Image generation failed:\n{}", err),
        }
    }

    pub fn busy() -> Self {
        Self {
            level: NoticeLevel::Info,
            title: "Busy",
            message: "An image is already being generated.".to_string(),
        }
    }

    pub fn no_image() -> Self {
        Self {
            level: NoticeLevel::Info,
            title: "No Image",
            message: "Please generate an image first.".to_string(),
        }
    }

    pub fn saved(path: &Path) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: "Success",
            message: format!("Image saved at:\n{}", path.display()),
        }
    }

    pub fn save_failed(err: &SaveError) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "Save Error",
            message: format!("Failed to save image:\n{}", err),
        }
    }
}

#[derive(Debug, Default)]
pub struct Session {
    current: Option<GeneratedImage>,
    generating: bool,
    generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        if self.generating {
            SessionState::Generating
        } else if self.current.is_some() {
            SessionState::HasImage
        } else {
            SessionState::Idle
        }
    }

    pub fn current(&self) -> Option<&GeneratedImage> {
        self.current.as_ref()
    }

    /// Number of times the current image has been replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Validate `raw` and enter the generating state.
    ///
    /// On error nothing changes and the backend must not be called.
    pub fn begin_generation(&mut self, raw: &str) -> Result<Prompt, Notice> {
        if self.generating {
            return Err(Notice::busy());
        }
        let prompt = Prompt::parse(raw).map_err(|e| Notice::invalid_prompt(&e))?;
        self.generating = true;
        info!("Generating image for prompt: {}", prompt);
        Ok(prompt)
    }

    /// Apply the backend's answer. A failure keeps whatever was shown before.
    pub fn finish_generation(
        &mut self,
        result: Result<GeneratedImage, GenerationError>,
    ) -> Option<Notice> {
        self.generating = false;
        match result {
            Ok(image) => {
                self.current = Some(image);
                self.generation += 1;
                None
            }
            Err(e) => {
                warn!("Image generation failed: {}", e);
                Some(Notice::generation_failed(&e))
            }
        }
    }

    /// Validate, call the backend on the current thread, and apply the result.
    pub fn generate(&mut self, backend: &dyn Generator, raw: &str) -> Option<Notice> {
        match self.begin_generation(raw) {
            Ok(prompt) => {
                let result = backend.generate(&prompt, GUIDANCE_SCALE);
                self.finish_generation(result)
            }
            Err(notice) => Some(notice),
        }
    }

    /// The image to save, or the "no image" notice when there is none yet.
    pub fn request_save(&self) -> Result<&GeneratedImage, Notice> {
        self.current.as_ref().ok_or_else(Notice::no_image)
    }

    /// Write the current image as PNG. Returns the notice to show and, on
    /// success, the path that was written.
    pub fn save_to(&self, path: &Path) -> (Notice, Option<PathBuf>) {
        let image = match self.request_save() {
            Ok(image) => image,
            Err(notice) => return (notice, None),
        };
        match image.save_png(path) {
            Ok(written) => {
                info!("Saved image to {}", written.display());
                (Notice::saved(&written), Some(written))
            }
            Err(e) => {
                warn!("Saving image to {} failed: {}", path.display(), e);
                (Notice::save_failed(&e), None)
            }
        }
    }
}
