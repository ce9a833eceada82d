use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbImage;
use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use tracing::warn;

use pixelprompt_core::{
    Config, GeneratedImage, GenerationError, Generator, Notice, Session, DISPLAY_SIZE,
    GUIDANCE_SCALE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Prompt,
    SaveDialog,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Prompt input
    pub prompt_input: String,
    pub prompt_cursor: usize, // cursor position in prompt_input (chars)

    // Generation
    pub session: Session,
    pub backend: Arc<dyn Generator>,
    pub backend_label: String,
    pub generation_task: Option<JoinHandle<Result<GeneratedImage, GenerationError>>>,
    pending_prompt: Option<String>,

    // What the display surface shows
    pub display: Option<RgbImage>,
    pub caption: Option<String>,

    // Blocking message popup
    pub notice: Option<Notice>,

    // Save dialog state
    pub save_input: String,
    pub save_cursor: usize,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Button areas for mouse hit-testing (updated during render)
    pub generate_button: Option<Rect>,
    pub download_button: Option<Rect>,

    pub config: Config,
    config_path: Option<PathBuf>,
}

impl App {
    /// `config_path` is where preference changes are written back; `None`
    /// keeps them in memory only.
    pub fn new(backend: Arc<dyn Generator>, config: Config, config_path: Option<PathBuf>) -> Self {
        let backend_label = backend.description();

        Self {
            should_quit: false,
            input_mode: InputMode::Prompt,

            prompt_input: String::new(),
            prompt_cursor: 0,

            session: Session::new(),
            backend,
            backend_label,
            generation_task: None,
            pending_prompt: None,

            display: None,
            caption: None,

            notice: None,

            save_input: String::new(),
            save_cursor: 0,

            animation_frame: 0,

            generate_button: None,
            download_button: None,

            config,
            config_path,
        }
    }

    pub fn is_generating(&self) -> bool {
        self.session.is_generating()
    }

    /// "Generate" action: validate the prompt and run the backend on a
    /// blocking task. Ignored while a generation is already running.
    pub fn start_generation(&mut self) {
        if self.generation_task.is_some() {
            return;
        }

        match self.session.begin_generation(&self.prompt_input) {
            Ok(prompt) => {
                self.pending_prompt = Some(prompt.to_string());
                self.animation_frame = 0;

                let backend = Arc::clone(&self.backend);
                self.generation_task = Some(tokio::task::spawn_blocking(move || {
                    backend.generate(&prompt, GUIDANCE_SCALE)
                }));
            }
            Err(notice) => self.notice = Some(notice),
        }
    }

    /// Collect the generation result once the task has finished.
    pub async fn poll_generation(&mut self) {
        let finished = self
            .generation_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        let Some(task) = self.generation_task.take() else {
            return;
        };
        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(GenerationError::Task(e.to_string())),
        };

        let prompt = self.pending_prompt.take();
        match self.session.finish_generation(result) {
            Some(notice) => self.notice = Some(notice),
            None => {
                self.display = self.session.current().map(|image| image.to_display(DISPLAY_SIZE));
                self.caption = prompt;
            }
        }
    }

    /// "Download" action: show the save dialog, or the "no image" notice.
    pub fn open_save_dialog(&mut self) {
        if self.is_generating() {
            return;
        }

        match self.session.request_save() {
            Ok(_) => {
                self.save_input = self.config.default_save_path().display().to_string();
                self.save_cursor = self.save_input.chars().count();
                self.input_mode = InputMode::SaveDialog;
            }
            Err(notice) => self.notice = Some(notice),
        }
    }

    /// Write the current image to the path typed in the save dialog.
    /// An empty path behaves like cancelling.
    pub fn confirm_save(&mut self) {
        self.input_mode = InputMode::Prompt;
        let raw = self.save_input.trim().to_string();
        self.save_input.clear();
        self.save_cursor = 0;
        if raw.is_empty() {
            return;
        }

        let (notice, written) = self.session.save_to(Path::new(&raw));
        if let Some(dir) = written.as_deref().and_then(Path::parent) {
            self.remember_save_dir(dir);
        }
        self.notice = Some(notice);
    }

    pub fn cancel_save(&mut self) {
        self.input_mode = InputMode::Prompt;
        self.save_input.clear();
        self.save_cursor = 0;
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_generating() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    fn remember_save_dir(&mut self, dir: &Path) {
        let dir = if dir.as_os_str().is_empty() {
            match std::env::current_dir() {
                Ok(cwd) => cwd,
                Err(_) => return,
            }
        } else {
            dir.to_path_buf()
        };

        match &self.config_path {
            Some(path) => {
                if let Err(e) = self.config.save_last_save_dir(&dir, path) {
                    warn!("Could not persist last save directory: {}", e);
                }
            }
            None => self.config.last_save_dir = Some(dir),
        }
    }
}
