//! Fake backend and helpers shared by the shell's tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use pixelprompt_core::{Config, GeneratedImage, GenerationError, Generator, Prompt};

use crate::app::App;

/// Returns a solid image whose red channel counts the calls, or fails
/// when the prompt contains "fail".
pub struct CountingBackend {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::slow(Duration::ZERO)
    }

    /// Sleeps for `delay` before answering, like a model sampling on CPU.
    pub fn slow(delay: Duration) -> Self {
        Self { calls: AtomicUsize::new(0), delay }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Generator for CountingBackend {
    fn generate(&self, prompt: &Prompt, _guidance_scale: f64) -> Result<GeneratedImage, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if prompt.as_str().contains("fail") {
            return Err(GenerationError::Backend("out of memory".to_string()));
        }
        Ok(GeneratedImage::new(RgbImage::from_pixel(32, 32, Rgb([n as u8, 0, 0]))))
    }

    fn description(&self) -> String {
        "counting on test".to_string()
    }
}

pub fn test_app() -> (App, Arc<CountingBackend>) {
    app_with(CountingBackend::new())
}

pub fn app_with(backend: CountingBackend) -> (App, Arc<CountingBackend>) {
    let backend = Arc::new(backend);
    let app = App::new(backend.clone(), Config::new(), None);
    (app, backend)
}

pub async fn wait_for_generation(app: &mut App) {
    for _ in 0..500 {
        app.poll_generation().await;
        if app.generation_task.is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("generation did not finish");
}
