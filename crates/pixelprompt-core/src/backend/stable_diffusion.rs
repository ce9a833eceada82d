//! Stable Diffusion v1.5 on candle
//!
//! Weights come from the Hugging Face hub on first use and are cached by
//! `hf-hub`. The text encoder, UNet and VAE are built once; a scheduler is
//! built fresh for every call since stepping mutates it.

use std::path::PathBuf;
use std::time::Instant;

use candle_core::{DType, Device, IndexOp, Module, Tensor};
use candle_transformers::models::stable_diffusion::{
    clip::ClipTextTransformer, unet_2d::UNet2DConditionModel, vae::AutoEncoderKL,
    StableDiffusionConfig,
};
use hf_hub::api::sync::Api;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use super::{ComputeDevice, Generator};
use crate::config::Config;
use crate::error::GenerationError;
use crate::picture::{GeneratedImage, IMAGE_SIZE};
use crate::prompt::Prompt;

const TOKENIZER_REPO: &str = "openai/clip-vit-base-patch32";
const END_OF_TEXT: &str = "<|endoftext|>";
const VAE_SCALE: f64 = 0.18215;
const LATENT_CHANNELS: usize = 4;

/// Local paths of every file the pipeline needs.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub tokenizer: PathBuf,
    pub clip: PathBuf,
    pub unet: PathBuf,
    pub vae: PathBuf,
}

impl ModelFiles {
    /// Download (or reuse the cached copy of) the weights for `repo`.
    ///
    /// Half-precision checkpoints are used when the device runs in f16.
    pub fn fetch(repo: &str, half_precision: bool) -> Result<Self, GenerationError> {
        let api = Api::new()?;
        let suffix = if half_precision { ".fp16.safetensors" } else { ".safetensors" };

        info!("Fetching tokenizer from {}", TOKENIZER_REPO);
        let tokenizer = api.model(TOKENIZER_REPO.to_string()).get("tokenizer.json")?;

        let model = api.model(repo.to_string());
        info!("Fetching text encoder, UNet and VAE from {}", repo);
        let clip = model.get(&format!("text_encoder/model{}", suffix))?;
        let unet = model.get(&format!("unet/diffusion_pytorch_model{}", suffix))?;
        let vae = model.get(&format!("vae/diffusion_pytorch_model{}", suffix))?;

        Ok(Self { tokenizer, clip, unet, vae })
    }
}

pub struct StableDiffusion {
    repo: String,
    device: ComputeDevice,
    sd_config: StableDiffusionConfig,
    tokenizer: Tokenizer,
    pad_id: u32,
    text_model: ClipTextTransformer,
    unet: UNet2DConditionModel,
    vae: AutoEncoderKL,
    steps: usize,
    seed: Option<u64>,
}

impl StableDiffusion {
    /// Fetch the weights named by `config` and build the pipeline on `device`.
    pub fn load(config: &Config, device: ComputeDevice) -> Result<Self, GenerationError> {
        let files = ModelFiles::fetch(config.model_repo(), device.is_gpu())?;
        Self::from_files(config, device, &files)
    }

    pub fn from_files(
        config: &Config,
        device: ComputeDevice,
        files: &ModelFiles,
    ) -> Result<Self, GenerationError> {
        let started = Instant::now();
        let size = IMAGE_SIZE as usize;
        let sd_config = StableDiffusionConfig::v1_5(None, Some(size), Some(size));

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| GenerationError::Tokenizer(e.to_string()))?;
        let pad_token = sd_config.clip.pad_with.as_deref().unwrap_or(END_OF_TEXT);
        let pad_id = *tokenizer.get_vocab(true).get(pad_token).ok_or_else(|| {
            GenerationError::Tokenizer(format!("vocabulary has no {} token", pad_token))
        })?;

        // The text encoder stays in f32; its output is cast before the UNet.
        let text_model = candle_transformers::models::stable_diffusion::build_clip_transformer(
            &sd_config.clip,
            &files.clip,
            device.device(),
            DType::F32,
        )?;
        let vae = sd_config.build_vae(&files.vae, device.device(), device.dtype())?;
        let unet = sd_config.build_unet(
            &files.unet,
            device.device(),
            LATENT_CHANNELS,
            false,
            device.dtype(),
        )?;

        info!(
            "Loaded {} on {} in {:.1}s",
            config.model_repo(),
            device,
            started.elapsed().as_secs_f32()
        );

        Ok(Self {
            repo: config.model_repo().to_string(),
            device,
            sd_config,
            tokenizer,
            pad_id,
            text_model,
            unet,
            vae,
            steps: config.steps(),
            seed: config.seed,
        })
    }

    /// CLIP embedding of `text`, padded (or truncated) to the encoder's
    /// fixed context length.
    fn embed(&self, text: &str) -> Result<Tensor, GenerationError> {
        let max_len = self.sd_config.clip.max_position_embeddings;
        let mut tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| GenerationError::Tokenizer(e.to_string()))?
            .get_ids()
            .to_vec();

        if tokens.len() > max_len {
            warn!(
                "Prompt has {} tokens, truncating to the {} the text encoder accepts",
                tokens.len(),
                max_len
            );
            tokens.truncate(max_len - 1);
            tokens.push(self.pad_id);
        }
        tokens.resize(max_len, self.pad_id);

        let tokens = Tensor::new(tokens.as_slice(), self.device.device())?.unsqueeze(0)?;
        Ok(self.text_model.forward(&tokens)?)
    }
}

impl Generator for StableDiffusion {
    fn generate(&self, prompt: &Prompt, guidance_scale: f64) -> Result<GeneratedImage, GenerationError> {
        let started = Instant::now();
        let dtype = self.device.dtype();
        let device = self.device.device();

        let cond = self.embed(prompt.as_str())?;
        let uncond = self.embed("")?;
        let text_embeddings = Tensor::cat(&[uncond, cond], 0)?.to_dtype(dtype)?;

        let mut scheduler = self.sd_config.build_scheduler(self.steps)?;
        let timesteps = scheduler.timesteps().to_vec();

        let seed = self.seed.unwrap_or_else(rand::random);
        debug!(seed, steps = timesteps.len(), "Sampling latents");
        let latent_shape = (
            1,
            LATENT_CHANNELS,
            self.sd_config.height / 8,
            self.sd_config.width / 8,
        );
        let latents = gaussian_noise(seed, latent_shape, device)?;
        let mut latents = (latents * scheduler.init_noise_sigma())?.to_dtype(dtype)?;

        for (index, &timestep) in timesteps.iter().enumerate() {
            let model_input = Tensor::cat(&[&latents, &latents], 0)?;
            let model_input = scheduler.scale_model_input(model_input, timestep)?;
            let noise_pred = self.unet.forward(&model_input, timestep as f64, &text_embeddings)?;

            let chunks = noise_pred.chunk(2, 0)?;
            let (noise_uncond, noise_text) = match chunks.as_slice() {
                [uncond, text] => (uncond, text),
                _ => {
                    return Err(GenerationError::InvalidOutput(format!(
                        "expected 2 guidance chunks, got {}",
                        chunks.len()
                    )))
                }
            };
            let guided = (noise_uncond + ((noise_text - noise_uncond)? * guidance_scale)?)?;
            latents = scheduler.step(&guided, timestep, &latents)?;

            debug!("Denoising step {}/{}", index + 1, timesteps.len());
        }

        let decoded = self.vae.decode(&(&latents / VAE_SCALE)?)?;
        let decoded = ((decoded / 2.)? + 0.5)?.to_device(&Device::Cpu)?;
        let decoded = (decoded.clamp(0f32, 1.)? * 255.)?.to_dtype(DType::U8)?.i(0)?;
        let image = tensor_to_image(&decoded)?;

        info!(
            "Generated {}x{} image ({} chars of prompt, {} steps, seed {}) in {:.1}s",
            image.width(),
            image.height(),
            prompt.as_str().chars().count(),
            timesteps.len(),
            seed,
            started.elapsed().as_secs_f32()
        );
        Ok(image)
    }

    fn description(&self) -> String {
        format!("{} on {}", self.repo, self.device)
    }
}

/// Standard normal noise from a seeded generator, so a fixed seed gives the
/// same image on every device.
fn gaussian_noise(
    seed: u64,
    shape: (usize, usize, usize, usize),
    device: &Device,
) -> Result<Tensor, GenerationError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let count = shape.0 * shape.1 * shape.2 * shape.3;
    let values: Vec<f32> = (0..count).map(|_| rng.sample(StandardNormal)).collect();

    Ok(Tensor::from_vec(values, shape, device)?)
}

/// Convert a (3, height, width) u8 tensor into an RGB image.
fn tensor_to_image(tensor: &Tensor) -> Result<GeneratedImage, GenerationError> {
    let (channels, height, width) = tensor.dims3()?;
    if channels != 3 {
        return Err(GenerationError::InvalidOutput(format!(
            "expected 3 channels, got {}",
            channels
        )));
    }
    let data = tensor.permute((1, 2, 0))?.flatten_all()?.to_vec1::<u8>()?;
    GeneratedImage::from_rgb(width as u32, height as u32, data)
}
