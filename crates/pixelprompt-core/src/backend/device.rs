use std::fmt;

use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::{DType, Device};
use tracing::{info, warn};

/// The compute device picked at startup, with the precision used on it.
#[derive(Debug, Clone)]
pub struct ComputeDevice {
    device: Device,
    dtype: DType,
}

impl ComputeDevice {
    /// GPU when one is usable (CUDA, then Metal), CPU otherwise.
    ///
    /// GPUs run in half precision, the CPU in full precision.
    pub fn select(force_cpu: bool) -> Self {
        if force_cpu {
            info!("CPU forced by configuration");
            return Self::cpu();
        }

        if cuda_is_available() {
            match Device::new_cuda(0) {
                Ok(device) => return Self::gpu(device),
                Err(e) => warn!("CUDA reported available but failed to open: {}", e),
            }
        }

        if metal_is_available() {
            match Device::new_metal(0) {
                Ok(device) => return Self::gpu(device),
                Err(e) => warn!("Metal reported available but failed to open: {}", e),
            }
        }

        Self::cpu()
    }

    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
            dtype: DType::F32,
        }
    }

    fn gpu(device: Device) -> Self {
        Self {
            device,
            dtype: DType::F16,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn is_gpu(&self) -> bool {
        !self.device.is_cpu()
    }

    pub fn name(&self) -> &'static str {
        if self.device.is_cuda() {
            "cuda"
        } else if self.device.is_metal() {
            "metal"
        } else {
            "cpu"
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.name(), self.dtype)
    }
}
