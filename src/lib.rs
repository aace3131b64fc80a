//! Translation front end over the transformer workspace.
//!
//! Re-exports the pieces the `translate` binary wires together and provides
//! the vocabulary adapter plus device selection.

pub mod vocab;

use anyhow::Result;
use candle_core::Device;

pub use vocab::{Vocabulary, EOS_TOKEN, PAD_TOKEN, SOS_TOKEN, UNK_TOKEN};

/// Picks CUDA when present, CPU otherwise. `FORCE_CPU` in the environment
/// skips the GPU probe entirely.
pub fn setup_device() -> Result<Device> {
    if std::env::var("FORCE_CPU").is_ok() {
        log::info!("FORCE_CPU set, using CPU");
        return Ok(Device::Cpu);
    }
    let device = Device::cuda_if_available(0)?;
    if device.is_cuda() {
        log::info!("using CUDA device 0");
    } else {
        log::info!("no CUDA device available, using CPU");
    }
    Ok(device)
}
