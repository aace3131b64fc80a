//! Weight persistence over safetensors.
//!
//! Parameter names are the hierarchical `VarBuilder` paths, so a checkpoint
//! only loads back into a model built from the same configuration.

use std::path::Path;

use candle_core::{Error, Result};
use candle_nn::VarMap;

pub fn save_weights<P: AsRef<Path>>(varmap: &VarMap, path: P) -> Result<()> {
    varmap.save(path.as_ref())?;
    log::info!("saved weights to {}", path.as_ref().display());
    Ok(())
}

pub fn load_weights<P: AsRef<Path>>(varmap: &mut VarMap, path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::Msg(format!(
            "checkpoint {} does not exist",
            path.display()
        )));
    }
    varmap.load(path)?;
    log::info!("loaded weights from {}", path.display());
    Ok(())
}
