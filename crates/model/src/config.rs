//! Model hyperparameters.

use candle_core::{Error, Result};
use serde::{Deserialize, Serialize};

fn default_d_model() -> usize {
    512
}
fn default_n_layers() -> usize {
    6
}
fn default_heads() -> usize {
    8
}
fn default_d_ff() -> usize {
    2048
}
fn default_dropout() -> f32 {
    0.1
}

/// Everything needed to build a transformer, loadable from JSON.
///
/// Vocabulary and sequence-length fields are mandatory; the architecture
/// fields fall back to the base-model sizes when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub src_vocab_size: usize,
    pub tgt_vocab_size: usize,
    pub src_seq_len: usize,
    pub tgt_seq_len: usize,
    #[serde(default = "default_d_model")]
    pub d_model: usize,
    #[serde(default = "default_n_layers")]
    pub n_layers: usize,
    #[serde(default = "default_heads")]
    pub heads: usize,
    #[serde(default = "default_d_ff")]
    pub d_ff: usize,
    #[serde(default = "default_dropout")]
    pub dropout: f32,
}

impl ModelConfig {
    /// Base-model architecture over the given vocabularies and lengths.
    pub fn new(
        src_vocab_size: usize,
        tgt_vocab_size: usize,
        src_seq_len: usize,
        tgt_seq_len: usize,
    ) -> Self {
        Self {
            src_vocab_size,
            tgt_vocab_size,
            src_seq_len,
            tgt_seq_len,
            d_model: default_d_model(),
            n_layers: default_n_layers(),
            heads: default_heads(),
            d_ff: default_d_ff(),
            dropout: default_dropout(),
        }
    }

    /// Rejects configurations no layer could be built from. Run this before
    /// allocating any parameters.
    pub fn validate(&self) -> Result<()> {
        if self.src_vocab_size == 0 || self.tgt_vocab_size == 0 {
            return Err(Error::Msg("config: vocabulary sizes must be non-zero".into()));
        }
        if self.src_seq_len == 0 || self.tgt_seq_len == 0 {
            return Err(Error::Msg("config: sequence lengths must be non-zero".into()));
        }
        if self.n_layers == 0 {
            return Err(Error::Msg("config: n_layers must be non-zero".into()));
        }
        if self.heads == 0 || self.d_model % self.heads != 0 {
            return Err(Error::Msg(format!(
                "config: d_model {} must divide evenly over {} heads",
                self.d_model, self.heads
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::Msg(format!(
                "config: dropout {} outside [0, 1)",
                self.dropout
            )));
        }
        Ok(())
    }
}
