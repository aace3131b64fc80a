//! Encoder stack.
//!
//! Layers are pre-norm: each sublayer reads a normalised copy of its input
//! and writes back through a dropout-guarded residual, so the raw stream
//! flows untouched from embedding to final norm.

use candle_core::{Error, Result, Tensor};
use candle_nn::{Dropout, VarBuilder};

use attention::MultiHeadAttention;
use layers::{FeedForward, LayerNorm};

use crate::config::ModelConfig;

/// One self-attention plus feed-forward block.
pub struct EncoderLayer {
    self_attn: MultiHeadAttention,
    feed_forward: FeedForward,
    norm_1: LayerNorm,
    norm_2: LayerNorm,
    dropout: Dropout,
}

impl EncoderLayer {
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        let self_attn =
            MultiHeadAttention::new(config.d_model, config.heads, config.dropout, vb.pp("self_attn"))
                .map_err(|e| Error::Msg(e.to_string()))?;
        let feed_forward =
            FeedForward::new(config.d_model, config.d_ff, config.dropout, vb.pp("feed_forward"))?;
        let norm_1 = LayerNorm::new(config.d_model, vb.pp("norm_1"))?;
        let norm_2 = LayerNorm::new(config.d_model, vb.pp("norm_2"))?;
        Ok(Self {
            self_attn,
            feed_forward,
            norm_1,
            norm_2,
            dropout: Dropout::new(config.dropout),
        })
    }

    pub fn forward(&self, x: &Tensor, src_mask: Option<&Tensor>, train: bool) -> Result<Tensor> {
        let normed = self.norm_1.forward(x)?;
        let attended = self
            .self_attn
            .forward(&normed, &normed, &normed, src_mask, train)
            .map_err(|e| Error::Msg(e.to_string()))?;
        let x = (x + self.dropout.forward(&attended, train)?)?;

        let normed = self.norm_2.forward(&x)?;
        let fed = self.feed_forward.forward(&normed, train)?;
        &x + self.dropout.forward(&fed, train)?
    }
}

/// `n_layers` encoder layers with independent parameters, closed by a
/// final norm.
pub struct Encoder {
    layers: Vec<EncoderLayer>,
    norm: LayerNorm,
}

impl Encoder {
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        let mut layers = Vec::with_capacity(config.n_layers);
        for index in 0..config.n_layers {
            layers.push(EncoderLayer::new(config, vb.pp(format!("layer_{index}")))?);
        }
        let norm = LayerNorm::new(config.d_model, vb.pp("norm"))?;
        Ok(Self { layers, norm })
    }

    pub fn forward(&self, x: &Tensor, src_mask: Option<&Tensor>, train: bool) -> Result<Tensor> {
        let mut x = x.clone();
        for layer in &self.layers {
            x = layer.forward(&x, src_mask, train)?;
        }
        self.norm.forward(&x)
    }
}
