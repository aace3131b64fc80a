//! Decoder stack.
//!
//! Same pre-norm residual discipline as the encoder, with a third sublayer:
//! cross-attention reading the encoder output. The target mask combines the
//! causal triangle with any target padding; the source mask applied during
//! cross-attention covers the encoder's key positions.

use candle_core::{Error, Result, Tensor};
use candle_nn::{Dropout, VarBuilder};

use attention::MultiHeadAttention;
use layers::{FeedForward, LayerNorm};

use crate::config::ModelConfig;

/// Masked self-attention, cross-attention, feed-forward.
pub struct DecoderLayer {
    self_attn: MultiHeadAttention,
    cross_attn: MultiHeadAttention,
    feed_forward: FeedForward,
    norm_1: LayerNorm,
    norm_2: LayerNorm,
    norm_3: LayerNorm,
    dropout: Dropout,
}

impl DecoderLayer {
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        let self_attn =
            MultiHeadAttention::new(config.d_model, config.heads, config.dropout, vb.pp("self_attn"))
                .map_err(|e| Error::Msg(e.to_string()))?;
        let cross_attn =
            MultiHeadAttention::new(config.d_model, config.heads, config.dropout, vb.pp("cross_attn"))
                .map_err(|e| Error::Msg(e.to_string()))?;
        let feed_forward =
            FeedForward::new(config.d_model, config.d_ff, config.dropout, vb.pp("feed_forward"))?;
        let norm_1 = LayerNorm::new(config.d_model, vb.pp("norm_1"))?;
        let norm_2 = LayerNorm::new(config.d_model, vb.pp("norm_2"))?;
        let norm_3 = LayerNorm::new(config.d_model, vb.pp("norm_3"))?;
        Ok(Self {
            self_attn,
            cross_attn,
            feed_forward,
            norm_1,
            norm_2,
            norm_3,
            dropout: Dropout::new(config.dropout),
        })
    }

    pub fn forward(
        &self,
        x: &Tensor,
        encoder_output: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let normed = self.norm_1.forward(x)?;
        let attended = self
            .self_attn
            .forward(&normed, &normed, &normed, tgt_mask, train)
            .map_err(|e| Error::Msg(e.to_string()))?;
        let x = (x + self.dropout.forward(&attended, train)?)?;

        let normed = self.norm_2.forward(&x)?;
        let attended = self
            .cross_attn
            .forward(&normed, encoder_output, encoder_output, src_mask, train)
            .map_err(|e| Error::Msg(e.to_string()))?;
        let x = (&x + self.dropout.forward(&attended, train)?)?;

        let normed = self.norm_3.forward(&x)?;
        let fed = self.feed_forward.forward(&normed, train)?;
        &x + self.dropout.forward(&fed, train)?
    }
}

/// `n_layers` decoder layers with independent parameters, closed by a
/// final norm.
pub struct Decoder {
    layers: Vec<DecoderLayer>,
    norm: LayerNorm,
}

impl Decoder {
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        let mut layers = Vec::with_capacity(config.n_layers);
        for index in 0..config.n_layers {
            layers.push(DecoderLayer::new(config, vb.pp(format!("layer_{index}")))?);
        }
        let norm = LayerNorm::new(config.d_model, vb.pp("norm"))?;
        Ok(Self { layers, norm })
    }

    pub fn forward(
        &self,
        x: &Tensor,
        encoder_output: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let mut x = x.clone();
        for layer in &self.layers {
            x = layer.forward(&x, encoder_output, src_mask, tgt_mask, train)?;
        }
        self.norm.forward(&x)
    }
}
