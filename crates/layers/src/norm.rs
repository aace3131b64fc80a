//! Layer normalisation with learnable scale and bias.
//!
//! The forward pass computes `(x - mean) / (std + eps) * scale + bias` where
//! the statistics cover the feature axis of each position only, never the
//! batch or sequence axes. Note the epsilon sits next to the standard
//! deviation, not under the square root.

use candle_core::{Result, Tensor, D};
use candle_nn::{init::Init, VarBuilder};

use crate::checks;

/// Stabiliser keeping the division finite for near-constant inputs.
pub const DEFAULT_EPS: f64 = 1e-6;

/// Per-position normalisation over the feature axis.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    scale: Tensor,
    bias: Tensor,
    eps: f64,
    size: usize,
}

impl LayerNorm {
    /// Builds a layer norm over `d_model` features with the default epsilon.
    pub fn new(d_model: usize, vb: VarBuilder) -> Result<Self> {
        Self::with_eps(d_model, DEFAULT_EPS, vb)
    }

    /// Builds a layer norm with an explicit epsilon. `scale` starts at one
    /// and `bias` at zero, so a fresh layer is a pure normaliser.
    pub fn with_eps(d_model: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        let scale = vb.get_with_hints(d_model, "scale", Init::Const(1.0))?;
        let bias = vb.get_with_hints(d_model, "bias", Init::Const(0.0))?;
        Ok(Self {
            scale,
            bias,
            eps,
            size: d_model,
        })
    }

    /// Normalises and applies the learned affine pair.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        checks::expect_hidden("layer_norm.input", x, self.size)?;
        let normalized = self.normalize(x)?;
        normalized
            .broadcast_mul(&self.scale)?
            .broadcast_add(&self.bias)
    }

    /// The affine-free part of the forward pass. Each position of the output
    /// has mean ~0 and standard deviation ~1 over the feature axis.
    ///
    /// The standard deviation is the population form (divides by n);
    /// Bessel-corrected formulations differ by a factor of sqrt(n/(n-1)),
    /// negligible at realistic feature widths.
    pub fn normalize(&self, x: &Tensor) -> Result<Tensor> {
        let mean = x.mean_keepdim(D::Minus1)?;
        let centered = x.broadcast_sub(&mean)?;
        let std = centered.sqr()?.mean_keepdim(D::Minus1)?.sqrt()?;
        let denom = (std + self.eps)?;
        centered.broadcast_div(&denom)
    }
}
