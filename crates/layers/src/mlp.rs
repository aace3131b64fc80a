//! Position-wise feed-forward block.
//!
//! Expands the model width to `d_ff`, rectifies, applies dropout while
//! training, and contracts back to `d_model`. Positions never interact.

use candle_core::{Module, Result, Tensor};
use candle_nn::{Dropout, Linear, VarBuilder};

use crate::linear::linear;

/// Two-projection MLP with a ReLU in between.
#[derive(Debug, Clone)]
pub struct FeedForward {
    linear_1: Linear,
    linear_2: Linear,
    dropout: Dropout,
}

impl FeedForward {
    pub fn new(d_model: usize, d_ff: usize, dropout: f32, vb: VarBuilder) -> Result<Self> {
        let linear_1 = linear(d_model, d_ff, vb.pp("linear_1"))?;
        let linear_2 = linear(d_ff, d_model, vb.pp("linear_2"))?;
        Ok(Self {
            linear_1,
            linear_2,
            dropout: Dropout::new(dropout),
        })
    }

    /// Dropout is identity when `train` is false.
    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let x = self.linear_1.forward(x)?.relu()?;
        let x = self.dropout.forward(&x, train)?;
        self.linear_2.forward(&x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};
    use candle_nn::{VarBuilder, VarMap};

    #[test]
    fn preserves_hidden_shape() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let ff = FeedForward::new(8, 32, 0.1, vb)?;

        let input = Tensor::rand(-1.0f32, 1.0f32, (2, 5, 8), &device)?;
        let output = ff.forward(&input, false)?;
        assert_eq!(output.dims(), input.dims());
        Ok(())
    }

    #[test]
    fn inference_is_deterministic() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let ff = FeedForward::new(4, 16, 0.5, vb)?;

        let input = Tensor::rand(-1.0f32, 1.0f32, (1, 3, 4), &device)?;
        let first = ff.forward(&input, false)?.flatten_all()?.to_vec1::<f32>()?;
        let second = ff.forward(&input, false)?.flatten_all()?.to_vec1::<f32>()?;
        assert_eq!(first, second);
        Ok(())
    }
}
