//! Token id to vector lookup.

use candle_core::{DType, Error, Module, Result, Tensor};
use candle_nn::{init::Init, Embedding, VarBuilder};

/// Embedding table whose outputs are scaled by `sqrt(d_model)`.
///
/// The scaling keeps embedded magnitudes comparable to the positional
/// signal added right after.
#[derive(Debug, Clone)]
pub struct TokenEmbedding {
    inner: Embedding,
    vocab_size: usize,
    scale: f64,
}

impl TokenEmbedding {
    pub fn new(vocab_size: usize, d_model: usize, vb: VarBuilder) -> Result<Self> {
        if vocab_size == 0 {
            return Err(Error::Msg("token_embedding: vocab_size must be non-zero".into()));
        }
        let bound = (6.0 / (vocab_size + d_model) as f64).sqrt();
        let weight = vb.get_with_hints(
            (vocab_size, d_model),
            "weight",
            Init::Uniform {
                lo: -bound,
                up: bound,
            },
        )?;
        Ok(Self {
            inner: Embedding::new(weight, d_model),
            vocab_size,
            scale: (d_model as f64).sqrt(),
        })
    }

    /// Maps `(batch, seq)` integer ids to `(batch, seq, d_model)` vectors.
    /// Ids at or past `vocab_size` are rejected up front rather than left
    /// for the backend gather to trip over.
    pub fn forward(&self, token_ids: &Tensor) -> Result<Tensor> {
        layers::checks::expect_token_ids("token_embedding.input", token_ids)?;
        let ids = token_ids.to_dtype(DType::U32)?;
        let max_id = ids.max_all()?.to_scalar::<u32>()?;
        if max_id as usize >= self.vocab_size {
            return Err(Error::Msg(format!(
                "token_embedding: id {max_id} out of range for vocab of {}",
                self.vocab_size
            )));
        }
        let embedded = self.inner.forward(&ids)?;
        embedded * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};
    use candle_nn::{VarBuilder, VarMap};

    fn build(vocab: usize, d_model: usize, device: &Device) -> Result<TokenEmbedding> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        TokenEmbedding::new(vocab, d_model, vb)
    }

    #[test]
    fn embeds_to_model_width() -> Result<()> {
        let device = Device::Cpu;
        let embedding = build(10, 6, &device)?;
        let ids = Tensor::new(&[[0u32, 3, 9], [1, 1, 1]], &device)?;
        let out = embedding.forward(&ids)?;
        assert_eq!(out.dims(), &[2, 3, 6]);
        Ok(())
    }

    #[test]
    fn identical_ids_share_a_vector() -> Result<()> {
        let device = Device::Cpu;
        let embedding = build(10, 4, &device)?;
        let ids = Tensor::new(&[[2u32, 2]], &device)?;
        let rows = embedding.forward(&ids)?.squeeze(0)?.to_vec2::<f32>()?;
        assert_eq!(rows[0], rows[1]);
        Ok(())
    }

    #[test]
    fn output_is_scaled_by_sqrt_d_model() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let embedding = TokenEmbedding::new(5, 16, vb)?;

        let raw = varmap.all_vars()[0].as_tensor().narrow(0, 3, 1)?.to_vec2::<f32>()?;
        let ids = Tensor::new(&[[3u32]], &device)?;
        let out = embedding.forward(&ids)?.squeeze(0)?.to_vec2::<f32>()?;
        for (r, o) in raw[0].iter().zip(&out[0]) {
            assert!((r * 4.0 - o).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_ids() -> Result<()> {
        let device = Device::Cpu;
        let embedding = build(4, 8, &device)?;
        let ids = Tensor::new(&[[0u32, 4]], &device)?;
        assert!(embedding.forward(&ids).is_err());
        Ok(())
    }
}
