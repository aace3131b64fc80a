//! Sinusoidal positional encoding.
//!
//! The table is computed once at construction and never trained. Even
//! feature indices carry `sin(pos / 10000^(2i/d_model))`, odd indices the
//! matching cosine, so every position gets a unique, smoothly varying
//! signature.

use candle_core::{Device, Error, Result, Tensor};
use candle_nn::Dropout;

#[derive(Debug, Clone)]
pub struct PositionalEncoding {
    table: Tensor,
    dropout: Dropout,
    max_len: usize,
    d_model: usize,
}

impl PositionalEncoding {
    /// Precomputes encodings for positions `0..max_len`.
    pub fn new(d_model: usize, max_len: usize, dropout: f32, device: &Device) -> Result<Self> {
        if max_len == 0 {
            return Err(Error::Msg("positional_encoding: max_len must be non-zero".into()));
        }
        let mut data = vec![0f32; max_len * d_model];
        for pos in 0..max_len {
            for i in 0..d_model {
                let pair = (i / 2) * 2;
                let denom = 10000f64.powf(pair as f64 / d_model as f64);
                let angle = pos as f64 / denom;
                data[pos * d_model + i] = if i % 2 == 0 {
                    angle.sin() as f32
                } else {
                    angle.cos() as f32
                };
            }
        }
        let table = Tensor::from_vec(data, (1, max_len, d_model), device)?;
        Ok(Self {
            table,
            dropout: Dropout::new(dropout),
            max_len,
            d_model,
        })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Adds the first `seq` rows of the table to `x` and applies dropout
    /// when training. Sequences longer than `max_len` are an error.
    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        layers::checks::expect_hidden("positional_encoding.input", x, self.d_model)?;
        let (_, seq, _) = x.dims3()?;
        if seq > self.max_len {
            return Err(Error::Msg(format!(
                "positional_encoding: sequence of {seq} exceeds max_len {}",
                self.max_len
            )));
        }
        let slice = self.table.narrow(1, 0, seq)?;
        let x = x.broadcast_add(&slice)?;
        self.dropout.forward(&x, train)
    }
}
