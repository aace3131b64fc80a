//! Multi-head scaled dot-product attention.
//!
//! [`scaled_dot_product`] is the head-level primitive working on
//! `(batch, heads, len, d_k)` tensors. [`MultiHeadAttention`] owns the four
//! projections, splits the model width across heads, and stitches the head
//! outputs back together.

pub mod errors;

use candle_core::{Module, Tensor};
use candle_nn::{ops, Linear, VarBuilder};
use layers::linear;

pub use errors::AttentionError;

type Result<T> = std::result::Result<T, AttentionError>;

/// Core attention over per-head tensors.
///
/// `q` is `(batch, heads, q_len, d_k)`; `k` and `v` are
/// `(batch, heads, k_len, d_k)`. An optional additive mask broadcasts
/// against the `(batch, heads, q_len, k_len)` score tensor. When
/// `dropout_p` is set, the post-softmax weights are dropped at that rate
/// before the value aggregation.
///
/// Returns the attended values and the pre-dropout attention weights.
pub fn scaled_dot_product(
    q: &Tensor,
    k: &Tensor,
    v: &Tensor,
    mask: Option<&Tensor>,
    dropout_p: Option<f32>,
) -> Result<(Tensor, Tensor)> {
    let (batch, heads, q_len, d_k) = q.dims4().map_err(|_| {
        AttentionError::invalid_shape(
            "scaled_dot_product.q",
            format!("expected (batch, heads, q_len, d_k), got {:?}", q.dims()),
        )
    })?;
    let (kb, kh, k_len, kd) = k.dims4().map_err(|_| {
        AttentionError::invalid_shape(
            "scaled_dot_product.k",
            format!("expected (batch, heads, k_len, d_k), got {:?}", k.dims()),
        )
    })?;
    if (kb, kh, kd) != (batch, heads, d_k) {
        return Err(AttentionError::invalid_shape(
            "scaled_dot_product.k",
            format!("keys {:?} do not line up with queries {:?}", k.dims(), q.dims()),
        ));
    }
    if v.dims() != k.dims() {
        return Err(AttentionError::invalid_shape(
            "scaled_dot_product.v",
            format!("values {:?} must match keys {:?}", v.dims(), k.dims()),
        ));
    }
    if let Some(mask) = mask {
        check_mask(mask, batch, heads, q_len, k_len)?;
    }

    // Merge batch and heads so the backend sees plain 3D matmuls.
    let q = q.reshape((batch * heads, q_len, d_k))?;
    let k = k.reshape((batch * heads, k_len, d_k))?;
    let v = v.reshape((batch * heads, k_len, d_k))?;

    let scale = 1.0 / (d_k as f64).sqrt();
    let scores = (q.matmul(&k.transpose(1, 2)?.contiguous()?)? * scale)?;
    let scores = scores.reshape((batch, heads, q_len, k_len))?;

    let scores = match mask {
        Some(mask) => scores.broadcast_add(mask)?,
        None => scores,
    };

    let weights = ops::softmax_last_dim(&scores)?;
    let attended = match dropout_p {
        Some(p) if p > 0.0 => ops::dropout(&weights, p)?,
        _ => weights.clone(),
    };
    let attended = attended.reshape((batch * heads, q_len, k_len))?;
    let context = attended
        .matmul(&v)?
        .reshape((batch, heads, q_len, d_k))?;
    Ok((context, weights))
}

fn check_mask(mask: &Tensor, batch: usize, heads: usize, q_len: usize, k_len: usize) -> Result<()> {
    let (mb, mh, mq, mk) = mask.dims4().map_err(|_| {
        AttentionError::invalid_shape(
            "scaled_dot_product.mask",
            format!("expected a 4D additive mask, got {:?}", mask.dims()),
        )
    })?;
    let batch_ok = mb == 1 || mb == batch;
    let heads_ok = mh == 1 || mh == heads;
    let q_ok = mq == 1 || mq == q_len;
    if !(batch_ok && heads_ok && q_ok && mk == k_len) {
        return Err(AttentionError::invalid_shape(
            "scaled_dot_product.mask",
            format!(
                "mask {:?} does not broadcast over scores ({batch}, {heads}, {q_len}, {k_len})",
                mask.dims()
            ),
        ));
    }
    Ok(())
}

/// Multi-head attention with independent query, key, value and output
/// projections. Self-attention and cross-attention differ only in the
/// tensors callers pass for keys and values.
#[derive(Debug, Clone)]
pub struct MultiHeadAttention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    d_model: usize,
    heads: usize,
    d_k: usize,
    dropout: f32,
}

impl MultiHeadAttention {
    /// `d_model` must split evenly over `heads`; `dropout` must be in
    /// `[0, 1)`. Violations fail here, never mid-forward.
    pub fn new(d_model: usize, heads: usize, dropout: f32, vb: VarBuilder) -> Result<Self> {
        if heads == 0 {
            return Err(AttentionError::invalid_config("heads must be non-zero"));
        }
        if d_model % heads != 0 {
            return Err(AttentionError::invalid_config(format!(
                "d_model {d_model} is not divisible by {heads} heads"
            )));
        }
        if !(0.0..1.0).contains(&dropout) {
            return Err(AttentionError::invalid_config(format!(
                "dropout {dropout} outside [0, 1)"
            )));
        }
        let q_proj = linear(d_model, d_model, vb.pp("q_proj"))?;
        let k_proj = linear(d_model, d_model, vb.pp("k_proj"))?;
        let v_proj = linear(d_model, d_model, vb.pp("v_proj"))?;
        let out_proj = linear(d_model, d_model, vb.pp("out_proj"))?;
        Ok(Self {
            q_proj,
            k_proj,
            v_proj,
            out_proj,
            d_model,
            heads,
            d_k: d_model / heads,
            dropout,
        })
    }

    pub fn heads(&self) -> usize {
        self.heads
    }

    /// Attends `query` over `key`/`value`. All three are
    /// `(batch, len, d_model)`; `key` and `value` must share their length.
    pub fn forward(
        &self,
        query: &Tensor,
        key: &Tensor,
        value: &Tensor,
        mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let (batch, q_len) = self.check_input("query", query)?;
        let (k_batch, k_len) = self.check_input("key", key)?;
        let (v_batch, v_len) = self.check_input("value", value)?;
        if k_batch != batch || v_batch != batch || v_len != k_len {
            return Err(AttentionError::invalid_shape(
                "multi_head.forward",
                format!(
                    "query {:?}, key {:?} and value {:?} do not agree",
                    query.dims(),
                    key.dims(),
                    value.dims()
                ),
            ));
        }

        let q = self.split_heads(&self.q_proj.forward(query)?, batch, q_len)?;
        let k = self.split_heads(&self.k_proj.forward(key)?, batch, k_len)?;
        let v = self.split_heads(&self.v_proj.forward(value)?, batch, k_len)?;

        let dropout = train.then_some(self.dropout);
        let (context, _weights) = scaled_dot_product(&q, &k, &v, mask, dropout)?;

        let merged = context
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, q_len, self.d_model))?;
        Ok(self.out_proj.forward(&merged)?)
    }

    fn check_input(&self, name: &str, x: &Tensor) -> Result<(usize, usize)> {
        match x.dims() {
            [batch, len, width] if *width == self.d_model => Ok((*batch, *len)),
            dims => Err(AttentionError::invalid_shape(
                format!("multi_head.{name}"),
                format!("expected (batch, len, {}), got {dims:?}", self.d_model),
            )),
        }
    }

    fn split_heads(&self, x: &Tensor, batch: usize, len: usize) -> Result<Tensor> {
        Ok(x.reshape((batch, len, self.heads, self.d_k))?
            .transpose(1, 2)?
            .contiguous()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};
    use candle_nn::{VarBuilder, VarMap};

    fn mha(d_model: usize, heads: usize, device: &Device) -> Result<MultiHeadAttention> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        MultiHeadAttention::new(d_model, heads, 0.0, vb)
    }

    #[test]
    fn weights_are_row_stochastic() -> Result<()> {
        let device = Device::Cpu;
        let q = Tensor::rand(-1.0f32, 1.0f32, (2, 3, 5, 4), &device)?;
        let k = Tensor::rand(-1.0f32, 1.0f32, (2, 3, 7, 4), &device)?;
        let v = Tensor::rand(-1.0f32, 1.0f32, (2, 3, 7, 4), &device)?;
        let (context, weights) = scaled_dot_product(&q, &k, &v, None, None)?;
        assert_eq!(context.dims(), &[2, 3, 5, 4]);
        assert_eq!(weights.dims(), &[2, 3, 5, 7]);

        let sums = weights.sum(candle_core::D::Minus1)?.flatten_all()?.to_vec1::<f32>()?;
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5, "row sum {s} not ~1");
        }
        Ok(())
    }

    #[test]
    fn masked_entries_get_zero_weight() -> Result<()> {
        let device = Device::Cpu;
        let q = Tensor::rand(-1.0f32, 1.0f32, (1, 1, 3, 4), &device)?;
        let k = Tensor::rand(-1.0f32, 1.0f32, (1, 1, 3, 4), &device)?;
        let v = Tensor::rand(-1.0f32, 1.0f32, (1, 1, 3, 4), &device)?;
        let mask = crate::masks::causal_mask(3, &device)?;

        let (_, weights) = scaled_dot_product(&q, &k, &v, Some(&mask), None)?;
        let rows = weights.squeeze(0)?.squeeze(0)?.to_vec2::<f32>()?;
        assert_eq!(rows[0][1], 0.0);
        assert_eq!(rows[0][2], 0.0);
        assert_eq!(rows[1][2], 0.0);
        let sum: f32 = rows[1].iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn fully_masked_row_propagates_nan() -> Result<()> {
        // Softmax over an all -inf row has no probability mass to assign,
        // so its outputs are NaN. The mask builders never emit such rows;
        // open rows are unaffected.
        let device = Device::Cpu;
        let q = Tensor::rand(-1.0f32, 1.0f32, (1, 1, 2, 4), &device)?;
        let k = Tensor::rand(-1.0f32, 1.0f32, (1, 1, 2, 4), &device)?;
        let v = Tensor::rand(-1.0f32, 1.0f32, (1, 1, 2, 4), &device)?;
        let mask = Tensor::from_vec(
            vec![f32::NEG_INFINITY, f32::NEG_INFINITY, 0.0, 0.0],
            (1, 1, 2, 2),
            &device,
        )?;
        let (context, _) = scaled_dot_product(&q, &k, &v, Some(&mask), None)?;
        let rows = context.squeeze(0)?.squeeze(0)?.to_vec2::<f32>()?;
        assert!(rows[0].iter().all(|value| value.is_nan()));
        assert!(rows[1].iter().all(|value| value.is_finite()));
        Ok(())
    }

    #[test]
    fn single_key_attention_returns_the_value() -> Result<()> {
        // With one key the softmax weight is exactly 1.
        let device = Device::Cpu;
        let q = Tensor::rand(-1.0f32, 1.0f32, (1, 1, 1, 4), &device)?;
        let k = Tensor::rand(-1.0f32, 1.0f32, (1, 1, 1, 4), &device)?;
        let v = Tensor::rand(-1.0f32, 1.0f32, (1, 1, 1, 4), &device)?;
        let (context, weights) = scaled_dot_product(&q, &k, &v, None, None)?;
        assert_eq!(weights.flatten_all()?.to_vec1::<f32>()?, vec![1.0]);
        assert_eq!(
            context.flatten_all()?.to_vec1::<f32>()?,
            v.flatten_all()?.to_vec1::<f32>()?
        );
        Ok(())
    }

    #[test]
    fn rejects_mask_with_wrong_key_length() -> Result<()> {
        let device = Device::Cpu;
        let q = Tensor::rand(-1.0f32, 1.0f32, (1, 2, 3, 4), &device)?;
        let k = Tensor::rand(-1.0f32, 1.0f32, (1, 2, 5, 4), &device)?;
        let v = Tensor::rand(-1.0f32, 1.0f32, (1, 2, 5, 4), &device)?;
        let mask = Tensor::zeros((1, 1, 3, 4), DType::F32, &device)?;
        assert!(scaled_dot_product(&q, &k, &v, Some(&mask), None).is_err());
        Ok(())
    }

    #[test]
    fn construction_rejects_bad_configs() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        assert!(matches!(
            MultiHeadAttention::new(10, 3, 0.1, vb.pp("a")),
            Err(AttentionError::InvalidConfig { .. })
        ));
        assert!(matches!(
            MultiHeadAttention::new(8, 0, 0.1, vb.pp("b")),
            Err(AttentionError::InvalidConfig { .. })
        ));
        assert!(matches!(
            MultiHeadAttention::new(8, 2, 1.0, vb.pp("c")),
            Err(AttentionError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn self_attention_preserves_shape() -> Result<()> {
        let device = Device::Cpu;
        let attn = mha(8, 2, &device)?;
        let x = Tensor::rand(-1.0f32, 1.0f32, (2, 5, 8), &device)?;
        let out = attn.forward(&x, &x, &x, None, false)?;
        assert_eq!(out.dims(), &[2, 5, 8]);
        Ok(())
    }

    #[test]
    fn cross_attention_takes_query_length() -> Result<()> {
        let device = Device::Cpu;
        let attn = mha(8, 2, &device)?;
        let q = Tensor::rand(-1.0f32, 1.0f32, (1, 3, 8), &device)?;
        let kv = Tensor::rand(-1.0f32, 1.0f32, (1, 7, 8), &device)?;
        let out = attn.forward(&q, &kv, &kv, None, false)?;
        assert_eq!(out.dims(), &[1, 3, 8]);
        Ok(())
    }

    #[test]
    fn forward_rejects_key_value_length_mismatch() -> Result<()> {
        let device = Device::Cpu;
        let attn = mha(8, 2, &device)?;
        let q = Tensor::rand(-1.0f32, 1.0f32, (1, 3, 8), &device)?;
        let k = Tensor::rand(-1.0f32, 1.0f32, (1, 7, 8), &device)?;
        let v = Tensor::rand(-1.0f32, 1.0f32, (1, 6, 8), &device)?;
        assert!(attn.forward(&q, &k, &v, None, false).is_err());
        Ok(())
    }

    #[test]
    fn single_head_matches_multi_head_width() -> Result<()> {
        let device = Device::Cpu;
        let attn = mha(8, 1, &device)?;
        let x = Tensor::rand(-1.0f32, 1.0f32, (1, 4, 8), &device)?;
        let out = attn.forward(&x, &x, &x, None, false)?;
        assert_eq!(out.dims(), &[1, 4, 8]);
        Ok(())
    }
}
