use candle_core::{Device, Result, Tensor};

/// Builds a `(1, 1, size, size)` additive causal mask.
///
/// Position `i` may attend to keys `0..=i`; entries above the diagonal are
/// negative infinity so softmax drives them to zero. The two leading
/// singleton axes broadcast over batch and heads.
pub fn causal_mask(size: usize, device: &Device) -> Result<Tensor> {
    let mut data = vec![0f32; size * size];
    for q in 0..size {
        for k in (q + 1)..size {
            data[q * size + k] = f32::NEG_INFINITY;
        }
    }
    Tensor::from_vec(data, (1, 1, size, size), device)
}
