use candle_core::{Device, Error, Result, Tensor};

/// Builds a `(batch, 1, 1, k_len)` additive key-padding mask.
///
/// Keys whose token id equals `pad_id` receive negative infinity. Query
/// positions are never masked here; rows for padded queries produce garbage
/// that downstream padding-aware losses or output framing ignore.
pub fn padding_mask(token_ids: &Tensor, pad_id: u32, device: &Device) -> Result<Tensor> {
    let (batch, k_len) = token_ids.dims2().map_err(|_| {
        Error::Msg(format!(
            "padding_mask: expected (batch, seq) token ids, got {:?}",
            token_ids.dims()
        ))
    })?;
    let ids = token_ids.to_dtype(candle_core::DType::U32)?.to_vec2::<u32>()?;
    let mut data = vec![0f32; batch * k_len];
    for (b, row) in ids.iter().enumerate() {
        for (k, &id) in row.iter().enumerate() {
            if id == pad_id {
                data[b * k_len + k] = f32::NEG_INFINITY;
            }
        }
    }
    Tensor::from_vec(data, (batch, 1, 1, k_len), device)
}

/// Overlays a key-padding mask onto a causal mask by addition.
///
/// Adding two additive masks keeps an entry open only when both masks keep
/// it open. Shapes must broadcast against each other.
pub fn combine_masks(causal: &Tensor, padding: &Tensor) -> Result<Tensor> {
    causal.broadcast_add(padding)
}
