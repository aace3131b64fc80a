//! Shape validation helpers wired into constructors and forward paths.
//!
//! Each helper returns `candle_core::Result<()>` so call sites can propagate
//! errors with `?` before any tensor operation runs.

use candle_core::{Error, Result, Tensor};

/// Ensures a tensor matches the expected dimensions exactly.
pub fn expect_shape(context: &str, tensor: &Tensor, expected: &[usize]) -> Result<()> {
    let actual = tensor.dims();
    if actual == expected {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: expected shape {expected:?}, got {actual:?}"
        )))
    }
}

/// Validates the `(batch, seq, d_model)` convention with a known model width.
pub fn expect_hidden(context: &str, tensor: &Tensor, d_model: usize) -> Result<()> {
    match tensor.dims() {
        [_, _, width] if *width == d_model => Ok(()),
        dims => Err(Error::Msg(format!(
            "{context}: expected (batch, seq, {d_model}) layout, got {dims:?}"
        ))),
    }
}

/// Validates the `(batch, seq)` token-id convention with an integer dtype.
pub fn expect_token_ids(context: &str, tensor: &Tensor) -> Result<()> {
    if tensor.dims().len() != 2 {
        return Err(Error::Msg(format!(
            "{context}: expected (batch, seq) token ids, got {:?}",
            tensor.dims()
        )));
    }
    if !tensor.dtype().is_int() {
        return Err(Error::Msg(format!(
            "{context}: token ids require an integer dtype, got {:?}",
            tensor.dtype()
        )));
    }
    Ok(())
}
