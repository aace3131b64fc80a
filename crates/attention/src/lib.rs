//! Scaled dot-product attention, multi-head projection plumbing and the
//! additive masks that feed them.
//!
//! The score convention everywhere is `softmax(q k^T / sqrt(d_k) + mask)`
//! with `f32::NEG_INFINITY` marking positions a query must not see.

pub mod core;
pub mod masks;

pub use crate::core::{scaled_dot_product, AttentionError, MultiHeadAttention};
pub use crate::masks::{causal_mask, combine_masks, padding_mask};
