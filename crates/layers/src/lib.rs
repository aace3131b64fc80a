//! Building blocks shared by the encoder and decoder stacks.
//!
//! Hidden states follow the `(batch, seq, d_model)` convention throughout.
//! Every layer here is position-wise: it never mixes information across the
//! sequence axis, and normalisation statistics are taken over the feature
//! axis only.

pub mod checks;
pub mod linear;
pub mod mlp;
pub mod norm;

pub use linear::linear;
pub use mlp::FeedForward;
pub use norm::LayerNorm;
