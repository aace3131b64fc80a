//! Encoder-decoder transformer assembly.
//!
//! [`ModelConfig`] describes the architecture, [`build_transformer`] turns
//! it into a [`Transformer`] plus the `VarMap` backing its parameters, and
//! [`greedy_decode`] drives inference one token at a time. Checkpointing
//! round-trips the `VarMap` through safetensors.

pub mod checkpoint;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod greedy;
pub mod transformer;

pub use checkpoint::{load_weights, save_weights};
pub use config::ModelConfig;
pub use greedy::{greedy_decode, GreedyDecoder};
pub use transformer::{build_transformer, Transformer};
