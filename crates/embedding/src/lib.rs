//! Turning token ids into position-aware vectors.
//!
//! [`TokenEmbedding`] looks up and rescales learned vectors;
//! [`PositionalEncoding`] stamps each sequence slot with its fixed
//! sinusoidal signature. The encoder and decoder each own one pair.

pub mod positional;
pub mod token;

pub use positional::PositionalEncoding;
pub use token::TokenEmbedding;
