//! Tokenizer adapter and sequence framing.
//!
//! Wraps a `tokenizers` vocabulary and pins down the four special symbols
//! the model relies on. Framing produces fixed-length id sequences in the
//! `[SOS] tokens [EOS] [PAD]...` layout the padding masks expect.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use tokenizers::Tokenizer;

pub const SOS_TOKEN: &str = "[SOS]";
pub const EOS_TOKEN: &str = "[EOS]";
pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";

/// A tokenizer with resolved special-token ids.
pub struct Vocabulary {
    tokenizer: Tokenizer,
    sos_id: u32,
    eos_id: u32,
    pad_id: u32,
}

impl Vocabulary {
    /// Wraps an in-memory tokenizer. Fails if any special token is missing
    /// from its vocabulary.
    pub fn new(tokenizer: Tokenizer) -> Result<Self> {
        let special = |token: &str| {
            tokenizer
                .token_to_id(token)
                .ok_or_else(|| anyhow!("tokenizer has no {token} token"))
        };
        let sos_id = special(SOS_TOKEN)?;
        let eos_id = special(EOS_TOKEN)?;
        let pad_id = special(PAD_TOKEN)?;
        special(UNK_TOKEN)?;
        Ok(Self {
            tokenizer,
            sos_id,
            eos_id,
            pad_id,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path.as_ref())
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("loading tokenizer from {}", path.as_ref().display()))?;
        Self::new(tokenizer)
    }

    pub fn size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    pub fn sos_id(&self) -> u32 {
        self.sos_id
    }

    pub fn eos_id(&self) -> u32 {
        self.eos_id
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    /// Raw token ids for `text`, without framing.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("{e}"))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Frames `text` as `[SOS] ids [EOS]` padded out to exactly `seq_len`.
    /// Texts that cannot fit with both markers are rejected rather than
    /// silently truncated.
    pub fn frame(&self, text: &str, seq_len: usize) -> Result<Vec<u32>> {
        let ids = self.encode(text)?;
        if ids.len() + 2 > seq_len {
            bail!(
                "input of {} tokens does not fit a sequence of {seq_len} with framing",
                ids.len()
            );
        }
        let mut framed = Vec::with_capacity(seq_len);
        framed.push(self.sos_id);
        framed.extend(ids);
        framed.push(self.eos_id);
        framed.resize(seq_len, self.pad_id);
        Ok(framed)
    }

    /// Text for generated ids, with special tokens dropped.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer.decode(ids, true).map_err(|e| anyhow!("{e}"))
    }
}
