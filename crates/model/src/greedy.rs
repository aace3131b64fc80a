//! Greedy autoregressive decoding.
//!
//! The encoder runs once per source; the decoder is re-run from scratch on
//! the growing target prefix each step. At every step the highest-scoring
//! token for the final position is appended, until the end token appears or
//! the length limit is hit.

use candle_core::{Device, Error, Result, Tensor};

use attention::causal_mask;

use crate::transformer::Transformer;

/// Step-wise greedy decoding over one source sequence.
///
/// Callers that want the whole output at once should use
/// [`greedy_decode`]; this type exists for drivers that inspect or abort
/// between steps.
pub struct GreedyDecoder<'a> {
    model: &'a Transformer,
    memory: Tensor,
    source_mask: Option<Tensor>,
    generated: Vec<u32>,
    eos_id: u32,
    max_len: usize,
    device: Device,
    done: bool,
}

impl<'a> GreedyDecoder<'a> {
    /// Encodes `source` once and primes the target with `sos_id`.
    /// `source` is `(1, src_len)` token ids and `source_mask` the matching
    /// additive key mask, if any.
    pub fn new(
        model: &'a Transformer,
        source: &Tensor,
        source_mask: Option<&Tensor>,
        sos_id: u32,
        eos_id: u32,
        max_len: usize,
        device: &Device,
    ) -> Result<Self> {
        if max_len < 2 {
            return Err(Error::Msg(format!(
                "greedy_decode: max_len {max_len} leaves no room for output"
            )));
        }
        let (batch, _) = source.dims2()?;
        if batch != 1 {
            return Err(Error::Msg(format!(
                "greedy_decode: expected a single sequence, got batch of {batch}"
            )));
        }
        let memory = model.encode(source, source_mask, false)?;
        Ok(Self {
            model,
            memory,
            source_mask: source_mask.cloned(),
            generated: vec![sos_id],
            eos_id,
            max_len,
            device: device.clone(),
            done: false,
        })
    }

    /// Appends one token and returns it, or `None` once decoding finished.
    pub fn step(&mut self) -> Result<Option<u32>> {
        if self.done {
            return Ok(None);
        }
        let len = self.generated.len();
        let tgt = Tensor::new(self.generated.as_slice(), &self.device)?.unsqueeze(0)?;
        let tgt_mask = causal_mask(len, &self.device)?;

        let hidden =
            self.model
                .decode(&self.memory, self.source_mask.as_ref(), &tgt, Some(&tgt_mask), false)?;
        let last = hidden.narrow(1, len - 1, 1)?;
        let logits = self.model.project(&last)?.flatten_all()?.to_vec1::<f32>()?;

        let next = argmax(&logits)?;
        self.generated.push(next);
        if next == self.eos_id || self.generated.len() >= self.max_len {
            self.done = true;
        }
        Ok(Some(next))
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Ids generated so far, starting with the SOS marker.
    pub fn ids(&self) -> &[u32] {
        &self.generated
    }

    pub fn into_ids(self) -> Vec<u32> {
        self.generated
    }
}

/// Decodes one source sequence to completion.
///
/// The returned ids always start with `sos_id`; they end with `eos_id`
/// unless `max_len` cut generation short.
pub fn greedy_decode(
    model: &Transformer,
    source: &Tensor,
    source_mask: Option<&Tensor>,
    sos_id: u32,
    eos_id: u32,
    max_len: usize,
    device: &Device,
) -> Result<Vec<u32>> {
    let mut decoder = GreedyDecoder::new(model, source, source_mask, sos_id, eos_id, max_len, device)?;
    while decoder.step()?.is_some() {}
    Ok(decoder.into_ids())
}

impl Transformer {
    /// One-shot greedy decoding; see [`greedy_decode`].
    pub fn greedy_decode(
        &self,
        source: &Tensor,
        source_mask: Option<&Tensor>,
        sos_id: u32,
        eos_id: u32,
        max_len: usize,
        device: &Device,
    ) -> Result<Vec<u32>> {
        greedy_decode(self, source, source_mask, sos_id, eos_id, max_len, device)
    }
}

fn argmax(logits: &[f32]) -> Result<u32> {
    let mut best = 0usize;
    let mut best_score = f32::NEG_INFINITY;
    for (index, &score) in logits.iter().enumerate() {
        if score > best_score {
            best = index;
            best_score = score;
        }
    }
    if best_score.is_finite() {
        Ok(best as u32)
    } else {
        Err(Error::Msg("greedy_decode: no finite logit to pick".into()))
    }
}
