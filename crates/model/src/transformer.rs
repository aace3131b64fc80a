//! The assembled encoder-decoder model.

use candle_core::{DType, Device, Module, Result, Tensor};
use candle_nn::{Linear, VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use embedding::{PositionalEncoding, TokenEmbedding};
use layers::{checks, linear};

use crate::config::ModelConfig;
use crate::decoder::Decoder;
use crate::encoder::Encoder;

/// Encoder-decoder transformer with a linear head over the target
/// vocabulary.
///
/// `encode`, `decode` and `project` are exposed separately so decoding
/// loops can run the encoder once and re-run only the decoder side.
pub struct Transformer {
    src_embed: TokenEmbedding,
    src_pos: PositionalEncoding,
    tgt_embed: TokenEmbedding,
    tgt_pos: PositionalEncoding,
    encoder: Encoder,
    decoder: Decoder,
    projection: Linear,
    config: ModelConfig,
}

impl Transformer {
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;
        let src_embed =
            TokenEmbedding::new(config.src_vocab_size, config.d_model, vb.pp("src_embed"))?;
        let tgt_embed =
            TokenEmbedding::new(config.tgt_vocab_size, config.d_model, vb.pp("tgt_embed"))?;
        let src_pos =
            PositionalEncoding::new(config.d_model, config.src_seq_len, config.dropout, vb.device())?;
        let tgt_pos =
            PositionalEncoding::new(config.d_model, config.tgt_seq_len, config.dropout, vb.device())?;
        let encoder = Encoder::new(config, vb.pp("encoder"))?;
        let decoder = Decoder::new(config, vb.pp("decoder"))?;
        let projection = linear(config.d_model, config.tgt_vocab_size, vb.pp("out"))?;
        Ok(Self {
            src_embed,
            src_pos,
            tgt_embed,
            tgt_pos,
            encoder,
            decoder,
            projection,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Runs source ids through embedding, positional encoding and the
    /// encoder stack. Returns `(batch, src_len, d_model)` memory.
    pub fn encode(&self, src_ids: &Tensor, src_mask: Option<&Tensor>, train: bool) -> Result<Tensor> {
        checks::expect_token_ids("transformer.encode", src_ids)?;
        let x = self.src_embed.forward(src_ids)?;
        let x = self.src_pos.forward(&x, train)?;
        self.encoder.forward(&x, src_mask, train)
    }

    /// Runs target ids through the decoder stack against precomputed
    /// encoder memory. Returns `(batch, tgt_len, d_model)` hidden states,
    /// not logits.
    pub fn decode(
        &self,
        encoder_output: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_ids: &Tensor,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        checks::expect_token_ids("transformer.decode", tgt_ids)?;
        checks::expect_hidden("transformer.decode.memory", encoder_output, self.config.d_model)?;
        let x = self.tgt_embed.forward(tgt_ids)?;
        let x = self.tgt_pos.forward(&x, train)?;
        self.decoder.forward(&x, encoder_output, src_mask, tgt_mask, train)
    }

    /// Maps decoder hidden states to `(batch, tgt_len, tgt_vocab_size)`
    /// logits. Softmax is left to the consumer.
    pub fn project(&self, x: &Tensor) -> Result<Tensor> {
        checks::expect_hidden("transformer.project", x, self.config.d_model)?;
        self.projection.forward(x)
    }

    /// Full teacher-forced pass, used for training and whole-sequence
    /// scoring.
    pub fn forward(
        &self,
        src_ids: &Tensor,
        tgt_ids: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let memory = self.encode(src_ids, src_mask, train)?;
        let hidden = self.decode(&memory, src_mask, tgt_ids, tgt_mask, train)?;
        self.project(&hidden)
    }
}

/// Builds a freshly initialised transformer together with the `VarMap`
/// holding its parameters. Weight matrices are re-sampled from a seeded
/// generator in parameter-name order, so two builds with equal arguments
/// are identical on any device.
pub fn build_transformer(
    config: &ModelConfig,
    device: &Device,
    seed: u64,
) -> Result<(Transformer, VarMap)> {
    config.validate()?;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let model = Transformer::new(config, vb)?;
    seed_parameters(&varmap, seed)?;
    let parameters: usize = varmap.all_vars().iter().map(|v| v.elem_count()).sum();
    log::info!(
        "built transformer: {} layers, {} heads, d_model {}, {} parameters",
        config.n_layers,
        config.heads,
        config.d_model,
        parameters
    );
    Ok((model, varmap))
}

/// Overwrites every weight matrix with Xavier-uniform values drawn from a
/// generator seeded with `seed`, visiting parameters in name order.
/// Constant-initialised vectors (biases, norm affine pairs) keep their
/// values.
fn seed_parameters(varmap: &VarMap, seed: u64) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let vars = varmap.data().lock().unwrap();
    let mut names: Vec<&String> = vars.keys().collect();
    names.sort();
    for name in names {
        let var = &vars[name];
        let dims = var.dims().to_vec();
        if dims.len() < 2 {
            continue;
        }
        let fan_out = dims[0];
        let fan_in: usize = dims[1..].iter().product();
        let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
        let values: Vec<f32> = (0..var.elem_count())
            .map(|_| rng.gen_range(-bound..bound) as f32)
            .collect();
        var.set(&Tensor::from_vec(values, dims.as_slice(), var.device())?)?;
    }
    Ok(())
}
