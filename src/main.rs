//! Command-line greedy translation.
//!
//! Loads a model configuration, a trained checkpoint and a tokenizer per
//! language, then decodes the given sentence one token at a time.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use candle_core::Tensor;
use clap::Parser;

use attention::padding_mask;
use model::{build_transformer, greedy_decode, load_weights, ModelConfig};
use transformer::{setup_device, Vocabulary};

#[derive(Parser)]
#[command(name = "translate", about = "Translate a sentence with a trained transformer")]
struct Args {
    /// Model configuration JSON.
    #[arg(long)]
    config: PathBuf,

    /// Trained weights in safetensors format.
    #[arg(long)]
    weights: PathBuf,

    /// Source-language tokenizer file.
    #[arg(long)]
    source_tokenizer: PathBuf,

    /// Target-language tokenizer file.
    #[arg(long)]
    target_tokenizer: PathBuf,

    /// Cap on generated length; defaults to the configured target length.
    #[arg(long)]
    max_len: Option<usize>,

    /// Sentence to translate.
    text: String,
}

fn load_config(path: &PathBuf) -> Result<ModelConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let config: ModelConfig =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = load_config(&args.config)?;
    let source_vocab = Vocabulary::from_file(&args.source_tokenizer)?;
    let target_vocab = Vocabulary::from_file(&args.target_tokenizer)?;

    if source_vocab.size() != config.src_vocab_size {
        bail!(
            "source tokenizer has {} entries but the config expects {}",
            source_vocab.size(),
            config.src_vocab_size
        );
    }
    if target_vocab.size() != config.tgt_vocab_size {
        bail!(
            "target tokenizer has {} entries but the config expects {}",
            target_vocab.size(),
            config.tgt_vocab_size
        );
    }

    let device = setup_device()?;
    let (model, mut varmap) = build_transformer(&config, &device, 0)?;
    load_weights(&mut varmap, &args.weights)?;

    let framed = source_vocab.frame(&args.text, config.src_seq_len)?;
    let source = Tensor::new(framed.as_slice(), &device)?.unsqueeze(0)?;
    let source_mask = padding_mask(&source, source_vocab.pad_id(), &device)?;

    let max_len = args.max_len.unwrap_or(config.tgt_seq_len).min(config.tgt_seq_len);
    let ids = greedy_decode(
        &model,
        &source,
        Some(&source_mask),
        target_vocab.sos_id(),
        target_vocab.eos_id(),
        max_len,
        &device,
    )?;
    log::debug!("generated ids: {ids:?}");

    println!("{}", target_vocab.decode(&ids)?);
    Ok(())
}
