//! Local zero-shot classification with an NLI model
//!
//! Each candidate label becomes a hypothesis ("This example is {label}.")
//! paired with the input text as premise. A DistilBERT model fine-tuned on
//! MNLI scores every pair; entailment is read as label confidence.
//!
//! - multi-label: softmax over `[contradiction, entailment]` per label
//! - single-label: softmax of the entailment logits across all labels

use crate::classifier::{BackendKind, ZeroShotClassifier};
use crate::config::LocalModelSpec;
use async_trait::async_trait;
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use hf_hub::{api::sync::Api, Repo, RepoType};
use modgate_core::{Error, Result, ScorePair};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::{Tokenizer, TruncationParams, TruncationStrategy};
use tracing::{debug, info};

/// In-process zero-shot classifier
pub struct NliClassifier {
    name: String,
    model: Arc<NliModel>,
}

impl NliClassifier {
    /// Download (or reuse the hub cache) and load the model.
    ///
    /// Blocking: run it on a blocking thread.
    pub fn load(name: &str, spec: &LocalModelSpec) -> Result<Self> {
        let start = Instant::now();
        info!("Loading NLI model '{}' from {} @ {}", name, spec.repo, spec.revision);

        let files = ModelFiles::fetch(spec)?;
        let device = get_device(&spec.device)?;
        let model = NliModel::load(&files, spec, device)?;

        info!(
            "Loaded NLI model '{}' in {}ms (entailment={}, contradiction={})",
            name,
            start.elapsed().as_millis(),
            model.entailment_id,
            model.contradiction_id
        );

        Ok(Self {
            name: name.to_string(),
            model: Arc::new(model),
        })
    }
}

#[async_trait]
impl ZeroShotClassifier for NliClassifier {
    async fn classify(
        &self,
        text: &str,
        labels: &[String],
        multi_label: bool,
    ) -> Result<Vec<ScorePair>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();
        let labels = labels.to_vec();

        tokio::task::spawn_blocking(move || model.score(&text, &labels, multi_label))
            .await
            .map_err(|e| Error::internal(format!("Inference task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }
}

/// Files resolved from the hub cache
struct ModelFiles {
    config: PathBuf,
    tokenizer: TokenizerSource,
    weights: Weights,
}

enum TokenizerSource {
    Json(PathBuf),
    Vocab(PathBuf),
}

enum Weights {
    SafeTensors(PathBuf),
    PyTorch(PathBuf),
}

impl ModelFiles {
    fn fetch(spec: &LocalModelSpec) -> Result<Self> {
        let api = Api::new()
            .map_err(|e| Error::config(format!("Failed to initialize HF API: {}", e)))?;
        let repo = api.repo(Repo::with_revision(
            spec.repo.clone(),
            RepoType::Model,
            spec.revision.clone(),
        ));

        let config = repo
            .get("config.json")
            .map_err(|e| Error::config(format!("Failed to download config.json: {}", e)))?;

        let tokenizer = match repo.get("tokenizer.json") {
            Ok(path) => TokenizerSource::Json(path),
            Err(_) => repo
                .get("vocab.txt")
                .map(TokenizerSource::Vocab)
                .map_err(|e| Error::config(format!("No tokenizer found in {}: {}", spec.repo, e)))?,
        };

        let weights = match repo.get("model.safetensors") {
            Ok(path) => Weights::SafeTensors(path),
            Err(_) => repo
                .get("pytorch_model.bin")
                .map(Weights::PyTorch)
                .map_err(|e| Error::config(format!("No model weights found in {}: {}", spec.repo, e)))?,
        };

        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }
}

/// Loaded weights plus the label indices of the NLI head
struct NliModel {
    tokenizer: Tokenizer,
    model: DistilBertModel,
    pre_classifier: Option<Linear>,
    classifier: Linear,
    device: Device,
    entailment_id: usize,
    contradiction_id: usize,
    hypothesis_template: String,
}

impl NliModel {
    fn load(files: &ModelFiles, spec: &LocalModelSpec, device: Device) -> Result<Self> {
        let config_str = std::fs::read_to_string(&files.config)
            .map_err(|e| Error::config(format!("Failed to read config: {}", e)))?;
        let config_json: serde_json::Value = serde_json::from_str(&config_str)?;
        let distilbert_config: DistilBertConfig = serde_json::from_str(&config_str)?;

        let hidden_size = config_json
            .get("dim")
            .or_else(|| config_json.get("hidden_size"))
            .and_then(|v| v.as_u64())
            .unwrap_or(768) as usize;

        let nli_labels = NliLabels::from_config(&config_json)?;

        let vb = load_var_builder(&files.weights, &device)?;
        let model = DistilBertModel::load(vb.pp("distilbert"), &distilbert_config)
            .map_err(|e| Error::config(format!("Failed to load DistilBERT model: {}", e)))?;

        let pre_classifier = candle_nn::linear(hidden_size, hidden_size, vb.pp("pre_classifier")).ok();
        let classifier = candle_nn::linear(hidden_size, nli_labels.count, vb.pp("classifier"))
            .map_err(|e| Error::config(format!("Model has no NLI classification head: {}", e)))?;

        let mut tokenizer = load_tokenizer(&files.tokenizer)?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: spec.max_length,
                strategy: TruncationStrategy::OnlyFirst,
                ..Default::default()
            }))
            .map_err(|e| Error::config(format!("Invalid truncation settings: {}", e)))?;
        tokenizer.with_padding(None);

        Ok(Self {
            tokenizer,
            model,
            pre_classifier,
            classifier,
            device,
            entailment_id: nli_labels.entailment,
            contradiction_id: nli_labels.contradiction,
            hypothesis_template: spec.hypothesis_template.clone(),
        })
    }

    fn score(&self, text: &str, labels: &[String], multi_label: bool) -> Result<Vec<ScorePair>> {
        let start = Instant::now();
        let mut entailment = Vec::with_capacity(labels.len());
        let mut contradiction = Vec::with_capacity(labels.len());

        for label in labels {
            let hypothesis = self.hypothesis_template.replace("{}", label);
            let logits = self.forward_pair(text, &hypothesis)?;
            entailment.push(logit_at(&logits, self.entailment_id)?);
            contradiction.push(logit_at(&logits, self.contradiction_id)?);
        }

        let scores = if multi_label {
            multi_label_scores(&contradiction, &entailment)
        } else {
            softmax(&entailment)
        };

        debug!(
            labels = labels.len(),
            latency_us = start.elapsed().as_micros() as u64,
            "Scored premise against hypotheses"
        );

        Ok(rank(labels, scores))
    }

    fn forward_pair(&self, premise: &str, hypothesis: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode((premise, hypothesis), true)
            .map_err(|e| Error::backend(format!("Tokenization failed: {}", e)))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
        let input_ids = Tensor::new(input_ids.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| Error::backend(format!("Failed to create input tensor: {}", e)))?;

        // DistilBERT masks positions where the mask is non-zero.
        let padding_mask: Vec<u8> = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| u8::from(x == 0))
            .collect();
        let padding_mask = Tensor::new(padding_mask.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| Error::backend(format!("Failed to create attention mask: {}", e)))?;

        let hidden_states = self
            .model
            .forward(&input_ids, &padding_mask)
            .map_err(|e| Error::backend(format!("Model forward pass failed: {}", e)))?;

        let cls_embedding = hidden_states
            .i((0, 0, ..))
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| Error::backend(format!("Failed to get CLS token: {}", e)))?;

        let pooled = match &self.pre_classifier {
            Some(pre_classifier) => pre_classifier
                .forward(&cls_embedding)
                .and_then(|t| t.relu())
                .map_err(|e| Error::backend(format!("Pre-classifier failed: {}", e)))?,
            None => cls_embedding,
        };

        self.classifier
            .forward(&pooled)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| Error::backend(format!("Classification head failed: {}", e)))
    }
}

/// Positions of the NLI classes in the model head
#[derive(Debug, PartialEq)]
struct NliLabels {
    entailment: usize,
    contradiction: usize,
    count: usize,
}

impl NliLabels {
    fn from_config(config: &serde_json::Value) -> Result<Self> {
        let id2label = config
            .get("id2label")
            .and_then(|v| v.as_object())
            .ok_or_else(|| Error::config("Model config has no id2label mapping"))?;

        let mut entailment = None;
        let mut contradiction = None;
        for (id, label) in id2label {
            let id: usize = id
                .parse()
                .map_err(|_| Error::config(format!("Invalid id2label key '{}'", id)))?;
            let label = label.as_str().unwrap_or_default().to_lowercase();
            if label.starts_with("entail") {
                entailment = Some(id);
            } else if label.starts_with("contradict") {
                contradiction = Some(id);
            }
        }

        match (entailment, contradiction) {
            (Some(entailment), Some(contradiction)) => Ok(Self {
                entailment,
                contradiction,
                count: id2label.len(),
            }),
            _ => Err(Error::config(
                "Model is not an NLI classifier: id2label lacks entailment/contradiction",
            )),
        }
    }
}

fn logit_at(logits: &[f32], index: usize) -> Result<f32> {
    logits
        .get(index)
        .copied()
        .ok_or_else(|| Error::backend(format!("Logit index {} out of range", index)))
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn multi_label_scores(contradiction: &[f32], entailment: &[f32]) -> Vec<f32> {
    contradiction
        .iter()
        .zip(entailment)
        .map(|(&c, &e)| softmax(&[c, e])[1])
        .collect()
}

/// Pair labels with scores, best first
fn rank(labels: &[String], scores: Vec<f32>) -> Vec<ScorePair> {
    let mut pairs: Vec<ScorePair> = labels
        .iter()
        .cloned()
        .zip(scores)
        .map(|(label, score)| ScorePair { label, score })
        .collect();
    pairs.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    pairs
}

fn get_device(device_str: &str) -> Result<Device> {
    match device_str.to_lowercase().as_str() {
        "cuda" | "cuda:0" => Device::new_cuda(0)
            .map_err(|e| Error::config(format!("Failed to initialize CUDA: {}", e))),
        "mps" | "metal" => Device::new_metal(0)
            .map_err(|e| Error::config(format!("Failed to initialize Metal: {}", e))),
        _ => Ok(Device::Cpu),
    }
}

fn load_var_builder(weights: &Weights, device: &Device) -> Result<VarBuilder<'static>> {
    match weights {
        Weights::SafeTensors(path) => {
            // SAFETY: the hub cache file is not modified while mapped.
            unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device) }
                .map_err(|e| Error::config(format!("Failed to load SafeTensors: {}", e)))
        }
        Weights::PyTorch(path) => VarBuilder::from_pth(path, DType::F32, device)
            .map_err(|e| Error::config(format!("Failed to load PyTorch weights: {}", e))),
    }
}

fn load_tokenizer(source: &TokenizerSource) -> Result<Tokenizer> {
    match source {
        TokenizerSource::Json(path) => Tokenizer::from_file(path)
            .map_err(|e| Error::config(format!("Failed to load tokenizer.json: {}", e))),
        TokenizerSource::Vocab(path) => tokenizer_from_vocab(path),
    }
}

fn tokenizer_from_vocab(vocab_path: &Path) -> Result<Tokenizer> {
    use tokenizers::models::wordpiece::WordPiece;
    use tokenizers::normalizers::BertNormalizer;
    use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
    use tokenizers::processors::bert::BertProcessing;

    let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|e| Error::config(format!("Failed to build WordPiece model: {}", e)))?;

    let mut tokenizer = Tokenizer::new(wordpiece);
    tokenizer.with_normalizer(Some(BertNormalizer::default()));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
    tokenizer.with_post_processor(Some(BertProcessing::new(
        ("[SEP]".to_string(), 102),
        ("[CLS]".to_string(), 101),
    )));

    Ok(tokenizer)
}
