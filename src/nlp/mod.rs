//! Text processing: cleaning, embeddings, and LLM-backed labeling and extraction.

pub mod attributes;
pub mod clean;
pub mod completion;
pub mod embeddings;
pub mod labels;
pub mod lemma;
pub mod openai;
pub mod problems;
pub mod products;

pub use attributes::{Attribute, AttributeExtractor, ReviewAttributes};
pub use clean::{CleanOutput, CleanerConfig, TextCleaner};
pub use completion::{CompletionRequest, CompletionService};
pub use embeddings::{Embedder, EmbeddingOutcome, RetryPolicy};
pub use labels::{ClusterLabeler, LabelReport};
pub use openai::OpenAiClient;
pub use problems::ProblemStatement;
pub use products::ProductDescription;
