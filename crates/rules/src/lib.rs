//! Classification rules, allow lists and the pattern PII engine.

pub mod allow_list;
pub mod catalog;
pub mod engine;
pub mod recognizers;

pub use allow_list::{AllowList, AllowListConfig, ExtendedAllowList};
pub use catalog::{DocumentTypeClassifier, DocumentTypeProfile};
pub use engine::{PatternEngine, TextPiiDetector};
pub use recognizers::{Pattern, PatternRecognizer, RecognizerConfig};

pub type Result<T> = std::result::Result<T, RulesError>;

#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    ConfigParse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid regex in pattern '{name}': {source}")]
    InvalidPattern {
        name: String,
        source: regex::Error,
    },
}
