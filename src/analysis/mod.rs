//! Analysis of acquired data
//!
//! - [`search`]: keyword search over the case tree
//! - [`context`]: evidence context and prompts for the AI assistant
//! - [`ai`]: Gemini / Ollama client (feature `ai-assistant`)
//! - [`ileapp`]: external iLEAPP parser

#[cfg(feature = "ai-assistant")]
pub mod ai;
pub mod context;
pub mod ileapp;
pub mod search;

pub use context::{build_prompt, AnalysisKind};
pub use search::{parse_keywords, search_tree, SearchHit, SearchReport};
