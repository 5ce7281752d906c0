// Log template mining
//
// Groups raw log message bodies into a fixed vocabulary of templates. Two
// messages share a template when they are identical or when the cosine
// similarity of their character-presence vectors exceeds a threshold
// (default 0.80). Template ids are dense and assigned once; every downstream
// model refers to templates by id, so the mined set is persisted and restored
// verbatim.

mod cache;
mod set;
mod similarity;
mod union_find;

pub use cache::{build_or_load, load_cache, save_cache, TemplateCache, TEMPLATE_CACHE_VERSION};
pub use set::{Template, TemplateId, TemplateSet};
pub use similarity::{similarity, CharSet};
pub use union_find::UnionFind;

use crate::ratio::RatioError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("unknown template id {0}")]
    UnknownTemplate(TemplateId),

    #[error("template cache version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("invalid template cache: {0}")]
    InvalidCache(String),

    #[error(transparent)]
    Ratio(#[from] RatioError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
