//! Token-count estimation for response metadata
//!
//! Estimates how many LLM tokens a serialised payload will consume so that
//! clients can budget their context windows. No exact tokenizer ships with
//! the service, so counts degrade deterministically to a byte-length
//! heuristic of roughly four bytes per token; the model-to-encoding mapping
//! is kept as the seam where an exact tokenizer would plug in.

use std::num::NonZeroUsize;
use std::sync::{Mutex, OnceLock};

use lru::LruCache;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use super::{ResponseStatus, ToolResponse};

pub const DEFAULT_MODEL: &str = "claude";
pub const DEFAULT_ENCODING: &str = "cl100k_base";

const CACHE_CAPACITY: usize = 1024;

/// Map a model identifier to its tokenizer encoding. Unknown identifiers
/// fall back to the default encoding.
pub fn encoding_for_model(model: &str) -> &'static str {
    match model {
        "claude" | "gpt-3.5" | "gpt-4" | "gpt-4o" | "palm" | "gemini" | "mistral" | "llama" => {
            "cl100k_base"
        }
        _ => DEFAULT_ENCODING,
    }
}

fn cache() -> &'static Mutex<LruCache<(String, String), usize>> {
    static CACHE: OnceLock<Mutex<LruCache<(String, String), usize>>> = OnceLock::new();
    CACHE.get_or_init(|| {
        Mutex::new(LruCache::new(
            NonZeroUsize::new(CACHE_CAPACITY).expect("non-zero cache capacity"),
        ))
    })
}

fn encoded_len(text: &str, _encoding: &'static str) -> usize {
    // ~4 UTF-8 bytes per token, integer division
    text.len() / 4
}

/// Count the tokens in a text for the given model. Results are cached in a
/// bounded LRU keyed by (text, model); the cache tolerates concurrent
/// lookups and inserts.
pub fn count_tokens(text: &str, model: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let key = (text.to_string(), model.to_string());
    if let Some(&count) = cache().lock().expect("token cache poisoned").get(&key) {
        return count;
    }

    let count = encoded_len(text, encoding_for_model(model));
    cache().lock().expect("token cache poisoned").put(key, count);
    count
}

/// Count the tokens of the compact JSON serialisation of a value.
/// Null counts as zero; so does a value that fails to serialise.
pub fn count_json_tokens(value: &Value, model: &str) -> usize {
    if value.is_null() {
        return 0;
    }
    match serde_json::to_string(value) {
        Ok(text) => count_tokens(&text, model),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialise value for token counting");
            0
        }
    }
}

/// Per-section token counts of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct TokenBreakdown {
    pub data: usize,
    pub metadata: usize,
    pub status: usize,
}

/// Estimate the token footprint of a response, broken down by section.
/// The total always equals the sum of the sections.
pub fn estimate_response_tokens(
    response: &ToolResponse,
    model: &str,
    include_metadata: bool,
) -> (usize, TokenBreakdown) {
    let data = response
        .data
        .as_ref()
        .map(|d| count_json_tokens(d, model))
        .unwrap_or(0);

    let metadata = if include_metadata {
        response
            .metadata
            .as_ref()
            .and_then(|m| serde_json::to_value(m).ok())
            .map(|v| count_json_tokens(&v, model))
            .unwrap_or(0)
    } else {
        0
    };

    let status = match response.status {
        ResponseStatus::Success => count_tokens("success", model),
        ResponseStatus::Error => count_tokens("error", model),
    };

    let breakdown = TokenBreakdown { data, metadata, status };
    (data + metadata + status, breakdown)
}

/// Whether a response of `token_count` tokens should be truncated, with the
/// threshold adjusted per model family: 20% lower for gpt-3.x, 20% higher
/// for gpt-4.x.
pub fn should_truncate(token_count: usize, threshold: usize, model: &str) -> bool {
    let adjusted = if model.starts_with("gpt-3") {
        threshold as f64 * 0.8
    } else if model.starts_with("gpt-4") {
        threshold as f64 * 1.2
    } else {
        threshold as f64
    };
    token_count as f64 > adjusted
}

/// Usage tier label for a token count.
pub fn usage_tier(token_count: usize) -> &'static str {
    if token_count < 500 {
        "minimal"
    } else if token_count < 2000 {
        "standard"
    } else if token_count < 5000 {
        "intensive"
    } else {
        "excessive"
    }
}
