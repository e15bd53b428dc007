//! # cascade-classify — function tier classifier
//!
//! Implements `cascade-protocol`'s [`cascade_protocol::classify::Classifier`]
//! trait (component E): a deterministic keyword/shape heuristic
//! ([`HeuristicClassifier`]) usable standalone or as the fallback a real
//! model-backed classifier delegates to when its backend is
//! unavailable, plus a bounded TTL cache ([`CachingClassifier`]) that
//! wraps any classifier.

#![deny(missing_docs)]

mod cache;
mod heuristic;

pub use cache::{CachingClassifier, DEFAULT_CAPACITY, DEFAULT_TTL};
pub use heuristic::HeuristicClassifier;
