//! # cascade-protocol — Protocol traits and wire types for the tiered cascade engine
//!
//! This crate defines the component boundaries of the tiered cascade
//! engine (spec §2): identifiers, durations, semver, the closed
//! error-kind vocabulary, and the trait for every component a
//! `cascade::CascadeEngine` composes.
//!
//! ## The components
//!
//! | # | Component | Trait | Module |
//! |---|-----------|-------|--------|
//! | A | Durations & IDs | — | [`id`], [`duration`], [`semver`] |
//! | B | Code/metadata store | [`store::CodeStore`] | [`store`] |
//! | C | Log aggregator | [`logs::LogAggregator`] | [`logs`] |
//! | D | Rate limiter | [`ratelimit::RateLimiter`] | [`ratelimit`] |
//! | E | Function classifier | [`classify::Classifier`] | [`classify`] |
//! | F | Tier dispatcher | [`dispatch::TierHandler`] | [`dispatch`] |
//! | G | Cascade executor | — (see `cascade-exec`) | [`tier`] |
//! | H | Authorization guard | [`auth::AuthorizationGuard`] | [`auth`] |
//! | I | Input validator | [`validate::InputValidator`] | [`validate`] |
//!
//! No concrete implementations live here. Each implementation crate
//! (`cascade-store`, `cascade-logs`, `cascade-ratelimit`,
//! `cascade-classify`, `cascade-auth`, `cascade-validate`,
//! `cascade-dispatch`, `cascade-exec`) depends on this one.
//!
//! ## Design Principle
//!
//! Every trait is operation-defined, not mechanism-defined, the same
//! way `layer0`'s protocol traits are: [`store::CodeStore::get_code`]
//! means "fetch this code, transparently", not "read this file" or
//! "query this table." This is what lets an in-memory store and a
//! future durable one implement the same contract.

#![deny(missing_docs)]

pub mod auth;
pub mod classify;
pub mod dispatch;
pub mod duration;
pub mod error;
pub mod id;
pub mod logs;
pub mod metadata;
pub mod ratelimit;
pub mod semver;
pub mod store;
pub mod tier;
pub mod validate;

pub use auth::{AuthorizationGuard, Principal, ScopeRegistry};
pub use classify::{Classification, ClassifyRequest, Classifier, CONFIDENCE_THRESHOLD};
pub use dispatch::{TierHandler, TierResponse};
pub use duration::DurationMs;
pub use error::{
    AuthError, CascadeError, ClassifierError, DispatchError, ErrorKind, LogError, ProtocolError,
    RateLimitError, StoreError, ValidationError,
};
pub use id::{CascadeId, ExecutionId, FunctionId, LogEntryId, RequestId};
pub use logs::{ExecutionWriter, LogAggregator, LogEntry, LogLevel, OutputChannel};
pub use metadata::{DeploymentRecord, DerivativeKind, FunctionMetadata, JsonSchema};
pub use ratelimit::{RateLimitDecision, RateLimiter, Window};
pub use semver::SemVer;
pub use store::CodeStore;
pub use tier::{
    AttemptStatus, CascadeMetrics, CascadeOptions, CascadeResult, StartTier, Tier, TierAttempt,
};
pub use validate::{InputValidator, ValidationIssue, ValidationOutcome};
