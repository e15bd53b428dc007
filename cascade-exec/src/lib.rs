//! # cascade-exec — the cascade executor state machine
//!
//! Implements component G (spec §4.G): walks a function's tier order,
//! escalating on every failure except an authorization denial, which
//! terminates the cascade immediately.

#![deny(missing_docs)]

mod cancel;
mod executor;

pub use cancel::CancellationSignal;
pub use executor::CascadeExecutor;
