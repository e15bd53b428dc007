//! # cascade-auth — tier authorization guard
//!
//! Implements `cascade-protocol`'s
//! [`cascade_protocol::auth::AuthorizationGuard`] trait (component H).
//! Most of the enforcement logic already lives in `cascade-protocol`'s
//! default trait method, modeled on `neuron-auth`'s capability check;
//! this crate supplies the two concrete guards an embedder picks
//! between, and nothing else.

#![deny(missing_docs)]

use cascade_protocol::auth::{AuthorizationGuard, Principal, ScopeRegistry};
use cascade_protocol::error::AuthError;
use cascade_protocol::tier::Tier;

/// The default guard: enforces the scope registry against whatever
/// principal the caller passes in. Passing `None` to
/// [`AuthorizationGuard::authorize`] disables enforcement for that
/// call, per spec §4.H — this type doesn't make that decision for you.
#[derive(Debug, Clone, Default)]
pub struct ScopedGuard {
    registry: ScopeRegistry,
}

impl ScopedGuard {
    /// Construct a guard over the standard tier scope registry.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthorizationGuard for ScopedGuard {
    fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }
}

/// An explicit, named opt-out: every tier is authorized unconditionally,
/// regardless of the principal passed in.
///
/// Spec §4.H requires disabling authorization to be "a deliberate,
/// explicit configuration" — constructing this type *is* that
/// deliberate act, as opposed to merely forgetting to pass a principal
/// through [`ScopedGuard`]. Reach for this only in trusted contexts
/// (e.g. an internal control plane that is never exposed to untrusted
/// callers).
#[derive(Debug, Clone, Default)]
pub struct TrustedGuard {
    registry: ScopeRegistry,
}

impl TrustedGuard {
    /// Construct the always-allow guard.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthorizationGuard for TrustedGuard {
    fn authorize(&self, _principal: Option<&Principal>, _tier: Tier) -> Result<(), AuthError> {
        Ok(())
    }

    fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_guard_enforces_tier_scopes() {
        let guard = ScopedGuard::new();
        assert!(guard
            .authorize(Some(&Principal::none()), Tier::Generative)
            .is_err());
        let principal = Principal::with_scopes(["functions:tier:generative"]);
        assert!(guard.authorize(Some(&principal), Tier::Generative).is_ok());
    }

    #[test]
    fn scoped_guard_allows_code_tier_for_scopeless_principal() {
        let guard = ScopedGuard::new();
        assert!(guard.authorize(Some(&Principal::none()), Tier::Code).is_ok());
    }

    #[test]
    fn trusted_guard_allows_every_tier_unconditionally() {
        let guard = TrustedGuard::new();
        assert!(guard
            .authorize(Some(&Principal::none()), Tier::Human)
            .is_ok());
    }
}
