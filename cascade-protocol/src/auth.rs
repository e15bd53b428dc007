//! The authorization guard protocol — component H.
//!
//! Modeled on `neuron-auth`'s shape (a capability set held by a
//! principal, checked against a requirement), generalized from
//! `layer0`'s permission vocabulary onto the fixed tier-scope
//! registry (`functions:tier:<tier>`, `*`).

use crate::error::AuthError;
use crate::tier::Tier;
use std::collections::HashSet;

/// The wildcard scope that grants every tier.
pub const WILDCARD_SCOPE: &str = "*";

/// An authenticated caller's capability set. `None` (no principal)
/// means authorization is disabled — spec §4.H requires this to be a
/// deliberate, explicit configuration, so callers should construct it
/// only via [`Principal::trusted`] or an explicit empty/populated scope set.
#[derive(Debug, Clone, Default)]
pub struct Principal {
    scopes: HashSet<String>,
}

impl Principal {
    /// A principal with exactly these scopes.
    pub fn with_scopes(scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    /// A principal with no scopes at all (distinct from "no principal";
    /// this one is checked and denied for every scoped tier).
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether this principal holds `scope` or the wildcard.
    pub fn grants(&self, scope: &str) -> bool {
        self.scopes.contains(scope) || self.scopes.contains(WILDCARD_SCOPE)
    }
}

/// Maps each tier to its required scope, spec §4.H. `Tier::Code`
/// requires no scope; the rest require `functions:tier:<tier>`.
#[derive(Debug, Clone)]
pub struct ScopeRegistry;

impl ScopeRegistry {
    /// The scope required to run `tier`, or `None` if unguarded.
    pub fn required_scope(&self, tier: Tier) -> Option<&'static str> {
        tier.required_scope()
    }
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self
    }
}

/// The authorization guard protocol, component H.
///
/// Authorization is disabled (`principal = None`) only when the
/// embedding application explicitly opts out of scope checks for a
/// trusted context — this is never the implicit default for an
/// authenticated request.
pub trait AuthorizationGuard: Send + Sync {
    /// Check whether `principal` (`None` disables enforcement) may run `tier`.
    fn authorize(&self, principal: Option<&Principal>, tier: Tier) -> Result<(), AuthError> {
        let Some(required) = self.registry().required_scope(tier) else {
            return Ok(());
        };
        let Some(principal) = principal else {
            return Ok(());
        };
        if principal.grants(required) {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                tier: tier.to_string(),
                required_scope: required.to_string(),
            })
        }
    }

    /// The scope registry this guard enforces against.
    fn registry(&self) -> &ScopeRegistry;
}
