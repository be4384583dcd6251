use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{WardenError, WardenResult};

// ---------------------------------------------------------------------------
// Effect — the outcome tag carried by a matched policy rule
// ---------------------------------------------------------------------------

/// The outcome tag attached to a policy rule.
///
/// A rule without an explicit effect column is an allow rule. Any tag other
/// than `allow`/`deny` is indeterminate; only priority aggregation gives
/// that a meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
    Indeterminate,
}

impl Effect {
    /// Maps a policy row's effect column onto an [`Effect`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "" | "allow" => Effect::Allow,
            "deny" => Effect::Deny,
            _ => Effect::Indeterminate,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => write!(f, "allow"),
            Effect::Deny => write!(f, "deny"),
            Effect::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

// ---------------------------------------------------------------------------
// EffectKind — the closed set of supported effect expressions
// ---------------------------------------------------------------------------

/// Aggregation strategy declared by the model's policy-effect section.
///
/// Effect expressions are a fixed enumeration, not an expression language:
/// text outside this set is a configuration error at model-load time, never
/// a per-decision failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// `some(where (p_eft == allow))` — allow iff at least one matched
    /// allow rule exists.
    AllowOverride,
    /// `!some(where (p_eft == deny))` — allow unless a matched deny rule
    /// exists.
    DenyGuard,
    /// `some(where (p_eft == allow)) && !some(where (p_eft == deny))` —
    /// requires a matched allow and forbids any matched deny.
    AllowAndDeny,
    /// `priority(p_eft) || deny` — the first matched rule, in given order,
    /// decides.
    Priority,
}

impl EffectKind {
    /// Parses a rewritten effect expression. Whitespace-insensitive.
    pub fn parse(expr: &str) -> WardenResult<Self> {
        let squeezed: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
        match squeezed.as_str() {
            "some(where(p_eft==allow))" => Ok(EffectKind::AllowOverride),
            "!some(where(p_eft==deny))" => Ok(EffectKind::DenyGuard),
            "some(where(p_eft==allow))&&!some(where(p_eft==deny))" => Ok(EffectKind::AllowAndDeny),
            "priority(p_eft)||deny" => Ok(EffectKind::Priority),
            _ => Err(WardenError::Config(format!(
                "unsupported effect expression: '{expr}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// MatchResult — per-rule evaluation outcome
// ---------------------------------------------------------------------------

/// One policy rule's evaluation outcome, fed to the effector in rule order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: bool,
    pub effect: Effect,
}

// ---------------------------------------------------------------------------
// Decision — final verdict for one request
// ---------------------------------------------------------------------------

/// Final verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    /// Index of the policy rule that determined the outcome, when a single
    /// rule did.
    pub rule_index: Option<usize>,
    /// Set when a priority decision landed on a rule whose effect tag was
    /// neither allow nor deny. The request is denied; the flag marks the
    /// ambiguity as a policy-data problem rather than an engine failure.
    pub indeterminate: bool,
}

impl Decision {
    pub fn deny() -> Self {
        Decision {
            allowed: false,
            rule_index: None,
            indeterminate: false,
        }
    }

    pub fn allow() -> Self {
        Decision {
            allowed: true,
            rule_index: None,
            indeterminate: false,
        }
    }
}
