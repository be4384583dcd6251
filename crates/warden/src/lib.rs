//! Warden authorization decision engine
//!
//! Given a declarative access-control model and a table of policy rules,
//! warden decides whether a request (subject, object, action, optional
//! domain) is permitted. The model text declares the request shape, the
//! policy shape, role hierarchies, the effect rule, and a matcher
//! expression; the engine supplies everything else.
//!
//! Key pieces:
//! - Model definition language parser with syntax-aware reference rewriting
//! - Sandboxed matcher expression evaluation with pluggable named functions
//! - Domain-scoped role hierarchies with cycle-safe reachability
//! - Configurable effect aggregation (allow-override, deny-override,
//!   combined, priority)
//!
//! Policy persistence, change watchers, and transport integration are the
//! caller's concern: rules arrive as in-memory rows and decisions leave as
//! plain values.

pub mod effect;
pub mod enforcer;
pub mod expr;
pub mod functions;
pub mod model;
pub mod role;

// Re-export primary types for convenience
pub use effect::{Effector, EffectorStream};
pub use enforcer::Enforcer;
pub use expr::{CompiledMatcher, ExpressionEngine};
pub use functions::FunctionMap;
pub use model::{Assertion, Model};
pub use role::DefaultRoleManager;
pub use warden_core::{
    Decision, Effect, EffectKind, MatchResult, MatchingFn, RoleManager, WardenError, WardenResult,
};
