use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use warden_core::{
    Decision, Effect, EffectKind, MatchingFn, RoleManager, WardenError, WardenResult,
};

use crate::effect::Effector;
use crate::expr::{CompiledMatcher, ExpressionEngine};
use crate::functions::{value_as_str, FunctionMap};
use crate::model::Model;
use crate::role::DefaultRoleManager;

// ---------------------------------------------------------------------------
// Enforcer — binds requests and policy rules, evaluates, aggregates
// ---------------------------------------------------------------------------

/// The decision orchestrator.
///
/// Owns the parsed model, the in-memory policy rule table, one role manager
/// per role-hierarchy section, and the expression engine. Decisions take
/// `&self` and only read; policy and role-graph mutation require exclusive
/// access, so a load phase and a decision phase never overlap on the same
/// handle.
pub struct Enforcer {
    model: Model,
    effector: Effector,
    functions: FunctionMap,
    role_managers: HashMap<String, Arc<RwLock<DefaultRoleManager>>>,
    engine: ExpressionEngine,
    matcher: CompiledMatcher,
    policies: HashMap<String, Vec<Vec<String>>>,
}

impl Enforcer {
    /// Builds an enforcer over a parsed model with the built-in matching
    /// functions.
    pub fn new(model: Model) -> WardenResult<Self> {
        Self::with_functions(model, FunctionMap::default())
    }

    /// Builds an enforcer with a caller-assembled function set.
    ///
    /// Everything that can fail does so here, before the first decision:
    /// the effect expression must be one of the supported kinds, the
    /// matcher must compile, and every identifier in it must resolve to a
    /// request/policy field or a function.
    pub fn with_functions(model: Model, functions: FunctionMap) -> WardenResult<Self> {
        let effect = model
            .assertion("e", "e")
            .ok_or_else(|| WardenError::Config("model has no policy_effect entry 'e'".into()))?;
        let effector = Effector::new(EffectKind::parse(&effect.value)?);

        let mut functions = functions;
        let mut role_managers = HashMap::new();
        for key in model.role_keys() {
            let manager = Arc::new(RwLock::new(DefaultRoleManager::new()));
            functions.register(key, role_function(manager.clone()));
            role_managers.insert(key.to_string(), manager);
        }

        let engine = ExpressionEngine::new(&functions);
        let matcher = compile_matcher(&model, &engine)?;

        Ok(Self {
            model,
            effector,
            functions,
            role_managers,
            engine,
            matcher,
            policies: HashMap::new(),
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Replaces the policy rule table for `ptype` after arity-checking
    /// every row against the section's field list.
    pub fn set_policy(&mut self, ptype: &str, rules: Vec<Vec<String>>) -> WardenResult<()> {
        let tokens = self.model.tokens("p", ptype).ok_or_else(|| {
            WardenError::Config(format!("model has no policy_definition entry '{ptype}'"))
        })?;
        for (index, rule) in rules.iter().enumerate() {
            if rule.len() != tokens.len() {
                return Err(WardenError::Config(format!(
                    "policy rule {} has {} fields, '{}' declares {}",
                    index,
                    rule.len(),
                    ptype,
                    tokens.len()
                )));
            }
        }
        self.policies.insert(ptype.to_string(), rules);
        Ok(())
    }

    /// Populates the role graph for `gtype` from policy rows gathered
    /// during the load phase: two fields form a membership edge, a third
    /// scopes the edge to a domain.
    pub fn build_role_links(&mut self, gtype: &str, rows: &[Vec<String>]) -> WardenResult<()> {
        let manager = self.role_managers.get(gtype).ok_or_else(|| {
            WardenError::Config(format!("model has no role_definition entry '{gtype}'"))
        })?;
        let mut manager = manager
            .write()
            .map_err(|_| WardenError::Config("role graph lock poisoned".into()))?;
        for (index, row) in rows.iter().enumerate() {
            match row.as_slice() {
                [member, role] => manager.add_link(member, role, None),
                [member, role, domain, ..] => manager.add_link(member, role, Some(domain)),
                _ => {
                    return Err(WardenError::Config(format!(
                        "role row {index} needs at least 2 fields"
                    )))
                }
            }
        }
        Ok(())
    }

    /// Registers a caller-supplied matching function, replacing any
    /// built-in of the same name, and recompiles the matcher against the
    /// new function set.
    pub fn register_function(&mut self, name: &str, f: MatchingFn) -> WardenResult<()> {
        self.functions.register(name, f);
        self.engine = ExpressionEngine::new(&self.functions);
        self.matcher = compile_matcher(&self.model, &self.engine)?;
        Ok(())
    }

    /// The role manager backing a role-hierarchy section, if declared.
    pub fn role_manager(&self, gtype: &str) -> Option<Arc<RwLock<DefaultRoleManager>>> {
        self.role_managers.get(gtype).cloned()
    }

    /// Roles directly held by `name` in the primary hierarchy.
    pub fn get_roles_for_user(&self, name: &str, domain: Option<&str>) -> Vec<String> {
        match self.role_managers.get("g").and_then(|m| m.read().ok()) {
            Some(manager) => manager.get_roles(name, domain),
            None => Vec::new(),
        }
    }

    /// Members directly holding `name` in the primary hierarchy.
    pub fn get_users_for_role(&self, name: &str, domain: Option<&str>) -> Vec<String> {
        match self.role_managers.get("g").and_then(|m| m.read().ok()) {
            Some(manager) => manager.get_users(name, domain),
            None => Vec::new(),
        }
    }

    /// Runs one authorization decision.
    pub fn enforce(&self, request: &[Value]) -> WardenResult<bool> {
        self.decide(request).map(|decision| decision.allowed)
    }

    /// Runs one authorization decision with full provenance: the verdict,
    /// the decisive rule index when one rule determined it, and the
    /// indeterminate marker for ambiguous priority outcomes.
    pub fn decide(&self, request: &[Value]) -> WardenResult<Decision> {
        let request_tokens = self
            .model
            .tokens("r", "r")
            .ok_or_else(|| WardenError::Config("model has no request_definition entry 'r'".into()))?;
        if request.len() != request_tokens.len() {
            return Err(WardenError::Config(format!(
                "request has {} arguments, 'r' declares {} fields",
                request.len(),
                request_tokens.len()
            )));
        }

        let mut bindings: Vec<(String, Value)> = request_tokens
            .iter()
            .cloned()
            .zip(request.iter().cloned())
            .collect();

        let mut stream = self.effector.stream();

        match self.model.tokens("p", "p") {
            Some(policy_tokens) => {
                let eft_index = policy_tokens.iter().position(|t| t == "p_eft");
                let rules = self.policies.get("p").map(Vec::as_slice).unwrap_or_default();
                let base = bindings.len();
                for rule in rules {
                    bindings.truncate(base);
                    bindings.extend(
                        policy_tokens
                            .iter()
                            .cloned()
                            .zip(rule.iter().map(|field| Value::String(field.clone()))),
                    );
                    let matched = self.engine.evaluate_bool(&self.matcher, &bindings)?;
                    let effect = match eft_index {
                        Some(i) => Effect::from_tag(&rule[i]),
                        None => Effect::Allow,
                    };
                    if stream.push(matched, effect) {
                        break;
                    }
                }
            }
            None => {
                // no policy shape at all: the request fields alone drive
                // the matcher
                let matched = self.engine.evaluate_bool(&self.matcher, &bindings)?;
                stream.push(matched, Effect::Allow);
            }
        }

        let decision = stream.finish();
        if decision.indeterminate {
            tracing::warn!(
                rule = ?decision.rule_index,
                "priority decision resolved indeterminate, denying"
            );
        }
        tracing::debug!(
            allowed = decision.allowed,
            rule = ?decision.rule_index,
            "authorization decision"
        );
        Ok(decision)
    }
}

fn compile_matcher(model: &Model, engine: &ExpressionEngine) -> WardenResult<CompiledMatcher> {
    let matcher = model
        .assertion("m", "m")
        .ok_or_else(|| WardenError::Config("model has no matcher entry 'm'".into()))?;
    engine.compile(&matcher.value, &known_names(model))
}

/// Every identifier the matcher may reference bare: the request and policy
/// field tokens of all declared sections.
fn known_names(model: &Model) -> HashSet<String> {
    let mut names = HashSet::new();
    for sec in ["r", "p"] {
        for assertion in model.assertions_in(sec) {
            names.extend(assertion.tokens.iter().cloned());
        }
    }
    names
}

/// Wraps a role manager as a matcher-callable function: two arguments ask
/// for reachability in the implicit domain, a third scopes the query to
/// that domain.
fn role_function(manager: Arc<RwLock<DefaultRoleManager>>) -> MatchingFn {
    Arc::new(move |args: &[Value]| {
        let manager = match manager.read() {
            Ok(manager) => manager,
            Err(_) => return false,
        };
        match args {
            [member, role] => manager.has_link(&value_as_str(member), &value_as_str(role), None),
            [member, role, domain] => manager.has_link(
                &value_as_str(member),
                &value_as_str(role),
                Some(&value_as_str(domain)),
            ),
            _ => false,
        }
    })
}
