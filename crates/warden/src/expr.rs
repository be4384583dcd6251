use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::RwLock;

use rhai::{Dynamic, Engine, Scope, AST};
use serde_json::Value;

use warden_core::{MatchingFn, WardenError, WardenResult};

use crate::functions::FunctionMap;

/// Keywords that may appear bare in a matcher expression.
const KEYWORDS: &[&str] = &["true", "false", "in"];

// ---------------------------------------------------------------------------
// ExpressionEngine — sandboxed matcher evaluation
// ---------------------------------------------------------------------------

/// Compiles and evaluates matcher expressions over named bindings.
///
/// The engine is created once per function set and reused for every
/// decision. Expressions compile to an AST exactly once and are cached by
/// hash; only the evaluation scope is rebuilt per call.
pub struct ExpressionEngine {
    engine: Engine,
    function_names: HashSet<String>,
    ast_cache: RwLock<HashMap<u64, AST>>,
}

/// A matcher compiled against a specific engine's function set.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    ast: AST,
}

impl ExpressionEngine {
    /// Builds a sandboxed engine with every function in `functions`
    /// registered for one to four positional arguments.
    pub fn new(functions: &FunctionMap) -> Self {
        let mut engine = Engine::new();

        engine.set_max_operations(100_000);
        engine.set_max_call_levels(16);
        engine.set_max_expr_depths(64, 64);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(1_000);
        engine.disable_symbol("eval");

        for (name, func) in functions.iter() {
            register_variadic(&mut engine, name, func.clone());
        }

        Self {
            engine,
            function_names: functions.names().map(str::to_string).collect(),
            ast_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Compiles a matcher expression.
    ///
    /// Fails when the text does not parse as an expression, or when it
    /// references an identifier that is neither a known bound name, a
    /// registered function, nor a keyword.
    pub fn compile(
        &self,
        text: &str,
        known_names: &HashSet<String>,
    ) -> WardenResult<CompiledMatcher> {
        validate_identifiers(text, known_names, &self.function_names)?;

        let hash = hash_expression(text);
        if let Some(ast) = self
            .ast_cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&hash).cloned())
        {
            return Ok(CompiledMatcher { ast });
        }

        let ast = self
            .engine
            .compile_expression(text)
            .map_err(|e| WardenError::Syntax(format!("'{text}': {e}")))?;

        if let Ok(mut cache) = self.ast_cache.write() {
            cache.insert(hash, ast.clone());
        }
        Ok(CompiledMatcher { ast })
    }

    /// Evaluates a compiled matcher against the given bindings.
    ///
    /// The result must be a boolean; anything else, and any runtime
    /// failure, surfaces as an evaluation error instead of a deny.
    pub fn evaluate_bool(
        &self,
        matcher: &CompiledMatcher,
        bindings: &[(String, Value)],
    ) -> WardenResult<bool> {
        let mut scope = Scope::new();
        for (name, value) in bindings {
            scope.push_dynamic(name.clone(), value_to_dynamic(value));
        }

        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &matcher.ast)
            .map_err(|e| WardenError::Evaluation(e.to_string()))?;

        result.as_bool().map_err(|actual| {
            WardenError::Evaluation(format!("matcher evaluated to {actual}, expected bool"))
        })
    }
}

/// Registers one named callable for every supported positional arity.
///
/// All arities dispatch to the same underlying function, which receives its
/// arguments as a slice.
fn register_variadic(engine: &mut Engine, name: &str, func: MatchingFn) {
    let f = func.clone();
    engine.register_fn(name, move |a: Dynamic| -> bool { f(&[dynamic_to_value(a)]) });
    let f = func.clone();
    engine.register_fn(name, move |a: Dynamic, b: Dynamic| -> bool {
        f(&[dynamic_to_value(a), dynamic_to_value(b)])
    });
    let f = func.clone();
    engine.register_fn(name, move |a: Dynamic, b: Dynamic, c: Dynamic| -> bool {
        f(&[dynamic_to_value(a), dynamic_to_value(b), dynamic_to_value(c)])
    });
    let f = func;
    engine.register_fn(
        name,
        move |a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| -> bool {
            f(&[
                dynamic_to_value(a),
                dynamic_to_value(b),
                dynamic_to_value(c),
                dynamic_to_value(d),
            ])
        },
    );
}

fn hash_expression(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

// ---------------------------------------------------------------------------
// Value bridging
// ---------------------------------------------------------------------------

fn value_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Dynamic::from(i),
            None => Dynamic::from(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => {
            Dynamic::from(items.iter().map(value_to_dynamic).collect::<rhai::Array>())
        }
        Value::Object(fields) => {
            let mut map = rhai::Map::new();
            for (key, value) in fields {
                map.insert(key.as_str().into(), value_to_dynamic(value));
            }
            Dynamic::from(map)
        }
    }
}

fn dynamic_to_value(value: Dynamic) -> Value {
    if value.is::<()>() {
        return Value::Null;
    }
    if let Some(b) = value.clone().try_cast::<bool>() {
        return Value::Bool(b);
    }
    if let Some(i) = value.clone().try_cast::<i64>() {
        return Value::from(i);
    }
    if let Some(f) = value.clone().try_cast::<f64>() {
        return Value::from(f);
    }
    if let Some(map) = value.clone().try_cast::<rhai::Map>() {
        let mut fields = serde_json::Map::new();
        for (key, value) in map {
            fields.insert(key.to_string(), dynamic_to_value(value));
        }
        return Value::Object(fields);
    }
    if let Some(array) = value.clone().try_cast::<rhai::Array>() {
        return Value::Array(array.into_iter().map(dynamic_to_value).collect());
    }
    let fallback = value.to_string();
    match value.into_string() {
        Ok(s) => Value::String(s),
        Err(_) => Value::String(fallback),
    }
}

// ---------------------------------------------------------------------------
// Identifier validation
// ---------------------------------------------------------------------------

/// Scans an expression for identifier references before compilation.
///
/// Quote-aware: identifiers inside string literals are skipped. An
/// identifier followed by `(` must be a registered function; any other
/// identifier must be a bound name or keyword. Dotted attribute tails after
/// a bound name resolve against the bound value and are not checked here.
fn validate_identifiers(
    text: &str,
    known_names: &HashSet<String>,
    functions: &HashSet<String>,
) -> WardenResult<()> {
    let chars: Vec<char> = text.chars().collect();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                i += 1;
            }
            '.' => {
                i += 1;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
            }
            _ if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let mut j = i;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if chars.get(j) == Some(&'(') {
                    if !functions.contains(&ident) {
                        return Err(WardenError::Syntax(format!("unknown function '{ident}'")));
                    }
                } else if !known_names.contains(&ident) && !KEYWORDS.contains(&ident.as_str()) {
                    return Err(WardenError::Syntax(format!(
                        "unresolved identifier '{ident}'"
                    )));
                }
            }
            _ => {
                i += 1;
            }
        }
    }
    Ok(())
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
