use std::borrow::Cow;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use ipnetwork::IpNetwork;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use warden_core::MatchingFn;

/// Process-wide cache of compiled patterns used by the matching functions.
static REGEX_CACHE: Lazy<RwLock<HashMap<String, Regex>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Get a compiled regex from the cache, or compile and cache it.
fn cached_regex(pattern: &str) -> Option<Regex> {
    if let Some(re) = REGEX_CACHE
        .read()
        .ok()
        .and_then(|cache| cache.get(pattern).cloned())
    {
        return Some(re);
    }

    let re = Regex::new(pattern).ok()?;
    if let Ok(mut cache) = REGEX_CACHE.write() {
        cache.insert(pattern.to_string(), re.clone());
    }
    Some(re)
}

// ---------------------------------------------------------------------------
// Built-in matchers
// ---------------------------------------------------------------------------

/// URL-path match where `*` matches everything from its position on.
///
/// `/foo/bar` matches `/foo/*`; without a `*` the paths must be equal.
pub fn key_match(key1: &str, key2: &str) -> bool {
    match key2.find('*') {
        None => key1 == key2,
        Some(i) => {
            if key1.len() > i {
                key1.get(..i) == key2.get(..i)
            } else {
                key1 == &key2[..i]
            }
        }
    }
}

/// URL-path match with `:param` single-segment wildcards.
///
/// `/alice_data/:resource` matches `/alice_data/resource1` but not
/// `/alice_data2/myid` or a path with extra segments.
pub fn key_match2(key1: &str, key2: &str) -> bool {
    static PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r":[^/]+").expect("valid pattern"));
    let pattern = key2.replace("/*", "/.*");
    let pattern = PARAM.replace_all(&pattern, "[^/]+");
    regex_match(key1, &format!("^{pattern}$"))
}

/// URL-path match with `{param}` single-segment wildcards.
pub fn key_match3(key1: &str, key2: &str) -> bool {
    static PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^/]+\}").expect("valid pattern"));
    let pattern = key2.replace("/*", "/.*");
    let pattern = PARAM.replace_all(&pattern, "[^/]+");
    regex_match(key1, &format!("^{pattern}$"))
}

/// Unanchored regular-expression match of `key1` against `pattern`.
/// An invalid pattern matches nothing.
pub fn regex_match(key1: &str, pattern: &str) -> bool {
    cached_regex(pattern)
        .map(|re| re.is_match(key1))
        .unwrap_or(false)
}

/// CIDR-aware IP containment check.
///
/// The pattern may be a network (`192.168.2.0/24`) or a bare address, which
/// parses as a single-address network. Unparseable inputs match nothing.
pub fn ip_match(ip: &str, pattern: &str) -> bool {
    let addr = match ip.trim().parse::<IpAddr>() {
        Ok(addr) => addr,
        Err(_) => return false,
    };
    pattern
        .trim()
        .parse::<IpNetwork>()
        .map(|network| network.contains(addr))
        .unwrap_or(false)
}

/// Glob match over path-like strings.
///
/// Supports `*` (any characters except `/`), `**` (any characters including
/// `/`), and `?` (a single character).
pub fn glob_match(key1: &str, pattern: &str) -> bool {
    // Order matters: handle ** before * to avoid double replacement
    let pattern = pattern
        .replace("**", "\x00")
        .replace('*', "[^/]*")
        .replace('\x00', ".*")
        .replace('?', ".");
    regex_match(key1, &format!("^{pattern}$"))
}

// ---------------------------------------------------------------------------
// FunctionMap — named matcher functions, built-in and caller-supplied
// ---------------------------------------------------------------------------

/// Named functions callable from matcher expressions.
///
/// Starts out holding the built-in matchers under their matcher-visible
/// names. Registering a function under an existing name replaces it, so a
/// caller-supplied function overrides a built-in of the same name.
#[derive(Clone)]
pub struct FunctionMap {
    functions: HashMap<String, MatchingFn>,
}

impl Default for FunctionMap {
    fn default() -> Self {
        let mut map = FunctionMap {
            functions: HashMap::new(),
        };
        map.register("keyMatch", wrap_str2(key_match));
        map.register("keyMatch2", wrap_str2(key_match2));
        map.register("keyMatch3", wrap_str2(key_match3));
        map.register("regexMatch", wrap_str2(regex_match));
        map.register("ipMatch", wrap_str2(ip_match));
        map.register("globMatch", wrap_str2(glob_match));
        map
    }
}

impl FunctionMap {
    /// Registers a function under `name`, replacing any existing entry.
    pub fn register(&mut self, name: &str, f: MatchingFn) {
        self.functions.insert(name.to_string(), f);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, for matcher identifier resolution.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MatchingFn)> {
        self.functions.iter().map(|(name, f)| (name.as_str(), f))
    }
}

/// Adapts a two-string predicate to the positional calling convention.
fn wrap_str2(f: fn(&str, &str) -> bool) -> MatchingFn {
    Arc::new(move |args: &[Value]| match args {
        [a, b] => f(&value_as_str(a), &value_as_str(b)),
        _ => false,
    })
}

/// String view of an argument value; non-strings render through their JSON
/// form.
pub(crate) fn value_as_str(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}
