use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use warden_core::{WardenError, WardenResult};

/// Maps a `[section]` header to its single-letter section key.
fn section_key(header: &str) -> Option<&'static str> {
    match header {
        "request_definition" => Some("r"),
        "policy_definition" => Some("p"),
        "role_definition" => Some("g"),
        "policy_effect" => Some("e"),
        "matchers" => Some("m"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Assertion — one named definition inside a model section
// ---------------------------------------------------------------------------

/// One `name = value` entry of a model section.
///
/// For request/policy sections the value is a comma-separated field list and
/// `tokens` holds the flattened per-field identifiers (`r_sub`, `r_obj`, …).
/// For effect/matcher sections the stored value is already rewritten into
/// its engine-ready form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub key: String,
    pub value: String,
    pub tokens: Vec<String>,
}

// ---------------------------------------------------------------------------
// Model — parsed model definition
// ---------------------------------------------------------------------------

/// The parsed model definition: section key to assertion name to assertion.
///
/// Built once from text (or assembled with [`Model::add_def`]) and treated
/// as immutable by the enforcer afterwards; re-parsing replaces the whole
/// definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    sections: HashMap<String, HashMap<String, Assertion>>,
}

impl Model {
    /// Parses a model definition from its textual form.
    ///
    /// Line-oriented: `[section]` headers followed by `name = value`
    /// assignments; lines starting with `#` and blank lines are ignored.
    /// The request, policy-effect, and matcher sections are required; the
    /// policy and role sections are optional.
    pub fn from_text(text: &str) -> WardenResult<Self> {
        let mut model = Model::default();
        let mut current: Option<&'static str> = None;

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let sec = section_key(header.trim()).ok_or_else(|| {
                    WardenError::Parse(format!(
                        "line {}: unknown section '{}'",
                        lineno + 1,
                        header.trim()
                    ))
                })?;
                current = Some(sec);
                continue;
            }

            let sec = current.ok_or_else(|| {
                WardenError::Parse(format!(
                    "line {}: assignment outside of any section",
                    lineno + 1
                ))
            })?;
            let (key, value) = line.split_once('=').ok_or_else(|| {
                WardenError::Parse(format!("line {}: expected 'name = value'", lineno + 1))
            })?;
            let key = key.trim();
            if model.assertion(sec, key).is_some() {
                return Err(WardenError::Parse(format!(
                    "line {}: duplicate definition '{}'",
                    lineno + 1,
                    key
                )));
            }
            model.add_def(sec, key, value.trim())?;
        }

        model.require_section("r", "request_definition")?;
        model.require_section("e", "policy_effect")?;
        model.require_section("m", "matchers")?;
        Ok(model)
    }

    /// Inserts or replaces one definition entry.
    ///
    /// Request/policy values are split into their per-field tokens; other
    /// sections store the value rewritten into engine form immediately, so
    /// the stored text is always ready for evaluation.
    pub fn add_def(&mut self, sec: &str, key: &str, value: &str) -> WardenResult<()> {
        if value.is_empty() {
            return Err(WardenError::Parse(format!(
                "empty value for '{key}' in section '{sec}'"
            )));
        }
        let mut assertion = Assertion {
            key: key.to_string(),
            value: value.to_string(),
            tokens: Vec::new(),
        };
        if sec == "r" || sec == "p" {
            assertion.tokens = value
                .split(',')
                .map(|field| format!("{}_{}", key, field.trim()))
                .collect();
        } else {
            assertion.value = rewrite_assertion(value);
        }
        self.sections
            .entry(sec.to_string())
            .or_default()
            .insert(key.to_string(), assertion);
        Ok(())
    }

    /// Looks up one assertion.
    pub fn assertion(&self, sec: &str, key: &str) -> Option<&Assertion> {
        self.sections.get(sec).and_then(|entries| entries.get(key))
    }

    /// All assertions of one section, in unspecified order.
    pub fn assertions_in(&self, sec: &str) -> impl Iterator<Item = &Assertion> {
        self.sections
            .get(sec)
            .into_iter()
            .flat_map(|entries| entries.values())
    }

    /// True when the model declares any entry for the given section.
    pub fn has_section(&self, sec: &str) -> bool {
        self.sections
            .get(sec)
            .map_or(false, |entries| !entries.is_empty())
    }

    /// The field tokens of a request/policy assertion.
    pub fn tokens(&self, sec: &str, key: &str) -> Option<&[String]> {
        self.assertion(sec, key).map(|a| a.tokens.as_slice())
    }

    /// Names of every role-hierarchy assertion (`g`, `g2`, …), sorted.
    pub fn role_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .sections
            .get("g")
            .map(|entries| entries.keys().map(String::as_str).collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    fn require_section(&self, sec: &str, header: &str) -> WardenResult<()> {
        if !self.has_section(sec) {
            return Err(WardenError::Parse(format!(
                "missing required section [{header}]"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Assertion rewriting — `r.sub` becomes `r_sub`
// ---------------------------------------------------------------------------

/// Rewrites `sectionName.fieldName` references into flat
/// `sectionName_fieldName` identifiers.
///
/// Only identifiers of the form `r`, `p`, `r2`, `p2`, … are rewritten, and
/// only their first dot: `r.sub.Owner` becomes `r_sub.Owner`, leaving the
/// attribute tail for the evaluator. The scan tracks string literals, so a
/// quoted dot is never touched, and applying the rewrite twice yields the
/// same text as applying it once.
pub fn rewrite_assertion(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            _ if is_ident_start(c) && !follows_ident(&chars, i) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let dotted_field = chars.get(i) == Some(&'.')
                    && chars.get(i + 1).map_or(false, |next| is_ident_start(*next));
                out.push_str(&ident);
                if dotted_field && is_section_ident(&ident) {
                    out.push('_');
                    i += 1; // consume the dot
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn follows_ident(chars: &[char], i: usize) -> bool {
    i > 0 && (is_ident_char(chars[i - 1]) || chars[i - 1] == '.')
}

/// A section identifier is `r` or `p` with an optional numeric suffix.
fn is_section_ident(ident: &str) -> bool {
    let mut chars = ident.chars();
    matches!(chars.next(), Some('r') | Some('p')) && chars.all(|c| c.is_ascii_digit())
}
