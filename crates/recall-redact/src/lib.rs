//! Secret redaction applied to every text field before it is persisted
//!
//! A single [`RegexSet`] pass answers "does anything look like a credential".
//! Clean input (the common case) is handed back borrowed, untouched. Only on a
//! hit are the individual rules that fired re-run to locate and replace spans.

use regex::{Regex, RegexSet};
use std::borrow::Cow;
use std::sync::OnceLock;

/// Replacement for every redacted span
pub const PLACEHOLDER: &str = "[REDACTED]";

static DEFAULT: OnceLock<Redactor> = OnceLock::new();

/// How a rule's candidate is validated before it is replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    /// Provider-shaped token, always a secret
    Exact,
    /// Key names a secret outright; any literal value is replaced
    Named,
    /// `name = value` assignment; value must look like a literal secret
    Assignment,
}

struct RuleDef {
    name: &'static str,
    pattern: &'static str,
    check: Check,
}

/// Most specific first. A later rule never rewrites a span an earlier one
/// already claimed, so provider matches keep their precise boundaries.
const RULES: &[RuleDef] = &[
    RuleDef {
        name: "private_key_block",
        pattern: r"-----BEGIN [A-Z ]*PRIVATE KEY-----[\s\S]*?-----END [A-Z ]*PRIVATE KEY-----",
        check: Check::Exact,
    },
    RuleDef {
        name: "anthropic_key",
        pattern: r"sk-ant-[A-Za-z0-9_\-]{16,}",
        check: Check::Exact,
    },
    RuleDef {
        name: "openai_key",
        pattern: r"\bsk-(?:proj-|svcacct-)?[A-Za-z0-9_\-]{20,}",
        check: Check::Exact,
    },
    RuleDef {
        name: "github_token",
        pattern: r"\b(?:gh[pousr]_[A-Za-z0-9]{36,}|github_pat_[A-Za-z0-9_]{22,})",
        check: Check::Exact,
    },
    RuleDef {
        name: "aws_access_key",
        pattern: r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b",
        check: Check::Exact,
    },
    RuleDef {
        name: "aws_secret_key",
        pattern: r#"(?i)aws_secret_access_key\s*[:=]\s*["']?(?P<secret>[A-Za-z0-9/+=]{40})"#,
        check: Check::Exact,
    },
    RuleDef {
        name: "slack_token",
        pattern: r"\bxox[abposr]-[A-Za-z0-9\-]{10,}",
        check: Check::Exact,
    },
    RuleDef {
        name: "google_api_key",
        pattern: r"\bAIza[0-9A-Za-z_\-]{35}",
        check: Check::Exact,
    },
    RuleDef {
        name: "stripe_key",
        pattern: r"\b[rs]k_(?:live|test)_[0-9A-Za-z]{16,}",
        check: Check::Exact,
    },
    RuleDef {
        name: "jwt",
        pattern: r"\beyJ[A-Za-z0-9_\-]{8,}\.eyJ[A-Za-z0-9_\-]{8,}\.[A-Za-z0-9_\-]{8,}",
        check: Check::Exact,
    },
    RuleDef {
        name: "bearer_token",
        pattern: r"(?i)\bbearer\s+(?P<secret>[A-Za-z0-9._~+/\-]{16,}=*)",
        check: Check::Exact,
    },
    RuleDef {
        name: "url_credentials",
        pattern: r"\b[A-Za-z][A-Za-z0-9+.\-]*://[^\s:/@]+:(?P<secret>[^\s@/]+)@",
        check: Check::Exact,
    },
    RuleDef {
        name: "secret_assignment",
        pattern: r#"(?i)\b(?:[A-Za-z0-9]*[_\-])*(?:secret|passwd|password|pwd|credentials?)\b["']?\s*[:=]\s*(?P<secret>"[^"\n]*"|'[^'\n]*'|[^\s"',;)]+)"#,
        check: Check::Named,
    },
    RuleDef {
        name: "assignment",
        pattern: r#"(?i)\b(?:[A-Za-z0-9]*[_\-])*(?:api[_\-]?key|key|token)\b["']?\s*[:=]\s*(?P<secret>"[^"\n]*"|'[^'\n]*'|[^\s"',;)]+)"#,
        check: Check::Assignment,
    },
];

struct Rule {
    name: &'static str,
    regex: Regex,
    check: Check,
}

/// Compiled redaction rules. Immutable once built; share freely across threads.
pub struct Redactor {
    set: RegexSet,
    rules: Vec<Rule>,
}

#[derive(Debug)]
struct SpanError {
    start: usize,
    end: usize,
}

impl Redactor {
    /// Compile every rule. Fails only on a malformed static pattern.
    pub fn new() -> Result<Self, regex::Error> {
        let set = RegexSet::new(RULES.iter().map(|r| r.pattern))?;
        let rules = RULES
            .iter()
            .map(|def| {
                Ok(Rule {
                    name: def.name,
                    regex: Regex::new(def.pattern)?,
                    check: def.check,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { set, rules })
    }

    /// Redact credential-shaped spans from `input`.
    ///
    /// Returns the (possibly rewritten) text and whether anything was
    /// replaced. Clean input comes back as `Cow::Borrowed` of the same slice.
    pub fn redact<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        if !self.set.is_match(input) {
            return (Cow::Borrowed(input), false);
        }

        let spans = self.collect_spans(input);
        if spans.is_empty() {
            return (Cow::Borrowed(input), false);
        }

        match rewrite(input, &spans) {
            Ok(out) => (Cow::Owned(out), true),
            Err(e) => {
                // Fail closed: nothing from this input is safe to keep
                tracing::error!(start = e.start, end = e.end, "redaction span invalid, dropping whole input");
                (Cow::Owned(PLACEHOLDER.to_string()), true)
            }
        }
    }

    /// Owned variant that gives the same `String` back when nothing matched
    pub fn redact_string(&self, input: String) -> (String, bool) {
        let replaced = match self.redact(&input) {
            (Cow::Owned(out), true) => Some(out),
            _ => None,
        };
        match replaced {
            Some(out) => (out, true),
            None => (input, false),
        }
    }

    /// Names of the rules that would fire on `input`
    pub fn matching_rules(&self, input: &str) -> Vec<&'static str> {
        self.set
            .matches(input)
            .into_iter()
            .map(|idx| self.rules[idx].name)
            .collect()
    }

    fn collect_spans(&self, input: &str) -> Vec<(usize, usize)> {
        let mut claimed: Vec<(usize, usize)> = Vec::new();

        // SetMatches iterates in ascending index order, i.e. priority order
        for idx in self.set.matches(input).into_iter() {
            let rule = &self.rules[idx];
            for caps in rule.regex.captures_iter(input) {
                let Some(m) = caps.name("secret").or_else(|| caps.get(0)) else {
                    continue;
                };
                let (start, end) = (m.start(), m.end());
                if !candidate_applies(rule.check, m.as_str(), &input[end..]) {
                    continue;
                }
                if claimed.iter().any(|&(s, e)| start < e && s < end) {
                    continue;
                }
                claimed.push((start, end));
            }
        }

        claimed.sort_unstable();
        claimed
    }
}

/// Whether a rule's candidate span should actually be replaced
fn candidate_applies(check: Check, candidate: &str, rest: &str) -> bool {
    if candidate.trim().is_empty() || candidate.contains(PLACEHOLDER) {
        return false;
    }
    match check {
        Check::Exact => true,
        Check::Named => named_literal(candidate, rest),
        Check::Assignment => plausible_literal(candidate, rest),
    }
}

/// Values that are type names or flags, never secrets
const NON_LITERALS: &[&str] = &[
    "true", "false", "null", "none", "nil", "undefined", "required", "optional",
    "string", "str", "&str", "secretstring", "bool", "bytes",
];

fn unquote(value: &str) -> Option<&str> {
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    quoted.then(|| &value[1..value.len() - 1])
}

/// `$NAME` or `${NAME}`: expanded by the shell, not a literal
fn is_variable_reference(value: &str) -> bool {
    let Some(name) = value.strip_prefix('$') else {
        return false;
    };
    let name = name
        .strip_prefix('{')
        .and_then(|n| n.strip_suffix('}'))
        .unwrap_or(name);
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Value of a key that names a secret: anything literal counts, however short
fn named_literal(value: &str, rest: &str) -> bool {
    if let Some(inner) = unquote(value) {
        let inner = inner.trim();
        return !inner.is_empty() && !inner.contains(PLACEHOLDER) && !is_variable_reference(inner);
    }
    if rest.starts_with('(') || rest.starts_with('<') {
        return false;
    }
    if is_variable_reference(value) || value.starts_with("self.") || value.contains("::") {
        return false;
    }
    !NON_LITERALS.contains(&value.to_ascii_lowercase().as_str())
}

/// Reject assignment values that are code or references rather than literals
fn plausible_literal(value: &str, rest: &str) -> bool {
    if let Some(inner) = unquote(value) {
        let inner = inner.trim();
        return inner.len() >= 4 && !inner.starts_with('$') && !inner.contains(PLACEHOLDER);
    }

    if rest.starts_with('(') || rest.starts_with('<') {
        return false;
    }
    if value.starts_with('$')
        || value.starts_with('&')
        || value.starts_with('*')
        || value.starts_with("self.")
        || value.contains("::")
        || value.contains('<')
    {
        return false;
    }
    if NON_LITERALS.contains(&value.to_ascii_lowercase().as_str()) {
        return false;
    }

    let has_digit = value.chars().any(|c| c.is_ascii_digit());
    let has_symbol = value.chars().any(|c| "-_+/=.!@#%^&*~".contains(c));
    value.len() >= 6 && (has_digit || has_symbol || value.len() >= 20)
}

fn rewrite(input: &str, spans: &[(usize, usize)]) -> Result<String, SpanError> {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    for &(start, end) in spans {
        let before = input
            .get(cursor..start)
            .ok_or(SpanError { start, end })?;
        if input.get(start..end).is_none() {
            return Err(SpanError { start, end });
        }
        out.push_str(before);
        out.push_str(PLACEHOLDER);
        cursor = end;
    }
    let tail = input.get(cursor..).ok_or(SpanError {
        start: cursor,
        end: input.len(),
    })?;
    out.push_str(tail);
    Ok(out)
}

/// Process-wide redactor, compiled on first use
pub fn redactor() -> &'static Redactor {
    DEFAULT.get_or_init(|| Redactor::new().expect("static redaction patterns must compile"))
}

/// Redact with the process-wide rules
pub fn redact(input: &str) -> (Cow<'_, str>, bool) {
    redactor().redact(input)
}
