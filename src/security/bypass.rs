//! Path rules and the bypass evaluator.
//!
//! # Responsibilities
//! - Compile configured path patterns (literal, glob, regex) once at startup
//! - Decide whether a request path is exempt from access checks
//!
//! # Design Decisions
//! - Plain strings match literally OR as a glob
//! - Malformed patterns are reported and never match; they do not abort startup
//! - Any-match semantics: rule order is irrelevant

use regex::Regex;
use std::sync::Arc;

use crate::config::PathPattern;
use crate::observability::{AccessEvent, EventSink};

/// A compiled path rule.
#[derive(Debug, Clone)]
pub enum PathRule {
    /// Exact string equality.
    Exact(String),
    /// Equality with `raw`, or a match of `raw` read as a glob.
    LiteralOrGlob { raw: String, glob: Option<Regex> },
    /// Glob only.
    Glob { raw: String, regex: Regex },
    /// Regex searched anywhere in the path.
    Regex(Regex),
    /// Pattern that failed to compile.
    Invalid(String),
}

impl PathRule {
    /// Compile a configured pattern, reporting malformed ones to `sink`.
    pub fn compile(pattern: &PathPattern, sink: &dyn EventSink) -> Self {
        match pattern {
            PathPattern::Plain(raw) => match glob_to_regex(raw) {
                Ok(glob) => PathRule::LiteralOrGlob {
                    raw: raw.clone(),
                    glob: Some(glob),
                },
                Err(error) => {
                    sink.emit(AccessEvent::MalformedRule {
                        kind: "glob",
                        rule: raw.clone(),
                        error,
                    });
                    PathRule::LiteralOrGlob {
                        raw: raw.clone(),
                        glob: None,
                    }
                }
            },
            PathPattern::Exact { exact } => PathRule::Exact(exact.clone()),
            PathPattern::Glob { glob } => match glob_to_regex(glob) {
                Ok(regex) => PathRule::Glob {
                    raw: glob.clone(),
                    regex,
                },
                Err(error) => {
                    sink.emit(AccessEvent::MalformedRule {
                        kind: "glob",
                        rule: glob.clone(),
                        error,
                    });
                    PathRule::Invalid(glob.clone())
                }
            },
            PathPattern::Regex { regex } => match Regex::new(regex) {
                Ok(re) => PathRule::Regex(re),
                Err(e) => {
                    sink.emit(AccessEvent::MalformedRule {
                        kind: "regex",
                        rule: regex.clone(),
                        error: e.to_string(),
                    });
                    PathRule::Invalid(regex.clone())
                }
            },
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathRule::Exact(s) => s == path,
            PathRule::LiteralOrGlob { raw, glob } => {
                raw == path || glob.as_ref().is_some_and(|re| re.is_match(path))
            }
            PathRule::Glob { regex, .. } => regex.is_match(path),
            PathRule::Regex(re) => re.is_match(path),
            PathRule::Invalid(_) => false,
        }
    }
}

/// An unordered set of path rules with any-match semantics.
#[derive(Debug, Clone, Default)]
pub struct PathRules {
    rules: Arc<[PathRule]>,
}

impl PathRules {
    pub fn new(rules: Vec<PathRule>) -> Self {
        Self { rules: rules.into() }
    }

    pub fn compile(patterns: &[PathPattern], sink: &dyn EventSink) -> Self {
        Self::new(patterns.iter().map(|p| PathRule::compile(p, sink)).collect())
    }

    pub fn matches_any(&self, path: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(path))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

/// Decides whether a request path skips every access check.
#[derive(Debug, Clone, Default)]
pub struct BypassEvaluator {
    rules: PathRules,
}

impl BypassEvaluator {
    pub fn new(rules: PathRules) -> Self {
        Self { rules }
    }

    pub fn from_patterns(patterns: &[PathPattern], sink: &dyn EventSink) -> Self {
        Self::new(PathRules::compile(patterns, sink))
    }

    /// True when any rule matches `path`. No rules means no bypass.
    pub fn is_bypassed(&self, path: &str) -> bool {
        self.rules.matches_any(path)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Translate a glob into an anchored regex.
///
/// `**` matches across `/`, `*` and `?` stay within one segment, `[...]` and
/// `{a,b}` behave as in shell globs.
pub fn glob_to_regex(glob: &str) -> Result<Regex, String> {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');

    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;
    let mut in_group = false;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                out.push_str(".*");
                i += 1;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == ']')
                    .ok_or_else(|| format!("unclosed character class in '{glob}'"))?;
                let class: String = chars[i + 1..i + 1 + close].iter().collect();
                if class.is_empty() {
                    return Err(format!("empty character class in '{glob}'"));
                }
                out.push('[');
                match class.strip_prefix('!') {
                    Some(rest) => {
                        out.push('^');
                        out.push_str(&rest.replace('\\', "\\\\"));
                    }
                    None => out.push_str(&class.replace('\\', "\\\\")),
                }
                out.push(']');
                i += close + 1;
            }
            '{' if !in_group => {
                in_group = true;
                out.push_str("(?:");
            }
            '{' => return Err(format!("nested braces in '{glob}'")),
            ',' if in_group => out.push('|'),
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    if in_group {
        return Err(format!("unclosed brace in '{glob}'"));
    }

    out.push('$');
    Regex::new(&out).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::RecordingSink;

    fn plain(p: &str) -> PathPattern {
        PathPattern::Plain(p.to_string())
    }

    #[test]
    fn test_literal_rule() {
        let sink = RecordingSink::new();
        let bypass = BypassEvaluator::from_patterns(&[plain("/health")], &sink);
        assert!(bypass.is_bypassed("/health"));
        assert!(!bypass.is_bypassed("/health2"));
        assert!(!bypass.is_bypassed("/healthz/x"));
    }

    #[test]
    fn test_glob_rules() {
        let sink = RecordingSink::new();
        let bypass = BypassEvaluator::from_patterns(
            &[plain("/assets/**"), plain("/img/*.png"), plain("/v?/ping"), plain("/{a,b}/x")],
            &sink,
        );
        assert!(bypass.is_bypassed("/assets/css/site.css"));
        assert!(bypass.is_bypassed("/img/logo.png"));
        assert!(!bypass.is_bypassed("/img/sub/logo.png"));
        assert!(bypass.is_bypassed("/v1/ping"));
        assert!(!bypass.is_bypassed("/v10/ping"));
        assert!(bypass.is_bypassed("/b/x"));
        assert!(!bypass.is_bypassed("/c/x"));
    }

    #[test]
    fn test_character_class() {
        let re = glob_to_regex("/file[0-9].txt").unwrap();
        assert!(re.is_match("/file3.txt"));
        assert!(!re.is_match("/filea.txt"));

        let re = glob_to_regex("/file[!0-9].txt").unwrap();
        assert!(re.is_match("/filea.txt"));
    }

    #[test]
    fn test_regex_rule() {
        let sink = RecordingSink::new();
        let bypass = BypassEvaluator::from_patterns(
            &[PathPattern::Regex { regex: "^/public/".into() }],
            &sink,
        );
        assert!(bypass.is_bypassed("/public/a.html"));
        assert!(!bypass.is_bypassed("/private/public/a.html"));
    }

    #[test]
    fn test_exact_rule_is_not_a_glob() {
        let sink = RecordingSink::new();
        let bypass = BypassEvaluator::from_patterns(&[PathPattern::Exact { exact: "/*".into() }], &sink);
        assert!(bypass.is_bypassed("/*"));
        assert!(!bypass.is_bypassed("/index.html"));
    }

    #[test]
    fn test_malformed_rules_never_match_and_are_reported() {
        let sink = RecordingSink::new();
        let bypass = BypassEvaluator::from_patterns(
            &[
                PathPattern::Regex { regex: "(unclosed".into() },
                PathPattern::Glob { glob: "/bad[".into() },
                plain("/ok"),
            ],
            &sink,
        );
        assert!(!bypass.is_bypassed("(unclosed"));
        assert!(!bypass.is_bypassed("/bad["));
        assert!(bypass.is_bypassed("/ok"));
        assert_eq!(sink.count(|e| matches!(e, AccessEvent::MalformedRule { .. })), 2);
    }

    #[test]
    fn test_malformed_plain_rule_still_matches_literally() {
        let sink = RecordingSink::new();
        let bypass = BypassEvaluator::from_patterns(&[plain("/odd[")], &sink);
        assert!(bypass.is_bypassed("/odd["));
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn test_no_rules() {
        let bypass = BypassEvaluator::default();
        assert!(bypass.is_empty());
        assert!(!bypass.is_bypassed("/anything"));
    }
}
