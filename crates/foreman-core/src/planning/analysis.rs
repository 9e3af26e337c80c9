//! Business analysis: intent, constraints and features from idea text.
//!
//! Ideas are free text with an optional feature list:
//!
//! ```text
//! Add login to the shop. Passwords must never be stored in plain text.
//!
//! - [form] Login form {ui} => shows an error on bad credentials
//! - [session] Session handling
//! - [wire] Wire form to sessions (after: form, session)
//! ```
//!
//! The first line is the intent. Sentences containing `must`, `should`,
//! `never` or `only` are constraints. Each bullet is a feature with an
//! optional `[key]`, `(after: ...)` dependencies, `{...}` capability flags
//! and an inline `=> acceptance` criterion. Without bullets the intent is
//! the single feature.

use crate::{
    error::{OrchestratorError, Result},
    models::Capability,
};

const CONSTRAINT_WORDS: [&str; 4] = ["must", "should", "never", "only"];
const MAX_KEY_LEN: usize = 40;

/// Output of business analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub intent: String,
    pub constraints: Vec<String>,
    pub features: Vec<Feature>,
}

/// One feature parsed from the idea.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub key: String,
    pub title: String,
    pub depends_on: Vec<String>,
    pub capabilities: Vec<Capability>,
    pub acceptance: Option<String>,
}

/// Extracts intent, constraints and features from idea text.
pub fn analyze(text: &str) -> Result<Analysis> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(intent_line) = lines.next() else {
        return Err(OrchestratorError::invalid_input("text").with_reason("idea text is empty"));
    };
    if is_bullet(intent_line) {
        return Err(OrchestratorError::invalid_input("text")
            .with_reason("the first line must state the intent, not a feature"));
    }

    let mut prose = vec![intent_line];
    let mut features = Vec::new();
    for line in lines {
        match bullet_body(line) {
            Some(body) => features.push(parse_feature(body)?),
            None => prose.push(line),
        }
    }

    let intent = first_sentence(intent_line);
    let constraints = prose
        .iter()
        .flat_map(|line| sentences(line))
        .filter(|s| is_constraint(s))
        .collect();

    if features.is_empty() {
        features.push(Feature {
            key: slug(&intent),
            title: intent.clone(),
            depends_on: Vec::new(),
            capabilities: Vec::new(),
            acceptance: None,
        });
    }

    Ok(Analysis {
        intent,
        constraints,
        features,
    })
}

fn is_bullet(line: &str) -> bool {
    bullet_body(line).is_some()
}

fn bullet_body(line: &str) -> Option<&str> {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .map(str::trim)
}

fn sentences(text: &str) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn first_sentence(line: &str) -> String {
    let sentence = sentences(line).into_iter().next().unwrap_or_default();
    sentence
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_string()
}

fn is_constraint(sentence: &str) -> bool {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| CONSTRAINT_WORDS.iter().any(|w| word.eq_ignore_ascii_case(w)))
}

/// Splits `text` around the first `open ... close` segment.
fn take_segment<'a>(text: &'a str, open: &str, close: char) -> Option<(String, &'a str)> {
    let start = text.find(open)?;
    let inner_start = start + open.len();
    let end = inner_start + text[inner_start..].find(close)?;
    let rest = format!("{}{}", &text[..start], &text[end + close.len_utf8()..]);
    Some((rest, &text[inner_start..end]))
}

fn parse_feature(body: &str) -> Result<Feature> {
    let (body, acceptance) = match body.split_once("=>") {
        Some((lhs, rhs)) => (lhs, Some(rhs.trim().to_string()).filter(|a| !a.is_empty())),
        None => (body, None),
    };
    let mut rest = body.trim().to_string();

    let mut key = None;
    if rest.starts_with('[') {
        if let Some((remaining, inner)) = take_segment(&rest, "[", ']') {
            key = Some(inner.trim().to_string());
            rest = remaining;
        }
    }

    let mut depends_on = Vec::new();
    if let Some((remaining, inner)) = take_segment(&rest, "(after:", ')') {
        depends_on = inner
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from)
            .collect();
        rest = remaining;
    }

    let mut capabilities = Vec::new();
    if let Some((remaining, inner)) = take_segment(&rest, "{", '}') {
        for flag in inner.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            let capability = flag.parse::<Capability>().map_err(|reason| {
                OrchestratorError::invalid_input("capabilities").with_reason(reason)
            })?;
            if !capabilities.contains(&capability) {
                capabilities.push(capability);
            }
        }
        rest = remaining;
    }

    let title = rest.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        return Err(OrchestratorError::invalid_input("text")
            .with_reason(format!("feature '{body}' has no title")));
    }

    Ok(Feature {
        key: key.filter(|k| !k.is_empty()).unwrap_or_else(|| slug(&title)),
        title,
        depends_on,
        capabilities,
        acceptance,
    })
}

/// Lowercase, dash-separated key derived from a title.
pub fn slug(title: &str) -> String {
    let mut key = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_alphanumeric() {
            key.extend(c.to_lowercase());
        } else if !key.ends_with('-') && !key.is_empty() {
            key.push('-');
        }
    }
    let key: String = key.trim_end_matches('-').chars().take(MAX_KEY_LEN).collect();
    key.trim_end_matches('-').to_string()
}
