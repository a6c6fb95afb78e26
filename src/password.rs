//! Password chains embedded in archive file names
//!
//! Releases often carry their extraction passwords in the file name, for example
//! `RJ123456 pass-(outer password) inner.zip`. The marker (`pass-` by default,
//! matched case-insensitively after whitespace) introduces a chain of tokens, one per
//! archive layer. Tokens are separated by whitespace unless wrapped in parentheses, in
//! which case they may contain whitespace themselves.
//!
//! [`PasswordParser::peel`] removes exactly one layer: it returns the first token as the
//! password to use now and a cleaned name carrying the rest of the chain. Peeling a name
//! without a marker is a no-op, so peeling can be repeated safely across nested
//! archives until the chain is exhausted.

use crate::error::{Error, Result};
use regex::Regex;

/// Result of peeling one password layer off a file name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeeledName {
    /// Password for the current layer (`Some("")` for an empty `()` group)
    pub password: Option<String>,
    /// Tokens left for inner layers, in order
    pub remaining: Vec<String>,
    /// File name with the current layer removed
    pub cleaned: String,
}

/// A file name split around its password marker
struct MarkedName<'a> {
    /// Everything before the whitespace preceding the marker
    head: &'a str,
    /// Token text between the marker and the extension
    segment: &'a str,
    /// Extension including the dot, or empty
    suffix: &'a str,
}

/// Parser for marker-introduced password chains
#[derive(Clone, Debug)]
pub struct PasswordParser {
    marker: String,
    pattern: Regex,
}

impl PasswordParser {
    /// Create a parser for the given marker literal (matched case-insensitively)
    pub fn new(marker: &str) -> Result<Self> {
        let pattern =
            Regex::new(&format!(r"(?i)\s+{}", regex::escape(marker))).map_err(|e| Error::Config {
                message: format!("invalid password marker {marker:?}: {e}"),
                key: Some("password_marker".to_string()),
            })?;
        Ok(Self {
            marker: marker.to_string(),
            pattern,
        })
    }

    /// The marker literal used when re-serializing a chain
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Whether the name carries a password marker at all
    pub fn has_chain(&self, file_name: &str) -> bool {
        self.pattern.is_match(file_name)
    }

    /// All tokens of the chain in `file_name`, without peeling anything
    pub fn chain(&self, file_name: &str) -> Vec<String> {
        self.locate(file_name)
            .map(|marked| parse_tokens(marked.segment))
            .unwrap_or_default()
    }

    /// Peel the first password layer off `file_name`.
    ///
    /// Without a marker the name is returned unchanged with no password. Otherwise the
    /// first token becomes the password; the rest is written back after the marker, or
    /// the whole marker segment is dropped when nothing remains.
    pub fn peel(&self, file_name: &str) -> PeeledName {
        let Some(marked) = self.locate(file_name) else {
            return PeeledName {
                password: None,
                remaining: Vec::new(),
                cleaned: file_name.to_string(),
            };
        };

        let mut tokens = parse_tokens(marked.segment).into_iter();
        let password = tokens.next();
        let remaining: Vec<String> = tokens.collect();
        let cleaned = self.compose(marked.head, &remaining, marked.suffix);

        PeeledName {
            password,
            remaining,
            cleaned,
        }
    }

    /// Append `tokens` to the chain carried by `file_name`.
    ///
    /// Used to forward the leftover layers of an outer archive onto the archives found
    /// inside it. If the name already has its own chain, the forwarded tokens go after
    /// its own tokens.
    pub fn append_chain(&self, file_name: &str, tokens: &[String]) -> String {
        if tokens.is_empty() {
            return file_name.to_string();
        }

        match self.locate(file_name) {
            Some(marked) => {
                let mut chain = parse_tokens(marked.segment);
                chain.extend(tokens.iter().cloned());
                self.compose(marked.head, &chain, marked.suffix)
            }
            None => {
                let (stem, suffix) = split_extension(file_name);
                self.compose(stem, tokens, suffix)
            }
        }
    }

    /// Insert a `_n` collision suffix into `file_name` without touching its chain.
    ///
    /// The suffix goes before the marker when there is one, otherwise before the
    /// extension: `disc pass-x.zip` becomes `disc_1 pass-x.zip`.
    pub fn with_collision_suffix(&self, file_name: &str, n: u32) -> String {
        match self.locate(file_name) {
            Some(marked) => {
                let rest = &file_name[marked.head.len()..];
                format!("{}_{n}{rest}", marked.head)
            }
            None => {
                let (stem, suffix) = split_extension(file_name);
                format!("{stem}_{n}{suffix}")
            }
        }
    }

    fn compose(&self, head: &str, tokens: &[String], suffix: &str) -> String {
        if tokens.is_empty() {
            format!("{head}{suffix}")
        } else {
            format!("{head} {}{}{suffix}", self.marker, serialize_tokens(tokens))
        }
    }

    fn locate<'a>(&self, file_name: &'a str) -> Option<MarkedName<'a>> {
        let found = self.pattern.find(file_name)?;
        let rest = &file_name[found.end()..];
        let (segment, suffix) = split_extension(rest);
        Some(MarkedName {
            head: &file_name[..found.start()],
            segment,
            suffix,
        })
    }
}

/// Split a chain segment into its ordered tokens.
///
/// Whitespace separates bare tokens. `(` starts a group that runs verbatim to the next
/// `)`; groups do not nest and an unmatched `(` runs to the end of the segment. A closed
/// group always yields a token, even when empty.
pub fn parse_tokens(segment: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_group = false;

    for ch in segment.chars() {
        match ch {
            '(' if !in_group => {
                flush_bare(&mut tokens, &mut current);
                in_group = true;
            }
            ')' if in_group => {
                tokens.push(current.trim().to_string());
                current.clear();
                in_group = false;
            }
            c if c.is_whitespace() && !in_group => flush_bare(&mut tokens, &mut current),
            c => current.push(c),
        }
    }
    flush_bare(&mut tokens, &mut current);

    tokens
}

fn flush_bare(tokens: &mut Vec<String>, current: &mut String) {
    let token = current.trim();
    if !token.is_empty() {
        tokens.push(token.to_string());
    }
    current.clear();
}

/// Render tokens back into chain syntax, parenthesizing tokens that need it
pub fn serialize_tokens(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|token| {
            if token.is_empty() || token.contains(char::is_whitespace) || token.contains('(') {
                format!("({token})")
            } else {
                token.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split off a trailing `.ext` that sits outside any group.
///
/// Only short alphanumeric suffixes with at least one letter count as extensions, so
/// `v1.0beta.zip` keeps `.zip` and an extension-less `v1.0` keeps its dot.
pub(crate) fn split_extension(text: &str) -> (&str, &str) {
    let mut in_group = false;
    let mut last_dot = None;

    for (idx, ch) in text.char_indices() {
        match ch {
            '(' if !in_group => in_group = true,
            ')' if in_group => in_group = false,
            '.' if !in_group => last_dot = Some(idx),
            _ => {}
        }
    }

    match last_dot {
        Some(idx) => {
            let ext = &text[idx + 1..];
            let plausible = !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic());
            if plausible {
                (&text[..idx], &text[idx..])
            } else {
                (text, "")
            }
        }
        None => (text, ""),
    }
}
