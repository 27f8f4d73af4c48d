//! Inline markup for value atoms: `_token_` marks an emphasized span.

#![allow(missing_docs)]

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static EMPHASIS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"_([^_]+)_").ok());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Span {
    Plain(String),
    Emphasis(String),
}

impl Span {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Plain(t) | Self::Emphasis(t) => t,
        }
    }
}

/// Split text into plain and emphasized spans. Unpaired underscores stay literal.
#[must_use]
pub fn spans(text: &str) -> Vec<Span> {
    let Some(re) = EMPHASIS.as_ref() else {
        return vec![Span::Plain(text.to_string())];
    };
    let mut out = Vec::new();
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            out.push(Span::Plain(text[last..whole.start()].to_string()));
        }
        out.push(Span::Emphasis(inner.as_str().to_string()));
        last = whole.end();
    }
    if last < text.len() || out.is_empty() {
        out.push(Span::Plain(text[last..].to_string()));
    }
    out
}

/// Spans joined back into plain text.
#[must_use]
pub fn plain(spans: &[Span]) -> String {
    spans.iter().map(Span::text).collect()
}
