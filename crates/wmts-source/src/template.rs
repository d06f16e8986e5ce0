//! URL template compilation.
//!
//! A template plus a static context compiles into a pure function from a
//! dynamic per-tile context to a request URL. REST templates substitute
//! bracketed placeholders in place; KVP templates treat the input as a
//! base URL and append contexts as query parameters.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// `{Placeholder}` pattern; placeholder names match context keys
/// case-insensitively.
static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+?)\}").expect("valid regex"));

/// How GetTile parameters are carried in the request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestEncoding {
    /// Parameters appended to a base URL as a query string
    #[serde(rename = "KVP")]
    Kvp,
    /// Placeholders substituted directly into a path template
    #[serde(rename = "REST")]
    Rest,
}

impl fmt::Display for RequestEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestEncoding::Kvp => write!(f, "KVP"),
            RequestEncoding::Rest => write!(f, "REST"),
        }
    }
}

impl FromStr for RequestEncoding {
    type Err = RequestEncodingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KVP" => Ok(RequestEncoding::Kvp),
            // Both spellings appear in the wild
            "REST" | "RESTful" => Ok(RequestEncoding::Rest),
            _ => Err(RequestEncodingParseError(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown request encoding: {0}")]
pub struct RequestEncodingParseError(pub String);

/// Placeholder name to value mapping.
///
/// Keys keep the spelling they were written with; lookups compare
/// ASCII-case-insensitively. The ordered map makes enumeration (and so
/// query-parameter appension) deterministic.
pub type TemplateContext = BTreeMap<String, String>;

/// A URL template bound to its encoding and static context.
///
/// Compilation applies the static context once; [`CompiledTemplate::url`]
/// applies a per-call dynamic context on top. The compiled value is
/// immutable and safe to share across concurrent tile loads.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    encoding: RequestEncoding,
    prepared: String,
}

impl CompiledTemplate {
    /// Compile a template against a static context.
    pub fn compile(
        template: &str,
        encoding: RequestEncoding,
        static_context: &TemplateContext,
    ) -> Self {
        let prepared = match encoding {
            RequestEncoding::Rest => expand_placeholders(template, static_context),
            RequestEncoding::Kvp => append_query_params(template, static_context),
        };
        Self { encoding, prepared }
    }

    /// Produce a request URL for one dynamic context.
    ///
    /// REST placeholders with no match in either context stay verbatim in
    /// the output; they are never replaced with an empty string.
    pub fn url(&self, dynamic_context: &TemplateContext) -> String {
        match self.encoding {
            RequestEncoding::Rest => expand_placeholders(&self.prepared, dynamic_context),
            RequestEncoding::Kvp => append_query_params(&self.prepared, dynamic_context),
        }
    }

    /// The encoding this template was compiled for.
    pub fn encoding(&self) -> RequestEncoding {
        self.encoding
    }

    /// The template after static substitution/appension.
    pub fn as_str(&self) -> &str {
        &self.prepared
    }

    /// Placeholders that survived static substitution and are not covered
    /// by any of the given dynamic keys. Anything reported here will stay
    /// verbatim in every produced URL, which usually means upstream
    /// misconfiguration.
    pub fn unresolved_placeholders(&self, dynamic_keys: &[&str]) -> Vec<String> {
        PLACEHOLDER_RE
            .captures_iter(&self.prepared)
            .filter_map(|caps| {
                let name = &caps[1];
                if dynamic_keys.iter().any(|k| k.eq_ignore_ascii_case(name)) {
                    None
                } else {
                    Some(name.to_string())
                }
            })
            .collect()
    }
}

/// Case-insensitive context lookup.
fn lookup<'a>(context: &'a TemplateContext, key: &str) -> Option<&'a str> {
    context
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// Substitute `{Placeholder}` occurrences from the context; unmatched
/// placeholders are left as-is.
fn expand_placeholders(template: &str, context: &TemplateContext) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures| {
            match lookup(context, &caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Append context entries to a base URL as query parameters.
///
/// Keys already present in the URL's query string are skipped
/// (case-insensitive comparison); new keys land after existing ones.
/// Values are percent-encoded.
fn append_query_params(base: &str, params: &TemplateContext) -> String {
    let existing: Vec<String> = base
        .split_once('?')
        .map(|(_, query)| {
            query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    pair.split('=')
                        .next()
                        .unwrap_or(pair)
                        .to_ascii_lowercase()
                })
                .collect()
        })
        .unwrap_or_default();

    let mut url = base.to_string();
    for (key, value) in params {
        if existing.contains(&key.to_ascii_lowercase()) {
            continue;
        }
        match url.find('?') {
            None => url.push('?'),
            Some(_) if url.ends_with('?') || url.ends_with('&') => {}
            Some(_) => url.push('&'),
        }
        url.push_str(key);
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }
    url
}
