//! Upstream advisory sources.
//!
//! Each source knows three things: which request parameters it needs, which
//! URL to fetch for them, and how to turn the fetched text into entries.
//! [`SourceKind::plan`] covers the first two and returns a [`Plan`];
//! [`Plan::harvest`] covers the last.

mod atom_regex;
mod github;
mod jenkins;
mod mattermost;
mod nvd;
mod nvidia;
mod redhat;

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{Config, SourceSettings};
use crate::feed::{DuplicateEntryIds, FeedEntry, RenderError};
use crate::fetch::{FetchError, FetchOptions};
use crate::normalize::SchemaBreak;
use crate::util::UrlValidationError;

pub use atom_regex::EntryFilter;

/// Request parameters, e.g. the query string.
pub type Params = HashMap<String, String>;

/// Problems with the request itself. No feed is attempted for these.
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("Unknown source: {0}")]
    UnknownSource(String),
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<&'static str>),
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Failures after the request was accepted. All of these become error feeds.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid feed XML: {0}")]
    Xml(String),
    #[error("Unexpected response structure: {0}")]
    Structure(String),
    #[error(transparent)]
    SchemaBreak(#[from] SchemaBreak),
    #[error(transparent)]
    DuplicateEntryIds(#[from] DuplicateEntryIds),
    #[error("Failed to render feed: {0}")]
    Render(#[from] RenderError),
}

/// The supported sources, addressed by name in `/feeds/{source}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    RedHat,
    Mattermost,
    Nvidia,
    Nvd,
    GitHub,
    Jenkins,
    AtomRegex,
}

impl SourceKind {
    pub const ALL: [SourceKind; 7] = [
        SourceKind::RedHat,
        SourceKind::Mattermost,
        SourceKind::Nvidia,
        SourceKind::Nvd,
        SourceKind::GitHub,
        SourceKind::Jenkins,
        SourceKind::AtomRegex,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SourceKind::RedHat => "redhat",
            SourceKind::Mattermost => "mattermost",
            SourceKind::Nvidia => "nvidia",
            SourceKind::Nvd => "nvd",
            SourceKind::GitHub => "github",
            SourceKind::Jenkins => "jenkins",
            SourceKind::AtomRegex => "atom-regex",
        }
    }

    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            SourceKind::RedHat => &["package"],
            SourceKind::Nvd => &["cpeMatchString"],
            SourceKind::GitHub => &["owner", "repo"],
            SourceKind::AtomRegex => &["url", "regex"],
            SourceKind::Mattermost | SourceKind::Nvidia | SourceKind::Jenkins => &[],
        }
    }

    /// Validates `params` and works out what to fetch.
    pub fn plan(self, params: &Params, config: &Config) -> Result<Plan, RequestError> {
        let missing: Vec<&'static str> = self
            .required_params()
            .iter()
            .copied()
            .filter(|name| param(params, name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(RequestError::MissingParameters(missing));
        }

        let settings = config.source(self.name());
        let mut plan = match self {
            SourceKind::RedHat => redhat::plan(required(params, "package")?, &settings),
            SourceKind::Mattermost => mattermost::plan(&settings),
            SourceKind::Nvidia => nvidia::plan(&settings),
            SourceKind::Nvd => {
                nvd::plan(required(params, "cpeMatchString")?, params, &settings)
            }
            SourceKind::GitHub => github::plan(
                required(params, "owner")?,
                required(params, "repo")?,
                &settings,
            )?,
            SourceKind::Jenkins => jenkins::plan(&settings),
            SourceKind::AtomRegex => atom_regex::plan(
                required(params, "url")?,
                required(params, "regex")?,
                param(params, "flags").unwrap_or(""),
                &settings,
            )?,
        };
        plan.feed_base = format!("{}/feeds/{}", config.base_url(), self.name());
        plan.threshold = settings.missing_identity_threshold;
        Ok(plan)
    }
}

impl FromStr for SourceKind {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| RequestError::UnknownSource(s.to_string()))
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-source state carried from planning to harvesting.
#[derive(Debug, Clone)]
enum Recipe {
    RedHat,
    Mattermost,
    Nvidia,
    Nvd,
    GitHub { owner: String, repo: String },
    Jenkins,
    AtomRegex(EntryFilter),
}

/// Everything needed to fetch and interpret one upstream document.
#[derive(Debug, Clone)]
pub struct Plan {
    pub source: SourceKind,
    /// URL that will be fetched.
    pub data_url: String,
    /// Feed title (may be replaced by [`Harvest::title`]).
    pub title: String,
    /// Upstream home page.
    pub link: String,
    pub options: FetchOptions,
    /// `{public_url}/feeds/{source}`, without query.
    pub feed_base: String,
    threshold: f64,
    recipe: Recipe,
}

impl Plan {
    fn new(
        source: SourceKind,
        recipe: Recipe,
        data_url: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            source,
            data_url: data_url.into(),
            title: title.into(),
            link: link.into(),
            options: FetchOptions::default(),
            feed_base: String::new(),
            threshold: crate::normalize::DEFAULT_MISSING_IDENTITY_THRESHOLD,
            recipe,
        }
    }

    fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Interprets the fetched upstream text.
    pub fn harvest(&self, body: &str) -> Result<Harvest, PipelineError> {
        match &self.recipe {
            Recipe::RedHat => redhat::harvest(body, self.threshold).map(Harvest::from),
            Recipe::Mattermost => {
                mattermost::harvest(body, &self.feed_base, self.threshold).map(Harvest::from)
            }
            Recipe::Nvidia => {
                nvidia::harvest(body, &self.feed_base, self.threshold).map(Harvest::from)
            }
            Recipe::Nvd => nvd::harvest(body, self.threshold).map(Harvest::from),
            Recipe::GitHub { owner, repo } => {
                github::harvest(body, owner, repo, self.threshold).map(Harvest::from)
            }
            Recipe::Jenkins => jenkins::harvest(body, self.threshold).map(Harvest::from),
            Recipe::AtomRegex(filter) => atom_regex::harvest(body, filter),
        }
    }
}

/// Candidate entries from one upstream document.
#[derive(Debug, Clone, Default)]
pub struct Harvest {
    /// `None` marks a skipped record.
    pub entries: Vec<Option<FeedEntry>>,
    /// Replacement feed title derived from the upstream document.
    pub title: Option<String>,
}

impl From<Vec<Option<FeedEntry>>> for Harvest {
    fn from(entries: Vec<Option<FeedEntry>>) -> Self {
        Self {
            entries,
            title: None,
        }
    }
}

/// Non-blank parameter value.
fn param<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn required<'a>(params: &'a Params, name: &'static str) -> Result<&'a str, RequestError> {
    param(params, name).ok_or(RequestError::MissingParameters(vec![name]))
}

/// Configured upstream base, or the built-in one.
fn upstream<'a>(settings: &'a SourceSettings, default: &'a str) -> &'a str {
    settings
        .upstream
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
}

/// The record array of a JSON document: the top level, or the array under `key`.
fn records<'a>(document: &'a Value, key: Option<&str>) -> Result<&'a [Value], PipelineError> {
    let value = match key {
        Some(key) => document
            .get(key)
            .ok_or_else(|| PipelineError::Structure(format!("no '{key}' field in response")))?,
        None => document,
    };
    value.as_array().map(Vec::as_slice).ok_or_else(|| {
        let what = key.map_or("response".to_string(), |k| format!("'{k}'"));
        PipelineError::Structure(format!("expected {what} to be an array, got {}", kind_of(value)))
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<UrlValidationError> for RequestError {
    fn from(e: UrlValidationError) -> Self {
        RequestError::InvalidParameter {
            name: "url",
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_source_names_round_trip() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.name().parse::<SourceKind>().unwrap(), kind);
        }
        assert_eq!(
            "rancher".parse::<SourceKind>(),
            Err(RequestError::UnknownSource("rancher".into()))
        );
    }

    #[test]
    fn test_missing_parameters_listed() {
        let config = Config::default();
        let err = SourceKind::GitHub
            .plan(&params(&[("repo", " ")]), &config)
            .unwrap_err();
        assert_eq!(err, RequestError::MissingParameters(vec!["owner", "repo"]));
        assert_eq!(err.to_string(), "Missing required parameters: owner, repo");
    }

    #[test]
    fn test_plan_feed_base_and_threshold() {
        let mut config = Config {
            public_url: "https://feeds.example.org/".into(),
            ..Config::default()
        };
        config.sources.insert(
            "mattermost".into(),
            SourceSettings {
                missing_identity_threshold: 0.1,
                ..SourceSettings::default()
            },
        );
        let plan = SourceKind::Mattermost.plan(&Params::new(), &config).unwrap();
        assert_eq!(plan.feed_base, "https://feeds.example.org/feeds/mattermost");
        assert_eq!(plan.threshold, 0.1);
    }

    #[test]
    fn test_records_shapes() {
        let top = json!([{"a": 1}]);
        assert_eq!(records(&top, None).unwrap().len(), 1);

        let nested = json!({"data": [{"a": 1}, {"a": 2}]});
        assert_eq!(records(&nested, Some("data")).unwrap().len(), 2);

        let err = records(&json!({"message": "rate limited"}), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unexpected response structure: expected response to be an array, got object"
        );
        let err = records(&json!({"items": null}), Some("data")).unwrap_err();
        assert!(err.to_string().contains("no 'data' field"));
    }
}
