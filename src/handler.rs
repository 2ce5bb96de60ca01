//! Request entry point: one source, one fetch, one rendered feed.
//!
//! [`handle`] never fails. Bad requests get a plain-text 400 (or 404 for an
//! unknown source); every failure after that point is reported inside the
//! feed itself as a single "Error" entry, so feed readers surface it.

use url::form_urlencoded;

use crate::config::Config;
use crate::feed::{assemble, error_feed, render, render_or_fallback, Feed, FeedFormat, FeedMetadata};
use crate::fetch::Fetcher;
use crate::source::{Params, PipelineError, Plan, RequestError, SourceKind};
use crate::util::truncate_bytes;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Capabilities shared by every request, built once at startup.
pub struct Context<F: Fetcher> {
    pub fetcher: F,
    pub config: Config,
}

impl<F: Fetcher> Context<F> {
    pub fn new(fetcher: F, config: Config) -> Self {
        Self { fetcher, config }
    }
}

/// Transport-neutral response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: TEXT_PLAIN,
            body: body.into(),
        }
    }

    fn feed(format: FeedFormat, body: String) -> Self {
        Self {
            status: 200,
            content_type: format.content_type(),
            body,
        }
    }
}

impl From<RequestError> for Response {
    fn from(e: RequestError) -> Self {
        let status = match &e {
            RequestError::UnknownSource(_) => 404,
            RequestError::MissingParameters(_) | RequestError::InvalidParameter { .. } => 400,
        };
        Response::text(status, e.to_string())
    }
}

/// Output format from `format=atom|json`, or the legacy `feed=atom`.
fn requested_format(params: &Params, default: FeedFormat) -> Result<FeedFormat, RequestError> {
    let raw = params
        .get("format")
        .or_else(|| params.get("feed"))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty());
    match raw {
        Some(raw) => raw
            .parse::<FeedFormat>()
            .map_err(|reason| RequestError::InvalidParameter {
                name: "format",
                reason,
            }),
        None => Ok(default),
    }
}

/// The feed's canonical URL: its base plus the request parameters, sorted
/// so the id does not depend on parameter order.
pub fn feed_id(feed_base: &str, params: &Params) -> String {
    if params.is_empty() {
        return feed_base.to_string();
    }
    let mut pairs: Vec<(&String, &String)> = params.iter().collect();
    pairs.sort();
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{feed_base}?{query}")
}

/// Serves one feed request.
pub async fn handle<F: Fetcher>(ctx: &Context<F>, source: &str, params: &Params) -> Response {
    let prepared = source.parse::<SourceKind>().and_then(|kind| {
        let format = requested_format(params, ctx.config.default_format)?;
        let plan = kind.plan(params, &ctx.config)?;
        Ok((plan, format))
    });
    let (plan, format) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::info!(source = %source, error = %e, "Rejected feed request");
            return e.into();
        }
    };

    let metadata = FeedMetadata::new(
        plan.title.clone(),
        plan.link.clone(),
        feed_id(&plan.feed_base, params),
    )
    .with_author(ctx.config.feed_author.clone());

    let (feed, raw_text) = match ctx.fetcher.fetch(&plan.data_url, &plan.options).await {
        Ok(text) => {
            let result = build_feed(&plan, metadata.clone(), &text);
            (result, Some(text))
        }
        Err(e) => {
            let body = e.body().map(str::to_string);
            (Err(PipelineError::from(e)), body)
        }
    };

    let rendered = feed.and_then(|feed| {
        let body = render(&feed, format)?;
        Ok((feed.entries.len(), body))
    });

    match rendered {
        Ok((entries, body)) => {
            tracing::info!(
                source = %plan.source,
                format = %format,
                entries = entries,
                "Rendered feed"
            );
            Response::feed(format, body)
        }
        Err(e) => {
            tracing::warn!(
                source = %plan.source,
                url = %plan.data_url,
                error = %e,
                "Feed generation failed, returning error feed"
            );
            let raw = raw_text
                .as_deref()
                .map(|text| truncate_bytes(text, ctx.config.max_error_body_bytes));
            let feed = error_feed(metadata, &plan.data_url, &e, raw);
            Response::feed(format, render_or_fallback(&feed, format))
        }
    }
}

/// Harvest, retitle, assemble.
fn build_feed(plan: &Plan, mut metadata: FeedMetadata, text: &str) -> Result<Feed, PipelineError> {
    let harvest = plan.harvest(text)?;
    if let Some(title) = harvest.title {
        metadata.title = title;
    }
    Ok(assemble(metadata, harvest.entries)?)
}
