//! Deny-by-default route allowlist.
//!
//! Responsibility:
//! - Compile the route table once at startup into segment matchers.
//! - Reject any request whose path matches no template with 403
//!   `PATH_NOT_ALLOWED`, before authentication or any handler runs.
//!
//! Matching rules:
//! - Literal segments match exactly; `{name}` matches one non-empty segment.
//! - `{*rest}` and partial placeholders (`/a/x{id}`) do not compile.
//! - Only the path is compared (the query string is ignored). A trailing
//!   slash is an extra empty segment, so `/health/` does not match `/health`.
//! - `OPTIONS` always passes so CORS preflight keeps working.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::{self, Next},
    response::Response,
};
use thiserror::Error;

use crate::error::{AppError, ForbiddenReason};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllowlistError {
    #[error("route template must start with '/': {0}")]
    NotAbsolute(String),
    #[error("wildcard placeholders are not allowed: {0}")]
    Wildcard(String),
    #[error("placeholder must be a whole segment: {0}")]
    PartialPlaceholder(String),
    #[error("placeholder has no name: {0}")]
    EmptyPlaceholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

#[derive(Debug, Clone)]
struct RoutePattern {
    template: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    fn compile(template: &str) -> Result<Self, AllowlistError> {
        let rest = template
            .strip_prefix('/')
            .ok_or_else(|| AllowlistError::NotAbsolute(template.to_string()))?;

        let segments = rest
            .split('/')
            .map(|segment| compile_segment(template, segment))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    fn matches(&self, path: &[&str]) -> bool {
        self.segments.len() == path.len()
            && self
                .segments
                .iter()
                .zip(path)
                .all(|(segment, actual)| match segment {
                    Segment::Literal(literal) => literal == actual,
                    Segment::Param => !actual.is_empty(),
                })
    }
}

fn compile_segment(template: &str, segment: &str) -> Result<Segment, AllowlistError> {
    if let Some(inner) = segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
    {
        if inner.starts_with('*') {
            return Err(AllowlistError::Wildcard(template.to_string()));
        }
        if inner.contains(['{', '}']) {
            return Err(AllowlistError::PartialPlaceholder(template.to_string()));
        }
        if inner.is_empty() {
            return Err(AllowlistError::EmptyPlaceholder(template.to_string()));
        }
        return Ok(Segment::Param);
    }

    if segment.contains(['{', '}']) {
        return Err(AllowlistError::PartialPlaceholder(template.to_string()));
    }
    Ok(Segment::Literal(segment.to_string()))
}

/// Compiled, read-only after startup. Share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RouteAllowlist {
    patterns: Vec<RoutePattern>,
}

impl RouteAllowlist {
    pub fn compile<I, S>(templates: I) -> Result<Self, AllowlistError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = templates
            .into_iter()
            .map(|t| RoutePattern::compile(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.template.as_str())
    }

    pub fn is_allowed(&self, method: &Method, path: &str) -> bool {
        if method == Method::OPTIONS {
            return true;
        }
        let Some(rest) = path.strip_prefix('/') else {
            return false;
        };
        let segments: Vec<&str> = rest.split('/').collect();

        self.patterns.iter().any(|p| p.matches(&segments))
    }
}

/// Apply the gate to a fully assembled Router.
///
/// Must be the outermost application layer (after `nest`/`merge`) so that it
/// also covers the fallback for unknown paths.
pub fn apply(router: Router, allowlist: Arc<RouteAllowlist>) -> Router {
    router.layer(middleware::from_fn_with_state(
        allowlist,
        allowlist_middleware,
    ))
}

async fn allowlist_middleware(
    State(allowlist): State<Arc<RouteAllowlist>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !allowlist.is_allowed(req.method(), req.uri().path()) {
        tracing::warn!(
            method = %req.method(),
            path = %req.uri().path(),
            "path not in allowlist"
        );
        return Err(AppError::Forbidden(ForbiddenReason::PathNotAllowed));
    }

    Ok(next.run(req).await)
}
