//! Pagination: reading the continuation out of a response, and rendering the
//! next page's query parameters.
//!
//! Each provider pairs a [`PaginationExtractor`] with a
//! [`QueryParameterTransformer`]. Both are plain data, so endpoint settings
//! can be declared in tables and compared in tests.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::{HeaderMap, LINK};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fetch::FetchRequest;
use crate::node;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MIN_PAGE_SIZE: u32 = 1;
pub const MAX_PAGE_SIZE: u32 = 1000;

/// One `<target>; params` entry of a `Link` header.
static LINK_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]*)>([^<]*)").expect("valid link pattern"));

/// The `rel` parameter of a link, quoted or bare.
static REL_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i);\s*rel\s*=\s*(?:"([^"]*)"|([^\s;,"]+))"#).expect("valid rel pattern")
});

/// Continuation state after one page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaginationState {
    pub cursor: Option<String>,
    pub has_more: bool,
}

impl PaginationState {
    pub fn done() -> Self {
        Self::default()
    }

    fn from_cursor(cursor: Option<String>) -> Self {
        let has_more = cursor.is_some();
        Self { cursor, has_more }
    }
}

/// How a provider tells us a traversal without cursors is over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCriterion {
    /// The node is an empty array or object.
    EmptyResponse,
    /// The field is missing, null, an empty array or an empty string.
    EmptyOrMissingField,
    /// A boolean field is `true` while more data remains.
    ExplicitlyIndicated,
}

/// How the cursor is encoded in the response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseEncoding {
    #[default]
    None,
    PercentEncoding,
}

impl ResponseEncoding {
    fn decode(self, raw: &str) -> Option<String> {
        match self {
            ResponseEncoding::None => Some(raw.to_string()),
            ResponseEncoding::PercentEncoding => match urlencoding::decode(raw) {
                Ok(decoded) => Some(decoded.into_owned()),
                Err(error) => {
                    tracing::warn!(%error, cursor = raw, "cursor isn't valid percent-encoded UTF-8");
                    None
                }
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationExtractor {
    /// The provider returns everything in one response.
    #[default]
    None,
    /// Cursor in the first value of a response header.
    Header { name: String },
    /// Cursor as a string or integer at a body path.
    Body { path: String },
    /// `rel="next"` target of an RFC 5988 `Link` header.
    LinkHeader,
    /// Offset traversal that stops when the response says so. `path` of
    /// `None` inspects the whole body.
    EndCriterion {
        path: Option<String>,
        criterion: EndCriterion,
    },
}

impl PaginationExtractor {
    pub fn extract(
        &self,
        headers: &HeaderMap,
        body: &Value,
        encoding: ResponseEncoding,
    ) -> PaginationState {
        let raw: Option<Cow<'_, str>> = match self {
            PaginationExtractor::None => return PaginationState::done(),
            PaginationExtractor::Header { name } => header_cursor(headers, name),
            PaginationExtractor::Body { path } => body_cursor(body, path),
            PaginationExtractor::LinkHeader => link_cursor(headers),
            PaginationExtractor::EndCriterion { path, criterion } => {
                return PaginationState {
                    cursor: None,
                    has_more: more_by_criterion(body, path.as_deref(), *criterion),
                };
            }
        };
        let cursor = raw
            .filter(|c| !c.is_empty())
            .and_then(|c| encoding.decode(&c));
        PaginationState::from_cursor(cursor)
    }
}

fn header_cursor<'a>(headers: &'a HeaderMap, name: &str) -> Option<Cow<'a, str>> {
    let value = headers.get(name)?;
    match value.to_str() {
        Ok(s) => Some(Cow::Borrowed(s.trim())),
        Err(_) => {
            tracing::warn!(header = name, "pagination header isn't visible ASCII");
            None
        }
    }
}

fn body_cursor<'a>(body: &'a Value, path: &str) -> Option<Cow<'a, str>> {
    match node::optional_node(body, path)? {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(Cow::Owned(n.to_string())),
        other => {
            tracing::warn!(path, value = %other, "pagination cursor isn't a string or integer");
            None
        }
    }
}

fn link_cursor(headers: &HeaderMap) -> Option<Cow<'_, str>> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| LINK_VALUE.captures_iter(v))
        .find(|link| link.get(2).is_some_and(|params| is_next_relation(params.as_str())))
        .and_then(|link| link.get(1))
        .map(|m| Cow::Borrowed(m.as_str()))
}

/// Relation types are a space separated list; `next` must be one of them.
fn is_next_relation(params: &str) -> bool {
    REL_PARAM
        .captures(params)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .is_some_and(|rel| {
            rel.as_str()
                .split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case("next"))
        })
}

fn more_by_criterion(body: &Value, path: Option<&str>, criterion: EndCriterion) -> bool {
    let target = match path {
        Some(p) => node::optional_node(body, p),
        None => Some(body).filter(|b| !b.is_null()),
    };
    match criterion {
        EndCriterion::EmptyResponse => match target {
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(fields)) => !fields.is_empty(),
            Some(_) => true,
            None => false,
        },
        EndCriterion::EmptyOrMissingField => match target {
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
            None => false,
        },
        EndCriterion::ExplicitlyIndicated => match target {
            Some(Value::Bool(more)) => *more,
            Some(other) => {
                tracing::warn!(value = %other, "end-of-data indicator isn't a boolean");
                false
            }
            None => false,
        },
    }
}

/// Where the orchestrator is in a traversal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageCursor {
    /// Records requested on previous pages.
    pub skip: u64,
    pub limit: u32,
    /// Cursor extracted from the previous response, if any.
    pub cursor: Option<String>,
}

/// Zero- or one-based page index holding record `skip` at `limit` per page.
pub fn page_number(skip: u64, limit: u32, page_start: u64) -> u64 {
    skip / u64::from(limit.max(1)) + page_start
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryParameterTransformer {
    #[default]
    None,
    RawOffset {
        offset_parameter: String,
        limit_parameter: Option<String>,
    },
    PageNumber {
        page_parameter: String,
        limit_parameter: Option<String>,
        page_start: u64,
    },
    /// Echo the extracted cursor back as a query parameter.
    Token {
        token_parameter: String,
        limit_parameter: Option<String>,
    },
    /// Request the extracted cursor as the next URI. Relative links are
    /// resolved against the endpoint by the fetcher.
    NextUri { limit_parameter: Option<String> },
}

impl QueryParameterTransformer {
    pub fn apply(&self, page: &PageCursor, request: &mut FetchRequest) {
        let limit = page.limit.to_string();
        let limit_parameter = match self {
            QueryParameterTransformer::None => return,
            QueryParameterTransformer::RawOffset {
                offset_parameter,
                limit_parameter,
            } => {
                request.param(offset_parameter.as_str(), page.skip.to_string());
                limit_parameter
            }
            QueryParameterTransformer::PageNumber {
                page_parameter,
                limit_parameter,
                page_start,
            } => {
                let page_no = page_number(page.skip, page.limit, *page_start);
                request.param(page_parameter.as_str(), page_no.to_string());
                limit_parameter
            }
            QueryParameterTransformer::Token {
                token_parameter,
                limit_parameter,
            } => {
                if let Some(token) = &page.cursor {
                    request.param(token_parameter.as_str(), token.as_str());
                }
                limit_parameter
            }
            QueryParameterTransformer::NextUri { limit_parameter } => {
                if let Some(uri) = &page.cursor {
                    // The next link carries the rest of its page's query.
                    request.params.clear();
                    request.next_uri = Some(uri.clone());
                }
                limit_parameter
            }
        };
        if let Some(name) = limit_parameter {
            request.param(name.as_str(), limit);
        }
    }
}

/// Pagination behaviour of one provider endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationSettings {
    pub extractor: PaginationExtractor,
    pub parameters: QueryParameterTransformer,
    #[serde(default)]
    pub encoding: ResponseEncoding,
    #[serde(default = "default_page_size")]
    page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self::none()
    }
}

impl PaginationSettings {
    /// A single fetch with no pagination parameters.
    pub fn none() -> Self {
        Self {
            extractor: PaginationExtractor::None,
            parameters: QueryParameterTransformer::None,
            encoding: ResponseEncoding::None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn new(extractor: PaginationExtractor, parameters: QueryParameterTransformer) -> Self {
        Self {
            extractor,
            parameters,
            ..Self::none()
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: ResponseEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    pub fn is_paginated(&self) -> bool {
        self.extractor != PaginationExtractor::None
    }

    pub fn extract(&self, headers: &HeaderMap, body: &Value) -> PaginationState {
        self.extractor.extract(headers, body, self.encoding)
    }
}
