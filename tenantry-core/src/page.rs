//! Keyset pagination.
//!
//! Records are listed in `(created_at, id)` order. A page token is the
//! cursor of the last record on the previous page, base64 encoded; it
//! carries no tenant and is only ever applied inside a scoped scan.

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::entity::{RecordId, TenantScoped};
use crate::errors::{ScopeError, ScopeResult};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Position of a record in list order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: RecordId,
}

impl Cursor {
    pub fn of<E: TenantScoped>(record: &E) -> Self {
        Self {
            created_at: record.created_at(),
            id: record.id(),
        }
    }

    pub fn encode(&self) -> String {
        let raw = format!(
            "{}|{}",
            self.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.id
        );
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(token: &str) -> ScopeResult<Self> {
        let invalid = || ScopeError::bad_request("Invalid page token").into_anyhow();

        let bytes = URL_SAFE_NO_PAD.decode(token.trim()).map_err(|_| invalid())?;
        let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (ts, id) = raw.split_once('|').ok_or_else(invalid)?;

        let created_at = DateTime::parse_from_rfc3339(ts)
            .map_err(|_| invalid())?
            .with_timezone(&Utc);
        let id = Uuid::parse_str(id).map_err(|_| invalid())?;

        Ok(Self {
            created_at,
            id: RecordId(id),
        })
    }
}

/// What the caller asked for: a size and an optional resume point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub after: Option<Cursor>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            after: None,
        }
    }
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self { limit, after: None }
    }

    pub fn after(mut self, cursor: Cursor) -> Self {
        self.after = Some(cursor);
        self
    }

    /// Read `limit` and `pageToken` from query parameters.
    ///
    /// A missing or zero limit falls back to `default`; anything above
    /// `max` is clamped. A limit that is not a number is a bad request.
    pub fn from_query(
        query: &HashMap<String, String>,
        default: usize,
        max: usize,
    ) -> ScopeResult<Self> {
        let max = max.max(1);
        let limit = match query.get("limit").map(|s| s.trim()) {
            None | Some("") => default,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| ScopeError::bad_request("Invalid limit").into_anyhow())?,
        };
        let limit = if limit == 0 { default } else { limit }.clamp(1, max);

        let after = match query.get("pageToken").map(|s| s.trim()) {
            None | Some("") => None,
            Some(token) => Some(Cursor::decode(token)?),
        };

        Ok(Self { limit, after })
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub next_page_token: Option<String>,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            data: self.data.into_iter().map(f).collect(),
            next_page_token: self.next_page_token,
            limit: self.limit,
        }
    }

    pub fn try_map<U, E, F>(self, f: F) -> Result<Page<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        let data = self.data.into_iter().map(f).collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            data,
            next_page_token: self.next_page_token,
            limit: self.limit,
        })
    }
}
