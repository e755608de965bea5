//! Caller identity
//!
//! Authentication happens upstream. The gateway forwards the user id and the user's group
//! ids as headers, and handlers read them through [`UserContext`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use damflow_core::constants::{GROUP_IDS_HEADER, USER_ID_HEADER};
use damflow_core::AppError;

use crate::error::HttpAppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: i64,
    pub group_ids: Vec<i64>,
}

impl UserContext {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let user_id = headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", USER_ID_HEADER)))?
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| AppError::Unauthorized(format!("Invalid {} header", USER_ID_HEADER)))?;

        let group_ids = match headers.get(GROUP_IDS_HEADER) {
            Some(value) => parse_group_ids(value.to_str().map_err(|_| {
                AppError::InvalidInput(format!("Invalid {} header", GROUP_IDS_HEADER))
            })?)?,
            None => Vec::new(),
        };

        Ok(Self { user_id, group_ids })
    }
}

/// Comma separated ids; blank entries are ignored.
fn parse_group_ids(raw: &str) -> Result<Vec<i64>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| AppError::InvalidInput(format!("Invalid group id '{}'", s)))
        })
        .collect()
}

impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        UserContext::from_headers(&parts.headers).map_err(HttpAppError::from)
    }
}
