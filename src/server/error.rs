/*
 *  server/error.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  HTTP error responses
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Every way a route can fail, already localized
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 400 `{"success": false, "message": ...}`
    Message(String),
    /// `{"error": ...}` with the given status, usually 500
    Error(StatusCode, String),
    /// 404 plain text
    NotFound(String),
    /// 403 plain text
    Forbidden(String),
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Error(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Message(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": message })),
            )
                .into_response(),
            ApiError::Error(status, error) => (status, Json(json!({ "error": error }))).into_response(),
            ApiError::NotFound(text) => (StatusCode::NOT_FOUND, text).into_response(),
            ApiError::Forbidden(text) => (StatusCode::FORBIDDEN, text).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Message("x".into()).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::internal("x").into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::NotFound("x".into()).into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Forbidden("x".into()).into_response().status(), StatusCode::FORBIDDEN);
    }
}
