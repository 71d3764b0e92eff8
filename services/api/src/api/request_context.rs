//! Request-scoped context extracted from HTTP requests.

use std::convert::Infallible;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::Json;
use sentrydash_id::RequestId;

use crate::api::error::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied request id that is echoed back.
const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s.len() <= MAX_REQUEST_ID_LEN)
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = header_string(&parts.headers, REQUEST_ID_HEADER)
            .unwrap_or_else(|| RequestId::new().to_string());
        Ok(Self { request_id })
    }
}

impl RequestContext {
    /// Unwrap a JSON body, turning extractor rejections into 400s.
    pub fn body<T>(&self, payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
        payload.map(|Json(body)| body).map_err(|rejection| {
            ApiError::bad_request("invalid_body", rejection.body_text())
                .with_request_id(self.request_id.clone())
        })
    }

    /// Unwrap query parameters, turning extractor rejections into 400s.
    pub fn query<T>(
        &self,
        query: Result<axum::extract::Query<T>, QueryRejection>,
    ) -> Result<T, ApiError> {
        query.map(|q| q.0).map_err(|rejection| {
            ApiError::bad_request("invalid_query", rejection.body_text())
                .with_request_id(self.request_id.clone())
        })
    }

    /// Attach this request's id to a service error.
    pub fn fail(&self, err: impl Into<ApiError>) -> ApiError {
        err.into().with_request_id(self.request_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> RequestContext {
        let (mut parts, _) = req.into_parts();
        match RequestContext::from_request_parts(&mut parts, &()).await {
            Ok(ctx) => ctx,
            Err(never) => match never {},
        }
    }

    #[tokio::test]
    async fn echoes_client_request_id() {
        let req = Request::builder()
            .header(REQUEST_ID_HEADER, "abc-123")
            .body(())
            .unwrap();
        assert_eq!(extract(req).await.request_id, "abc-123");
    }

    #[tokio::test]
    async fn generates_request_id_when_absent() {
        let req = Request::builder().body(()).unwrap();
        let ctx = extract(req).await;
        assert!(ctx.request_id.starts_with("req_"));
        assert!(RequestId::parse(&ctx.request_id).is_ok());
    }
}
