//! JSON extractor that keeps body errors in the standard envelope.
//!
//! axum's stock `Json` rejects malformed bodies with a plain-text response;
//! wrapping it routes those rejections through `ApiError` so every response
//! the API produces has the same error shape.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};

use super::error::ApiError;

#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Json(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorResponse;
    use crate::db::UpdateUserStatusRequest;
    use axum::body::Body;
    use axum::http::StatusCode;

    fn json_request(body: &str) -> Request {
        axum::http::Request::builder()
            .method("PATCH")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn response_envelope(err: ApiError) -> (StatusCode, ErrorResponse) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_enum_value_uses_error_envelope() {
        let err = Json::<UpdateUserStatusRequest>::from_request(
            json_request(r#"{"status":"suspended"}"#),
            &(),
        )
        .await
        .unwrap_err();

        let (status, envelope) = response_envelope(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(envelope.error.code, "bad_request");
        assert!(!envelope.error.message.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_envelope() {
        let err = Json::<UpdateUserStatusRequest>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();

        let (status, envelope) = response_envelope(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(envelope.error.code, "bad_request");
    }

    #[tokio::test]
    async fn test_valid_body_passes_through() {
        let Json(req) = Json::<UpdateUserStatusRequest>::from_request(
            json_request(r#"{"status":"inactive"}"#),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(req.status, crate::db::AccountStatus::Inactive);
    }
}
