use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use vidtube_types::envelope::ApiResponse;

/// A successful response wrapped in the standard envelope.
pub struct Reply<T> {
    status: StatusCode,
    message: String,
    data: T,
}

impl<T: Serialize> Reply<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message: message.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        let body = ApiResponse::new(self.status.as_u16(), self.message, self.data);
        (self.status, Json(body)).into_response()
    }
}

/// Data for responses that carry nothing but the message.
pub fn empty() -> serde_json::Value {
    serde_json::json!({})
}
