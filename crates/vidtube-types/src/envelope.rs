use serde::{Deserialize, Serialize};

/// Wrapper around every successful response body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn new(status_code: u16, message: impl Into<String>, data: T) -> Self {
        Self {
            status_code,
            data,
            message: message.into(),
            success: status_code < 400,
        }
    }
}

/// Body sent for every failed request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub success: bool,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_flag_follows_status() {
        assert!(ApiResponse::new(201, "created", ()).success);
        assert!(!ApiResponse::new(404, "missing", ()).success);
    }

    #[test]
    fn envelope_uses_camel_case() {
        let json = serde_json::to_value(ApiResponse::new(200, "ok", 1)).unwrap();
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["data"], 1);
        assert_eq!(json["success"], true);
    }
}
