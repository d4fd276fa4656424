// JSON response envelope shared by every route

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

/// `{"status", "message", "data"?}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T = serde_json::Value> {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// What handlers return
pub type ApiReply<T = serde_json::Value> = (StatusCode, Json<ApiResponse<T>>);

impl<T> ApiResponse<T> {
    pub fn success(message: &str, data: Option<T>) -> ApiReply<T> {
        (
            StatusCode::OK,
            Json(Self {
                status: STATUS_SUCCESS.to_string(),
                message: message.to_string(),
                data,
            }),
        )
    }

    pub fn error(code: StatusCode, message: &str) -> ApiReply<T> {
        (
            code,
            Json(Self {
                status: STATUS_ERROR.to_string(),
                message: message.to_string(),
                data: None,
            }),
        )
    }
}
