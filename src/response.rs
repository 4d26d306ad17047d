use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Uniform response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub message: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        message: message.into(),
        success: true,
        data: Some(data),
    })
}

pub fn ok_empty(message: impl Into<String>) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        message: message.into(),
        success: true,
        data: None,
    })
}

pub fn created<T: Serialize>(
    message: impl Into<String>,
    data: T,
) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(message, data))
}

#[cfg(test)]
mod tests {
    use super::ok;

    #[test]
    fn envelope_carries_data_and_success() {
        let body = ok("done", serde_json::json!({"id": 1}));
        let value = serde_json::to_value(&body.0).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "done");
        assert_eq!(value["data"]["id"], 1);
    }

    #[test]
    fn empty_envelope_omits_data() {
        let body = super::ok_empty("deleted");
        let value = serde_json::to_value(&body.0).unwrap();
        assert!(value.get("data").is_none());
    }
}
