use async_trait::async_trait;
use axum::{
    Json,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn success<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

pub fn message(status: StatusCode, msg: &str) -> Response {
    (
        status,
        Json(MessageResponse {
            message: msg.to_string(),
        }),
    )
        .into_response()
}

/// A JSON request body whose rejections answer 400 `{"error": ...}`.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// Deserializes a body already read as raw JSON, mapping failures to 400.
pub fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
}

/// Deserializes a field that may be absent, `null`, or a value.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]`: a missing key
/// stays `None`, an explicit `null` becomes `Some(None)`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Like [`nullable`] but keeps the raw JSON value, `null` included.
pub fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// Reads `1`/`0` out of whatever a client sent for a boolean flag.
pub fn truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct PatchFields {
        #[serde(default, deserialize_with = "nullable")]
        page: Option<Option<i64>>,
        #[serde(default, deserialize_with = "present")]
        flag: Option<serde_json::Value>,
    }

    #[test]
    fn test_nullable_distinguishes_missing_from_null() {
        let missing: PatchFields = serde_json::from_value(json!({})).unwrap();
        assert_eq!(missing.page, None);
        assert!(missing.flag.is_none());

        let null: PatchFields = serde_json::from_value(json!({"page": null, "flag": null})).unwrap();
        assert_eq!(null.page, Some(None));
        assert_eq!(null.flag, Some(serde_json::Value::Null));

        let value: PatchFields = serde_json::from_value(json!({"page": 42})).unwrap();
        assert_eq!(value.page, Some(Some(42)));
    }

    #[test]
    fn test_from_json_rejects_wrong_types() {
        let err = from_json::<PatchFields>(json!({"page": "ten"})).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("Invalid request body"));
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("yes")));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!(null)));
    }
}
