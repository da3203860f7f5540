//! `ApiError` is returned by trigger handlers and middleware. It pairs an
//! HTTP status with an `anyhow::Error`, and responds with a JSON body of
//! `{"status": <code>, "error": <message and causes>}`.
use axum::http::StatusCode;

#[derive(Debug, thiserror::Error, serde::Serialize)]
#[error("status: {status}, error: {error}")]
pub struct ApiError {
    #[serde(serialize_with = "serialize_status")]
    pub status: StatusCode,
    #[serde(serialize_with = "serialize_error")]
    #[source]
    pub error: anyhow::Error,
}

fn serialize_status<S: serde::Serializer>(status: &StatusCode, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u16(status.as_u16())
}

fn serialize_error<S: serde::Serializer>(error: &anyhow::Error, s: S) -> Result<S::Ok, S::Error> {
    // Alternate formatting includes each `.context(..)` of a failed run.
    s.serialize_str(&format!("{error:#}"))
}

impl ApiError {
    pub fn unauthorized() -> ApiError {
        ApiError {
            status: StatusCode::UNAUTHORIZED,
            error: anyhow::anyhow!("missing or invalid trigger secret"),
        }
    }
}

/// Run failures are server errors, unless they wrap an `ApiError` with its own status.
impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        let status = error
            .downcast_ref::<ApiError>()
            .map_or(StatusCode::INTERNAL_SERVER_ERROR, |api_error| api_error.status);
        ApiError { status, error }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status;
        (status, axum::Json(self)).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_api_error_serialization() {
        let err = ApiError::from(
            anyhow::anyhow!("store is unreachable").context("fetching open alerts"),
        );
        insta::assert_json_snapshot!(err, @r###"
        {
          "status": 500,
          "error": "fetching open alerts: store is unreachable"
        }
        "###);
    }

    #[test]
    fn test_wrapped_api_error_keeps_its_status() {
        let err = anyhow::Error::from(ApiError::unauthorized()).context("running plate alerts");
        assert_eq!(StatusCode::UNAUTHORIZED, ApiError::from(err).status);
    }
}
