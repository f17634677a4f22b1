//! Request handlers organized by resource.

pub mod cache;
pub mod datasets;
pub mod health;

use axum::http::StatusCode;
use gridiron_core::Error;
use tracing::error;

/// Map a domain error to the status and message returned to the caller.
pub fn error_response(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::UnknownDataset(_) => StatusCode::NOT_FOUND,
        e if e.is_data_error() => StatusCode::UNPROCESSABLE_ENTITY,
        e if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        Error::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "Request failed");
    }
    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_statuses() {
        let cases = [
            (Error::UnknownDataset("pbp".into()), StatusCode::NOT_FOUND),
            (Error::InvalidRequest("season".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (Error::MalformedTable("ragged".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (Error::SourceUnavailable("502".into()), StatusCode::SERVICE_UNAVAILABLE),
            (Error::CircuitOpen { service: "nflverse".into() }, StatusCode::SERVICE_UNAVAILABLE),
            (Error::Source("418".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(error_response(err).0, expected);
        }
    }
}
