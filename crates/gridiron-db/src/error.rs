//! sqlx error classification.

use gridiron_core::Error;

/// SQLSTATEs worth retrying: connection loss, shutdown, too many clients,
/// serialization failure and deadlock.
fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08")
        || code.starts_with("57P0")
        || matches!(code, "53300" | "40001" | "40P01")
}

/// Map a sqlx error onto the domain error, separating transient failures
/// from statement errors.
pub fn map_sqlx_error(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => Error::Connection(err.to_string()),
        sqlx::Error::Database(db) => match db.code() {
            Some(code) if is_transient_sqlstate(&code) => Error::Connection(err.to_string()),
            _ => Error::Database(err.to_string()),
        },
        _ => Error::Database(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_transient() {
        assert!(map_sqlx_error(sqlx::Error::PoolTimedOut).is_transient());
        assert!(map_sqlx_error(sqlx::Error::PoolClosed).is_transient());
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(map_sqlx_error(sqlx::Error::Io(io)).is_transient());
    }

    #[test]
    fn test_statement_errors_are_not_transient() {
        let err = map_sqlx_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_sqlstate_classes() {
        assert!(is_transient_sqlstate("08006"));
        assert!(is_transient_sqlstate("57P01"));
        assert!(is_transient_sqlstate("40P01"));
        assert!(!is_transient_sqlstate("42P01"));
        assert!(!is_transient_sqlstate("23505"));
    }
}
