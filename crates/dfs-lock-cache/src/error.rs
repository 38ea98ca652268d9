//! Client error types for talking to the lock authority

/// Error type for lock authority RPCs issued by the cache
///
/// The cache never surfaces these to its callers: a failed Acquire counts as
/// "not granted" and a failed Release is logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::Other(anyhow::anyhow!("Invalid gRPC address: bad"));
        assert_eq!(err.to_string(), "Invalid gRPC address: bad");
    }

    #[test]
    fn test_from_tonic_status() {
        let status = tonic::Status::unavailable("authority down");
        let err: ClientError = status.into();
        assert!(matches!(err, ClientError::Grpc(_)));
        assert!(err.to_string().starts_with("gRPC error"));
    }
}
