use std::time::Duration;

use thiserror::Error;

/// Failure to turn an operation and its arguments into a cache key.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("arguments of `{operation}` cannot be serialized into a cache key: {source}")]
    Unserializable {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the cache itself, as opposed to errors of the wrapped
/// producer (those are returned unchanged).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    KeyDerivation(#[from] KeyError),
    #[error("producer for `{operation}` did not finish within {}ms", timeout.as_millis())]
    ProducerTimeout {
        operation: String,
        timeout: Duration,
    },
}
