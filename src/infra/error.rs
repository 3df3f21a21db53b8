use std::{io, net::SocketAddr};

use thiserror::Error;

use crate::config::LoadError;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("configuration could not be loaded: {0}")]
    Configuration(#[from] LoadError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("failed to bind {listener} listener on {addr}")]
    Bind {
        listener: &'static str,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("http server stopped unexpectedly")]
    Serve(#[source] io::Error),
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn bind(listener: &'static str, addr: SocketAddr) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Bind {
            listener,
            addr,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn bind_failures_keep_the_io_source() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().expect("addr");
        let err = InfraError::bind("public", addr)(io::Error::from(io::ErrorKind::AddrInUse));

        assert_eq!(
            err.to_string(),
            "failed to bind public listener on 127.0.0.1:8080"
        );
        assert!(err.source().is_some());
    }
}
