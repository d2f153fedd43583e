use mio::Token;

/// Errors raised inside the event loop.
///
/// Only `Io` from the readiness facility itself stops the loop; everything
/// else is scoped to a single connection or pair.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Failed to register {token:?} with the poller: {source}")]
    Registration {
        token: Token,
        #[source]
        source: std::io::Error,
    },

    #[error("No peer registered for {0:?}")]
    UnknownConnection(Token),

    #[error("Registry invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Poller failure: {0}")]
    Io(#[from] std::io::Error),
}
