//! Error types for the communications tier.
//!
//! These errors stay inside the comms crate. At the boundary to region code
//! every failure collapses into the neutral value of the operation that
//! failed (an empty list, a `false`, a `None`) after being logged once, so a
//! broken grid link can never take a simulator down with it.

/// Errors raised while talking to grid services and neighbouring regions
#[derive(Debug, thiserror::Error)]
pub enum CommsError {
    /// Socket-level failures: refused connections, resets, handshake errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote endpoint did not answer within the call deadline
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The remote endpoint answered with something we could not parse
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The remote endpoint answered with an application-level error
    #[error("Remote error: {0}")]
    Remote(String),

    /// The comms stack was configured with values it cannot act on
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display_messages() {
        let transport = CommsError::Transport("connection refused".to_string());
        assert_eq!(transport.to_string(), "Transport error: connection refused");

        let timeout = CommsError::Timeout(Duration::from_millis(3000));
        assert!(timeout.to_string().contains("3s"));

        let remote = CommsError::Remote("sim_authkey_mismatch".to_string());
        assert_eq!(remote.to_string(), "Remote error: sim_authkey_mismatch");
    }
}
