//! Maps `Box<dyn Error>` from the transport boundary to typed `AquaError`.
//!
//! `aqua_traits::Transport` returns boxed errors so any client can sit behind
//! it; this converts them to our typed enum, with an optional feature-gated
//! path for `aqua_http::HttpError` downcasting.

use crate::error::AquaError;

/// Map a transport-boundary error to a typed `AquaError`.
///
/// Attempts to downcast known HTTP error types first, then falls back
/// to string-based heuristics.
pub fn map_transport_error(e: &(dyn std::error::Error + 'static)) -> AquaError {
    #[cfg(feature = "http-errors")]
    {
        if let Some(http) = e.downcast_ref::<aqua_http::HttpError>() {
            return match http {
                aqua_http::HttpError::Timeout | aqua_http::HttpError::StreamIdle => {
                    AquaError::Timeout
                }
                other => AquaError::Transport(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timed out") || s.to_lowercase().contains("timeout") {
        AquaError::Timeout
    } else {
        AquaError::Transport(s)
    }
}
