use thiserror::Error;

/// Unified error type for the entire chartsync-core library.
/// Every public fallible function returns `Result<T, EngineError>`.
///
/// Data-shape mismatches and per-asset timeouts are deliberately NOT
/// represented here — adapters absorb those into empty results so one bad
/// response cannot poison a whole batch run.
#[derive(Debug, Error)]
pub enum EngineError {
    // ── Provider / Network ──────────────────────────────────────────
    #[error("Session handshake failed ({provider}): {message}")]
    AuthFailure {
        provider: String,
        message: String,
    },

    #[error("Provider request failed ({provider}): HTTP {status}")]
    ProviderUnavailable {
        provider: String,
        status: u16,
    },

    #[error("Network error: {0}")]
    Network(String),

    // ── Input validation ────────────────────────────────────────────
    #[error("Unknown origin: {0}")]
    UnknownOrigin(String),

    #[error("Invalid chart type: {0}")]
    InvalidChartType(String),

    // ── Storage / Serialization ─────────────────────────────────────
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Storage I/O error: {0}")]
    Storage(String),
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        // Strip query strings from URLs embedded in reqwest messages so
        // the quote-API token never ends up in logs or error chains.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        EngineError::Network(sanitized)
    }
}
