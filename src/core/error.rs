use thiserror::Error;

/// Stage of the SRI exchange at which a document was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RejectionStage {
    /// The reception web service returned the document (`DEVUELTA`).
    Reception,
    /// The authorization web service answered `NO AUTORIZADO`.
    Authorization,
}

impl std::fmt::Display for RejectionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reception => write!(f, "reception"),
            Self::Authorization => write!(f, "authorization"),
        }
    }
}

/// Errors that can occur while building, signing or transmitting a document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SriError {
    /// Missing or malformed input data. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A required issuer or buyer record was not supplied.
    #[error("not found: {0}")]
    NotFound(String),

    /// The access key base string did not have the expected width.
    /// This is an internal invariant; callers respecting field widths never see it.
    #[error("access key components have length {actual}, expected {expected}")]
    KeyComponentLength { expected: usize, actual: usize },

    /// An access key that is not exactly 49 numeric digits (or fails its check digit).
    #[error("invalid access key: {0}")]
    InvalidAccessKey(String),

    /// XML generation, canonicalization or parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// The PKCS#12 bundle or its password is invalid, or holds no usable key pair.
    #[error("certificate error: {0}")]
    CertificateLoad(String),

    /// Any cryptographic failure while producing the signature.
    #[error("signing error: {0}")]
    Signing(String),

    /// Network, HTTP or SOAP-level failure talking to the SRI.
    #[error("SRI transport error: {0}")]
    Transport(String),

    /// Terminal business rejection, carrying the SRI messages verbatim.
    #[error("rejected by SRI at {stage}: {}", join_messages(.messages))]
    Rejected {
        stage: RejectionStage,
        messages: Vec<SriMessage>,
    },

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

fn join_messages(messages: &[SriMessage]) -> String {
    if messages.is_empty() {
        return "no messages".into();
    }
    messages
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single message returned by the SRI web services.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SriMessage {
    /// Numeric identifier (e.g. "35", "43", "70").
    pub identifier: String,
    /// Main message text.
    pub message: String,
    /// Optional detail text (`informacionAdicional`).
    pub additional_info: Option<String>,
    /// Message type, usually "ERROR" or "ADVERTENCIA".
    pub kind: String,
}

impl std::fmt::Display for SriMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.identifier, self.message)?;
        if let Some(info) = &self.additional_info {
            write!(f, " ({info})")?;
        }
        Ok(())
    }
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "issuer.ruc", "lines[2].quantity").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
