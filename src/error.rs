//! Error taxonomy shared by the gateway and the state store.

use thiserror::Error;

/// A response body that did not match the expected shape.
///
/// Absent and malformed fields are reported separately so callers can tell a
/// backend that stopped sending a key from one that sends garbage in it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing field `{field}`")]
    MissingField { field: String },

    #[error("invalid value for `{field}`: {value}")]
    InvalidField { field: String, value: String },

    #[error("unexpected body shape, expected {expected}")]
    Shape { expected: &'static str },
}

impl DecodeError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidField {
            field: field.into(),
            value: value.to_string(),
        }
    }
}

/// Failure of a store or gateway operation.
///
/// `Clone` because a single in-flight name lookup hands its outcome to every
/// caller attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The request could not be sent or no response arrived.
    #[error("{endpoint}: transport failure: {message}")]
    Transport { endpoint: String, message: String },

    /// The response arrived but its body did not decode.
    #[error("{endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: DecodeError,
    },

    /// The server answered without confirming the mutation.
    #[error("{endpoint}: rejected ({status}): {message}")]
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The request was refused locally before reaching the gateway.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    pub fn transport(endpoint: &str, message: impl ToString) -> Self {
        Self::Transport {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    }

    pub fn decode(endpoint: &str, source: DecodeError) -> Self {
        Self::Decode {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    pub fn rejected(endpoint: &str, status: u16, message: impl ToString) -> Self {
        Self::Rejected {
            endpoint: endpoint.to_string(),
            status,
            message: message.to_string(),
        }
    }

    /// The decode detail, if this is a decode failure.
    pub fn decode_detail(&self) -> Option<&DecodeError> {
        match self {
            Self::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
