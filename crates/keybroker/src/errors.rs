//! Error taxonomy shared by the engine and its callers.
//!
//! Every derivation or storage failure is surfaced verbatim as one of these
//! kinds; the broker never substitutes weaker material on failure.

use jsonrpsee::types::error::{INTERNAL_ERROR_CODE, INVALID_PARAMS_CODE};
use jsonrpsee::types::ErrorObjectOwned;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// The seed blob did not parse into the expected named sub-seeds.
    #[error("malformed seed bundle: {0}")]
    MalformedSeed(String),

    /// The seed bundle parsed but does not bind to the claimed address.
    #[error("seed bundle does not bind to the requested address")]
    SeedInvalid,

    /// No seed bundle is provisioned for this address.
    #[error("no seed bundle stored for this address")]
    SeedNotFound,

    #[error("invalid resource tag: {0}")]
    InvalidTag(String),

    #[error("invalid certificate signing request: {0}")]
    InvalidCsr(String),

    #[error("unsupported resource type: {0}")]
    UnsupportedType(String),

    /// Derived resources cannot be written or deleted through the engine.
    #[error("resource type {0} is derived and immutable")]
    Immutable(String),

    #[error("resource not found")]
    NotFound,

    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("failed to persist certificate authority: {0}")]
    CaWriteError(String),

    #[error("operation timed out")]
    Timeout,

    /// The command blob did not parse into a signed command list.
    #[error("malformed command bundle: {0}")]
    MalformedCommands(String),

    /// A collaborator request payload did not parse.
    #[error("invalid request payload: {0}")]
    InvalidRequest(String),

    /// A cryptographic primitive rejected its input.
    #[error("cryptographic failure: {0}")]
    Crypto(String),
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::Crypto(e.to_string())
    }
}

impl From<secp256k1::Error> for Error {
    fn from(e: secp256k1::Error) -> Self {
        Self::Crypto(e.to_string())
    }
}

/// Convert an engine error into a JSON-RPC error response.
///
/// Caller mistakes (bad tags, bad seeds, immutable writes, missing
/// resources) map to the invalid-params code; backend and crypto faults map
/// to the internal-error code.
pub fn rpc_error(e: Error) -> ErrorObjectOwned {
    let code = match e {
        Error::MalformedSeed(_)
        | Error::SeedInvalid
        | Error::SeedNotFound
        | Error::InvalidTag(_)
        | Error::InvalidCsr(_)
        | Error::UnsupportedType(_)
        | Error::Immutable(_)
        | Error::NotFound
        | Error::MalformedCommands(_)
        | Error::InvalidRequest(_) => INVALID_PARAMS_CODE,
        Error::BackendUnavailable(_) | Error::CaWriteError(_) | Error::Timeout | Error::Crypto(_) => {
            INTERNAL_ERROR_CODE
        }
    };
    ErrorObjectOwned::owned(code, e.to_string(), None::<()>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_map_to_invalid_params() {
        let obj = rpc_error(Error::InvalidTag("abc".to_string()));
        assert_eq!(obj.code(), INVALID_PARAMS_CODE);
        assert!(obj.message().contains("invalid resource tag"));
    }

    #[test]
    fn backend_errors_map_to_internal() {
        let obj = rpc_error(Error::Timeout);
        assert_eq!(obj.code(), INTERNAL_ERROR_CODE);
    }
}
