use std::path::PathBuf;

use thiserror::Error;

use crate::{ClientId, KeyKind, SecurityLevel};

/// The Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum encapsulating all the possible errors from this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Indicates that the parameter set is invalid.
    #[error("{0}")]
    ParameterError(#[from] ParametersError),

    /// Indicates that a key blob could not be loaded.
    #[error("Cannot load {kind}: {reason}")]
    KeyLoad {
        /// The key that failed to load.
        kind: KeyKind,
        /// Why it failed.
        reason: String,
    },

    /// Indicates that a ciphertext blob could not be loaded.
    #[error("Cannot load ciphertext{}: {reason}", fmt_client(.client_id))]
    CiphertextLoad {
        /// The client the ciphertext was read for, if known.
        client_id: Option<ClientId>,
        /// Why it failed.
        reason: String,
    },

    /// Indicates that a ciphertext was not produced under the keys and
    /// parameters of the aggregation.
    #[error("Incompatible ciphertext from client {client_id}: {reason}")]
    IncompatibleCiphertext {
        /// The offending client.
        client_id: ClientId,
        /// What does not match.
        reason: String,
    },

    /// Indicates that more contributions were folded than the parameters
    /// allow; their sum could exceed the plaintext range.
    #[error("Too many contributions: {count} exceed the maximum of {max}")]
    TooManyContributions {
        /// The number of contributions.
        count: usize,
        /// The maximum allowed by the parameters.
        max: usize,
    },

    /// Indicates that no contribution could be loaded.
    #[error("No contributions loaded out of {expected} expected")]
    NoContributions {
        /// The number of expected contributions.
        expected: usize,
    },

    /// Indicates a decryption or decoding failure.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Indicates an invalid client identifier.
    #[error("Invalid client id: {0}")]
    InvalidClientId(u64),

    /// Indicates an operation called in the wrong state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Indicates a failure of the underlying scheme.
    #[error("Scheme error: {0}")]
    Scheme(String),

    /// Indicates an I/O failure on a path.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// The path that was accessed.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Indicates an invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn fmt_client(client_id: &Option<ClientId>) -> String {
    client_id
        .map(|id| format!(" from client {id}"))
        .unwrap_or_default()
}

impl Error {
    /// Create a key loading error.
    pub fn key_load<S: Into<String>>(kind: KeyKind, reason: S) -> Self {
        Self::KeyLoad {
            kind,
            reason: reason.into(),
        }
    }

    /// Create a ciphertext loading error.
    pub fn ciphertext_load<S: Into<String>>(client_id: Option<ClientId>, reason: S) -> Self {
        Self::CiphertextLoad {
            client_id,
            reason: reason.into(),
        }
    }

    /// Create an incompatible ciphertext error.
    pub fn incompatible<S: Into<String>>(client_id: ClientId, reason: S) -> Self {
        Self::IncompatibleCiphertext {
            client_id,
            reason: reason.into(),
        }
    }

    /// Create an I/O error on a path.
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<fhe::Error> for Error {
    fn from(e: fhe::Error) -> Self {
        Self::Scheme(e.to_string())
    }
}

/// Separate enum to indicate parameters-related errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParametersError {
    /// Indicates that the scheme identifier is not supported.
    #[error("Unknown scheme: {0}")]
    UnknownScheme(String),

    /// Indicates that the degree is invalid.
    #[error("Invalid degree: {0} is not a power of 2 between 1024 and 32768")]
    InvalidDegree(usize),

    /// Indicates that the modulus size is invalid.
    #[error("Invalid modulus size: {0}, expected an integer between {1} and {2}")]
    InvalidModulusSize(usize, usize, usize),

    /// Indicates that the modulus chain is too short.
    #[error("Too few moduli: {0} is below limit {1}")]
    TooFewModuli(usize, usize),

    /// Indicates that the modulus chain is too large for the security level.
    #[error("Insecure parameters: {bits} bits of modulus exceed {max} for degree {degree} at {level}")]
    Insecure {
        /// Total number of bits of the modulus chain.
        bits: usize,
        /// Maximum allowed number of bits.
        max: usize,
        /// Polynomial degree.
        degree: usize,
        /// Requested security level.
        level: SecurityLevel,
    },

    /// Indicates that the plaintext size is invalid.
    #[error("Invalid plaintext size: {0}, expected an integer between {1} and {2}")]
    InvalidPlaintextSize(usize, usize, usize),

    /// Indicates that the plaintext modulus is not smaller than every
    /// ciphertext modulus.
    #[error("Plaintext size {0} must be smaller than the smallest modulus size {1}")]
    PlaintextAboveModulus(usize, usize),

    /// Indicates that the modulus chain leaves no room for noise growth.
    #[error("Insufficient noise budget: {0} bits of modulus for {1} bits of plaintext")]
    NoiseBudget(usize, usize),

    /// Indicates that the scale does not fit in the plaintext.
    #[error("Invalid scale: {0} bits do not fit in a {1}-bit plaintext")]
    InvalidScale(usize, usize),

    /// Indicates an unsupported security level.
    #[error("Unknown security level: {0}")]
    UnknownSecurityLevel(usize),

    /// Indicates that the maximum number of contributions is zero.
    #[error("Invalid maximum number of contributions: {0}")]
    InvalidMaxContributors(usize),

    /// Indicates that the sum of the maximum number of contributions cannot
    /// hold a single unit of the encoding.
    #[error("A {1}-bit plaintext with {2} fractional bits cannot hold the sum of {0} contributions")]
    ContributorRange(usize, usize, usize),

    /// Indicates that the scheme rejected parameters that passed validation.
    #[error("Parameters rejected by the scheme: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use crate::{ClientId, Error, KeyKind, ParametersError};

    #[test]
    fn error_strings() {
        assert_eq!(
            Error::key_load(KeyKind::Public, "bad magic").to_string(),
            "Cannot load public key: bad magic"
        );
        assert_eq!(
            Error::ciphertext_load(None, "truncated").to_string(),
            "Cannot load ciphertext: truncated"
        );
        assert_eq!(
            Error::ciphertext_load(ClientId::new(3).ok(), "truncated").to_string(),
            "Cannot load ciphertext from client 3: truncated"
        );
        assert_eq!(
            Error::NoContributions { expected: 10 }.to_string(),
            "No contributions loaded out of 10 expected"
        );
        assert_eq!(
            Error::from(ParametersError::InvalidDegree(1000)).to_string(),
            "Invalid degree: 1000 is not a power of 2 between 1024 and 32768"
        );
        assert_eq!(
            ParametersError::TooFewModuli(1, 2).to_string(),
            "Too few moduli: 1 is below limit 2"
        );
        assert_eq!(
            Error::TooManyContributions { count: 65, max: 64 }.to_string(),
            "Too many contributions: 65 exceed the maximum of 64"
        );
    }
}
