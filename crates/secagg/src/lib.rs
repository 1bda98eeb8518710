#![crate_name = "secagg"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Privacy-preserving aggregation of encrypted readings.
//!
//! A trusted key generation center produces a key set once, hands the
//! public and evaluation keys to the clients and the aggregator, and the
//! secret key to the decrypting party only. Clients encrypt their readings;
//! the aggregator ingests the ciphertexts, folds them with homomorphic
//! additions and never sees a plaintext; the decrypting party recovers the
//! total and the average.

mod errors;

pub mod aggregate;
pub mod bfv;
pub mod client;
pub mod config;
pub mod contribution;
pub mod decode;
pub mod distribution;
pub mod ingest;
pub mod kgc;
pub mod metrics;
pub mod parameters;
pub mod pipeline;
pub mod proto;

pub use aggregate::{aggregate, aggregate_with, AggregationResult, FoldStrategy};
pub use contribution::{ClientContribution, ClientId};
pub use decode::{finalize, DecodedResult};
pub use distribution::{
    FileKeyStore, KeyId, KeyKind, KeyStore, KeyTag, MemoryKeyStore, Tagged,
};
pub use errors::{Error, ParametersError, Result};
pub use ingest::{ingest, FileSourceResolver, MemorySourceResolver, SourceResolver};
pub use kgc::{DecryptionKey, KeyGenerationCenter, KeyMaterial, PublicKeys};
pub use parameters::{Parameters, ParametersBuilder, ParametersTag, SchemeId, SecurityLevel};
pub use secagg_traits::HomomorphicScheme;

/// A homomorphic scheme instantiated with the parameters and errors of this
/// library.
pub trait Scheme: HomomorphicScheme<Parameters = Parameters, Error = Error> {}

impl<T> Scheme for T where T: HomomorphicScheme<Parameters = Parameters, Error = Error> {}
