//! Configuration of a deployment, read from a JSON file.
//!
//! The file names the parameters, the key files, and where the clients
//! write their ciphertexts. Keys not listed here are ignored, so the file
//! can carry free-form `comment_*` entries. Relative paths are relative to
//! the working directory.

use crate::ingest::{FileSourceResolver, DEFAULT_EXTENSION};
use crate::{
    ClientId, Error, FileKeyStore, Parameters, ParametersBuilder, Result, SchemeId, SecurityLevel,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

fn default_scheme() -> SchemeId {
    SchemeId::Bfv
}

fn default_coeff_modulus_bits() -> Vec<usize> {
    Parameters::default().coeff_modulus_bits().to_vec()
}

fn default_plaintext_bits() -> usize {
    Parameters::default().plaintext_bits()
}

fn default_security_level() -> SecurityLevel {
    SecurityLevel::Tc128
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

/// Configuration of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// The homomorphic scheme.
    #[serde(default = "default_scheme")]
    pub scheme: SchemeId,

    /// Polynomial degree.
    pub poly_modulus_degree: usize,

    /// Number of fractional bits of the encoding.
    #[serde(alias = "scale_bits")]
    pub ckks_scale_bits: usize,

    /// Sizes of the ciphertext moduli.
    #[serde(default = "default_coeff_modulus_bits")]
    pub coeff_modulus_bits: Vec<usize>,

    /// Size of the plaintext modulus.
    #[serde(default = "default_plaintext_bits")]
    pub plaintext_bits: usize,

    /// Security level, in bits.
    #[serde(default = "default_security_level")]
    pub security_level: SecurityLevel,

    /// Number of clients, identified from 1 to `num_clients`.
    pub num_clients: u32,

    /// Largest number of readings summed in a round; `num_clients` if
    /// absent. Bounds the magnitude of each reading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_contributors: Option<usize>,

    /// File holding the public key.
    pub public_key_file: PathBuf,

    /// File holding the secret key.
    pub secret_key_file: PathBuf,

    /// File holding the evaluation key.
    pub relin_keys_file: PathBuf,

    /// Prefix of the ciphertext files; the client id and the extension are
    /// appended to it.
    pub data_path_prefix: String,

    /// Extension of the ciphertext files.
    #[serde(default = "default_extension")]
    pub ciphertext_extension: String,
}

impl AggregationConfig {
    /// Read a configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        contents.parse()
    }

    /// Build the parameters described by the configuration.
    pub fn parameters(&self) -> Result<Parameters> {
        ParametersBuilder::new()
            .set_scheme(self.scheme)
            .set_degree(self.poly_modulus_degree)
            .set_coeff_modulus_bits(&self.coeff_modulus_bits)
            .set_scale_bits(self.ckks_scale_bits)
            .set_plaintext_bits(self.plaintext_bits)
            .set_security_level(self.security_level)
            .set_max_contributors(
                self.max_contributors
                    .unwrap_or(self.num_clients as usize),
            )
            .build()
    }

    /// The store over the three key files.
    pub fn key_store(&self) -> FileKeyStore {
        FileKeyStore::new(
            &self.public_key_file,
            &self.secret_key_file,
            &self.relin_keys_file,
        )
    }

    /// The resolver over the ciphertext files.
    pub fn source_resolver(&self) -> FileSourceResolver {
        FileSourceResolver::with_extension(
            self.data_path_prefix.as_str(),
            self.ciphertext_extension.as_str(),
        )
    }

    /// The identifiers of the expected clients, `1..=num_clients`.
    pub fn expected_ids(&self) -> Result<Vec<ClientId>> {
        (1..=self.num_clients as u64).map(ClientId::new).collect()
    }
}

impl FromStr for AggregationConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        if config.num_clients == 0 {
            return Err(Error::Config("num_clients must be positive".to_string()));
        }
        Ok(config)
    }
}
