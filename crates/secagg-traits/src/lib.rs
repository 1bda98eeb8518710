#![crate_name = "secagg_traits"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Traits describing the additively homomorphic encryption capability that
//! the aggregation pipeline is built on.
//!
//! The pipeline never names a concrete cryptography library: it only relies
//! on key generation, encoding of real vectors, encryption, decryption,
//! homomorphic addition and byte serialization, as exposed below. Each role
//! only needs a subset of these traits; [`HomomorphicScheme`] bundles all of
//! them for code that orchestrates every role.

use rand::{CryptoRng, RngCore};
use std::sync::Arc;

/// Base trait of a homomorphic scheme. Holds the types shared by every role,
/// and the homomorphic addition, which is the only operation the aggregator
/// performs on ciphertexts.
pub trait SchemeBase: Sized {
    /// The parameters the scheme is instantiated with.
    type Parameters;

    /// The error type returned by every operation.
    type Error: std::error::Error;

    /// Public (encryption) key.
    type PublicKey: Clone;

    /// Secret (decryption) key.
    type SecretKey;

    /// Evaluation key, required by the party evaluating on ciphertexts.
    type EvalKey: Clone;

    /// Encoded plaintext.
    type Plaintext;

    /// Ciphertext. Supports addition through [`SchemeBase::add`].
    type Ciphertext: Clone;

    /// Instantiate the scheme for a parameter set. Fails if the parameters do
    /// not describe a valid instance of the scheme.
    fn try_new(par: &Arc<Self::Parameters>) -> Result<Self, Self::Error>;

    /// The parameters of this instance.
    fn parameters(&self) -> &Arc<Self::Parameters>;

    /// Homomorphically add two ciphertexts. Both operands must have been
    /// produced under the parameters of this instance.
    fn add(
        &self,
        lhs: &Self::Ciphertext,
        rhs: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, Self::Error>;
}

/// Key generation.
pub trait SchemeKeygen: SchemeBase {
    /// Generate a fresh key set. The three keys are only meaningful together.
    fn keygen<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<(Self::PublicKey, Self::SecretKey, Self::EvalKey), Self::Error>;
}

/// Encoding of real vectors into plaintexts.
pub trait SchemeEncoder: SchemeBase {
    /// Encode a vector of reals. The vector may be shorter than the number
    /// of slots; remaining slots encode zero.
    fn encode(&self, values: &[f64]) -> Result<Self::Plaintext, Self::Error>;

    /// Decode a plaintext into one real per slot.
    fn decode(&self, pt: &Self::Plaintext) -> Result<Vec<f64>, Self::Error>;
}

/// Public-key encryption.
pub trait SchemeEncrypter: SchemeBase {
    /// Encrypt a plaintext under a public key.
    fn encrypt<R: RngCore + CryptoRng>(
        &self,
        pt: &Self::Plaintext,
        pk: &Self::PublicKey,
        rng: &mut R,
    ) -> Result<Self::Ciphertext, Self::Error>;
}

/// Decryption.
pub trait SchemeDecrypter: SchemeBase {
    /// Decrypt a ciphertext with a secret key.
    fn decrypt(
        &self,
        ct: &Self::Ciphertext,
        sk: &Self::SecretKey,
    ) -> Result<Self::Plaintext, Self::Error>;
}

/// Byte serialization of keys and ciphertexts.
///
/// The encodings are opaque and defined by the scheme. Deserialization is
/// parametrized by the parameters of the instance it is called on.
pub trait SchemeSerialize: SchemeBase {
    /// Serialize a public key.
    fn public_key_to_bytes(&self, pk: &Self::PublicKey) -> Vec<u8>;

    /// Deserialize a public key.
    fn public_key_from_bytes(&self, bytes: &[u8]) -> Result<Self::PublicKey, Self::Error>;

    /// Serialize a secret key.
    fn secret_key_to_bytes(&self, sk: &Self::SecretKey) -> Vec<u8>;

    /// Deserialize a secret key.
    fn secret_key_from_bytes(&self, bytes: &[u8]) -> Result<Self::SecretKey, Self::Error>;

    /// Serialize an evaluation key.
    fn eval_key_to_bytes(&self, ek: &Self::EvalKey) -> Vec<u8>;

    /// Deserialize an evaluation key.
    fn eval_key_from_bytes(&self, bytes: &[u8]) -> Result<Self::EvalKey, Self::Error>;

    /// Serialize a ciphertext.
    fn ciphertext_to_bytes(&self, ct: &Self::Ciphertext) -> Vec<u8>;

    /// Deserialize a ciphertext.
    fn ciphertext_from_bytes(&self, bytes: &[u8]) -> Result<Self::Ciphertext, Self::Error>;
}

/// A scheme offering every capability, for code that drives all roles.
pub trait HomomorphicScheme:
    SchemeKeygen + SchemeEncoder + SchemeEncrypter + SchemeDecrypter + SchemeSerialize
{
}

impl<T> HomomorphicScheme for T where
    T: SchemeKeygen + SchemeEncoder + SchemeEncrypter + SchemeDecrypter + SchemeSerialize
{
}
