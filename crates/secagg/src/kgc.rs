//! The key generation center: one-time generation of a key set, and its
//! persistence to a key store.

use crate::distribution::{serialize_eval_key, serialize_public_key, serialize_secret_key};
use crate::metrics::{timed, Stage, StageTimings};
use crate::{Error, KeyId, KeyKind, KeyStore, KeyTag, Parameters, Result, Scheme};
use rand::{CryptoRng, RngCore};
use std::fmt::{self, Debug};
use std::sync::Arc;
use tracing::info;

/// The keys shared with clients and the aggregator.
pub struct PublicKeys<S: Scheme> {
    public_key: S::PublicKey,
    eval_key: S::EvalKey,
    tag: KeyTag,
}

impl<S: Scheme> PublicKeys<S> {
    pub(crate) fn new(public_key: S::PublicKey, eval_key: S::EvalKey, tag: KeyTag) -> Self {
        Self {
            public_key,
            eval_key,
            tag,
        }
    }

    /// Returns the public key.
    pub fn public_key(&self) -> &S::PublicKey {
        &self.public_key
    }

    /// Returns the evaluation key.
    pub fn eval_key(&self) -> &S::EvalKey {
        &self.eval_key
    }

    /// Returns the tag of the key set.
    pub fn tag(&self) -> &KeyTag {
        &self.tag
    }
}

impl<S: Scheme> Clone for PublicKeys<S> {
    fn clone(&self) -> Self {
        Self::new(self.public_key.clone(), self.eval_key.clone(), self.tag)
    }
}

impl<S: Scheme> Debug for PublicKeys<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeys").field("tag", &self.tag).finish()
    }
}

/// The secret key, held by the decrypting party only.
pub struct DecryptionKey<S: Scheme> {
    secret_key: S::SecretKey,
    tag: KeyTag,
}

impl<S: Scheme> DecryptionKey<S> {
    pub(crate) fn new(secret_key: S::SecretKey, tag: KeyTag) -> Self {
        Self { secret_key, tag }
    }

    /// Returns the secret key.
    pub fn secret_key(&self) -> &S::SecretKey {
        &self.secret_key
    }

    /// Returns the tag of the key set.
    pub fn tag(&self) -> &KeyTag {
        &self.tag
    }
}

impl<S: Scheme> Debug for DecryptionKey<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionKey")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// A complete key set, produced by a single key generation.
pub struct KeyMaterial<S: Scheme> {
    public: PublicKeys<S>,
    secret: DecryptionKey<S>,
}

impl<S: Scheme> KeyMaterial<S> {
    /// Reassemble a key set from its parts. Parts of different key sets are
    /// rejected.
    pub fn from_parts(public: PublicKeys<S>, secret: DecryptionKey<S>) -> Result<Self> {
        if let Some(reason) = public.tag.mismatch(&secret.tag) {
            return Err(Error::key_load(KeyKind::Secret, reason));
        }
        Ok(Self { public, secret })
    }

    /// Split the key set into the part that is shared and the part that is
    /// kept by the decrypting party.
    pub fn split(self) -> (PublicKeys<S>, DecryptionKey<S>) {
        (self.public, self.secret)
    }

    /// Returns the public key.
    pub fn public_key(&self) -> &S::PublicKey {
        &self.public.public_key
    }

    /// Returns the secret key.
    pub fn secret_key(&self) -> &S::SecretKey {
        &self.secret.secret_key
    }

    /// Returns the evaluation key.
    pub fn eval_key(&self) -> &S::EvalKey {
        &self.public.eval_key
    }

    /// Returns the shared keys.
    pub fn public_keys(&self) -> &PublicKeys<S> {
        &self.public
    }

    /// Returns the decryption key.
    pub fn decryption_key(&self) -> &DecryptionKey<S> {
        &self.secret
    }

    /// Returns the identifier of the key set.
    pub fn key_id(&self) -> &KeyId {
        &self.public.tag.key_id
    }

    /// Returns the tag of the key set.
    pub fn tag(&self) -> &KeyTag {
        &self.public.tag
    }
}

impl<S: Scheme> Debug for KeyMaterial<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("tag", self.tag())
            .finish_non_exhaustive()
    }
}

/// Generate a key set. The parameters are validated before any key is
/// produced; nothing is returned on failure.
pub fn generate<S: Scheme, R: RngCore + CryptoRng>(scheme: &S, rng: &mut R) -> Result<KeyMaterial<S>> {
    scheme.parameters().validate()?;
    let (public_key, secret_key, eval_key) = scheme.keygen(rng)?;
    let tag = KeyTag {
        parameters_tag: scheme.parameters().tag(),
        key_id: KeyId::from_public_key_bytes(&scheme.public_key_to_bytes(&public_key)),
    };
    Ok(KeyMaterial {
        public: PublicKeys::new(public_key, eval_key, tag),
        secret: DecryptionKey::new(secret_key, tag),
    })
}

/// Write the three keys of a key set to a store, replacing existing ones.
pub fn persist<S: Scheme, K: KeyStore + ?Sized>(
    scheme: &S,
    keys: &KeyMaterial<S>,
    store: &mut K,
) -> Result<()> {
    let tag = keys.tag();
    for kind in KeyKind::ALL {
        let bytes = match kind {
            KeyKind::Public => serialize_public_key(scheme, keys.public_key(), tag),
            KeyKind::Secret => serialize_secret_key(scheme, keys.secret_key(), tag),
            KeyKind::Eval => serialize_eval_key(scheme, keys.eval_key(), tag),
        };
        store.put(kind, &bytes)?;
    }
    info!(key_id = %tag.key_id, "persisted key set");
    Ok(())
}

/// Lifecycle of the key generation center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KgcStatus {
    /// No key was generated yet.
    NotGenerated,
    /// A key set was generated but not persisted.
    Generated,
    /// The key set was persisted at least once.
    Persisted,
}

/// The key generation center. Generates one key set per instance.
pub struct KeyGenerationCenter<S: Scheme> {
    scheme: S,
    keys: Option<KeyMaterial<S>>,
    status: KgcStatus,
    timings: StageTimings,
}

impl<S: Scheme> KeyGenerationCenter<S> {
    /// Create a key generation center for a parameter set.
    pub fn new(parameters: &Arc<Parameters>) -> Result<Self> {
        parameters.validate()?;
        Ok(Self {
            scheme: S::try_new(parameters)?,
            keys: None,
            status: KgcStatus::NotGenerated,
            timings: StageTimings::new(),
        })
    }

    /// Returns the scheme instance.
    pub fn scheme(&self) -> &S {
        &self.scheme
    }

    /// Returns the lifecycle state.
    pub fn status(&self) -> KgcStatus {
        self.status
    }

    /// Returns the key set, once generated.
    pub fn keys(&self) -> Option<&KeyMaterial<S>> {
        self.keys.as_ref()
    }

    /// Returns the time spent generating keys.
    pub fn timings(&self) -> &StageTimings {
        &self.timings
    }

    /// Generate the key set. Fails if a key set was already generated.
    pub fn generate<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<&KeyMaterial<S>> {
        if self.status != KgcStatus::NotGenerated {
            return Err(Error::InvalidState(
                "a key set was already generated".to_string(),
            ));
        }
        let scheme = &self.scheme;
        let keys = timed(&mut self.timings, Stage::KeyGeneration, || {
            generate(scheme, rng)
        })?;
        info!(key_id = %keys.key_id(), "generated key set");
        self.status = KgcStatus::Generated;
        Ok(self.keys.insert(keys))
    }

    /// Persist the key set. Can be repeated, and overwrites the store.
    pub fn persist<K: KeyStore + ?Sized>(&mut self, store: &mut K) -> Result<()> {
        let keys = self
            .keys
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no key set was generated".to_string()))?;
        persist(&self.scheme, keys, store)?;
        self.status = KgcStatus::Persisted;
        Ok(())
    }

    /// Returns the key set, consuming the center.
    pub fn into_keys(self) -> Option<KeyMaterial<S>> {
        self.keys
    }
}
