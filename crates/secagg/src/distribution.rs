//! Key distribution: the envelope every persisted blob is wrapped in, the
//! tagged serialization of keys and ciphertexts, and the stores the key
//! generation center hands keys out through.
//!
//! An envelope binds a payload to the scheme, the kind of blob, the tag of the
//! parameters and the identifier of the key set it was produced under. All of
//! these are checked before the scheme parses the payload.

use crate::kgc::{DecryptionKey, PublicKeys};
use crate::proto::secagg::Envelope;
use crate::{ClientId, Error, Parameters, ParametersTag, Result, Scheme};
use prost::Message;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic number opening every envelope ("SAG1").
const MAGIC: u32 = 0x5341_4731;

/// Version of the envelope format.
const VERSION: u32 = 1;

/// Kind of a persisted blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobKind {
    /// A public key.
    PublicKey,
    /// A secret key.
    SecretKey,
    /// An evaluation key.
    EvalKey,
    /// A ciphertext.
    Ciphertext,
}

impl BlobKind {
    const fn code(&self) -> u32 {
        match self {
            BlobKind::PublicKey => 1,
            BlobKind::SecretKey => 2,
            BlobKind::EvalKey => 3,
            BlobKind::Ciphertext => 4,
        }
    }

    fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(BlobKind::PublicKey),
            2 => Some(BlobKind::SecretKey),
            3 => Some(BlobKind::EvalKey),
            4 => Some(BlobKind::Ciphertext),
            _ => None,
        }
    }
}

impl Display for BlobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobKind::PublicKey => f.write_str("public key"),
            BlobKind::SecretKey => f.write_str("secret key"),
            BlobKind::EvalKey => f.write_str("evaluation key"),
            BlobKind::Ciphertext => f.write_str("ciphertext"),
        }
    }
}

/// Kind of a key produced by the key generation center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// The public (encryption) key.
    Public,
    /// The secret (decryption) key.
    Secret,
    /// The evaluation key.
    Eval,
}

impl KeyKind {
    /// All key kinds, in persistence order.
    pub const ALL: [KeyKind; 3] = [KeyKind::Public, KeyKind::Secret, KeyKind::Eval];

    const fn blob(&self) -> BlobKind {
        match self {
            KeyKind::Public => BlobKind::PublicKey,
            KeyKind::Secret => BlobKind::SecretKey,
            KeyKind::Eval => BlobKind::EvalKey,
        }
    }
}

impl Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.blob(), f)
    }
}

/// Identifier of a key set: the first 16 bytes of the SHA-256 digest of the
/// serialized public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId([u8; 16]);

impl KeyId {
    /// Compute the identifier of the key set a serialized public key belongs to.
    pub fn from_public_key_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut id = [0u8; 16];
        id.copy_from_slice(&digest[..16]);
        Self(id)
    }

    /// Returns the bytes of the identifier.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    fn try_from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 16]>::try_from(bytes).ok().map(Self)
    }
}

impl Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

impl Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({self})")
    }
}

/// The parameters and key set a key or ciphertext belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyTag {
    /// Tag of the parameters.
    pub parameters_tag: ParametersTag,
    /// Identifier of the key set.
    pub key_id: KeyId,
}

impl KeyTag {
    /// Describe how `other` differs from `self`, or `None` if they are equal.
    pub fn mismatch(&self, other: &KeyTag) -> Option<String> {
        if self.parameters_tag != other.parameters_tag {
            Some(format!(
                "parameters {} differ from {}",
                other.parameters_tag, self.parameters_tag
            ))
        } else if self.key_id != other.key_id {
            Some(format!("key set {} differs from {}", other.key_id, self.key_id))
        } else {
            None
        }
    }
}

/// A value together with the tag of the key set it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagged<T> {
    value: T,
    tag: KeyTag,
}

impl<T> Tagged<T> {
    /// Attach a tag to a value.
    pub fn new(value: T, tag: KeyTag) -> Self {
        Self { value, tag }
    }

    /// Returns the value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns the tag.
    pub fn tag(&self) -> &KeyTag {
        &self.tag
    }

    /// Returns the value, dropping the tag.
    pub fn into_inner(self) -> T {
        self.value
    }
}

fn seal(par: &Parameters, kind: BlobKind, key_id: &KeyId, payload: Vec<u8>) -> Vec<u8> {
    Envelope {
        magic: MAGIC,
        version: VERSION,
        scheme_id: par.scheme_id().as_str().to_string(),
        kind: kind.code(),
        parameters_tag: par.tag().as_bytes().to_vec(),
        key_id: key_id.as_bytes().to_vec(),
        payload,
    }
    .encode_to_vec()
}

/// Check the envelope of a blob against the expected kind and parameters, and
/// return its tag and payload. The error is a human-readable reason.
fn open(
    bytes: &[u8],
    kind: BlobKind,
    par: &Parameters,
) -> std::result::Result<(KeyTag, Vec<u8>), String> {
    let envelope = Envelope::decode(bytes).map_err(|e| format!("malformed envelope: {e}"))?;
    if envelope.magic != MAGIC {
        return Err(format!("bad magic {:#010x}", envelope.magic));
    }
    if envelope.version != VERSION {
        return Err(format!("unsupported version {}", envelope.version));
    }
    match BlobKind::from_code(envelope.kind) {
        Some(found) if found == kind => {}
        Some(found) => return Err(format!("expected {kind}, found {found}")),
        None => return Err(format!("unknown blob kind {}", envelope.kind)),
    }
    if envelope.scheme_id != par.scheme_id().as_str() {
        return Err(format!(
            "scheme {} does not match {}",
            envelope.scheme_id,
            par.scheme_id()
        ));
    }
    let parameters_tag = ParametersTag::try_from_slice(&envelope.parameters_tag)
        .ok_or_else(|| "malformed parameters tag".to_string())?;
    if parameters_tag != par.tag() {
        return Err(format!(
            "parameters {parameters_tag} do not match {}",
            par.tag()
        ));
    }
    let key_id = KeyId::try_from_slice(&envelope.key_id)
        .ok_or_else(|| "malformed key id".to_string())?;
    Ok((
        KeyTag {
            parameters_tag,
            key_id,
        },
        envelope.payload,
    ))
}

/// Serialize a public key.
pub fn serialize_public_key<S: Scheme>(scheme: &S, pk: &S::PublicKey, tag: &KeyTag) -> Vec<u8> {
    seal(
        scheme.parameters(),
        BlobKind::PublicKey,
        &tag.key_id,
        scheme.public_key_to_bytes(pk),
    )
}

/// Deserialize a public key. The key set identifier recorded in the envelope
/// must be the one of the key itself.
pub fn deserialize_public_key<S: Scheme>(scheme: &S, bytes: &[u8]) -> Result<Tagged<S::PublicKey>> {
    let (tag, payload) = open(bytes, BlobKind::PublicKey, scheme.parameters())
        .map_err(|reason| Error::key_load(KeyKind::Public, reason))?;
    if KeyId::from_public_key_bytes(&payload) != tag.key_id {
        return Err(Error::key_load(
            KeyKind::Public,
            format!("key does not match key set {}", tag.key_id),
        ));
    }
    let pk = scheme
        .public_key_from_bytes(&payload)
        .map_err(|e| Error::key_load(KeyKind::Public, e.to_string()))?;
    Ok(Tagged::new(pk, tag))
}

/// Serialize a secret key.
pub fn serialize_secret_key<S: Scheme>(scheme: &S, sk: &S::SecretKey, tag: &KeyTag) -> Vec<u8> {
    seal(
        scheme.parameters(),
        BlobKind::SecretKey,
        &tag.key_id,
        scheme.secret_key_to_bytes(sk),
    )
}

/// Deserialize a secret key.
pub fn deserialize_secret_key<S: Scheme>(scheme: &S, bytes: &[u8]) -> Result<Tagged<S::SecretKey>> {
    let (tag, payload) = open(bytes, BlobKind::SecretKey, scheme.parameters())
        .map_err(|reason| Error::key_load(KeyKind::Secret, reason))?;
    let sk = scheme
        .secret_key_from_bytes(&payload)
        .map_err(|e| Error::key_load(KeyKind::Secret, e.to_string()))?;
    Ok(Tagged::new(sk, tag))
}

/// Serialize an evaluation key.
pub fn serialize_eval_key<S: Scheme>(scheme: &S, ek: &S::EvalKey, tag: &KeyTag) -> Vec<u8> {
    seal(
        scheme.parameters(),
        BlobKind::EvalKey,
        &tag.key_id,
        scheme.eval_key_to_bytes(ek),
    )
}

/// Deserialize an evaluation key.
pub fn deserialize_eval_key<S: Scheme>(scheme: &S, bytes: &[u8]) -> Result<Tagged<S::EvalKey>> {
    let (tag, payload) = open(bytes, BlobKind::EvalKey, scheme.parameters())
        .map_err(|reason| Error::key_load(KeyKind::Eval, reason))?;
    let ek = scheme
        .eval_key_from_bytes(&payload)
        .map_err(|e| Error::key_load(KeyKind::Eval, e.to_string()))?;
    Ok(Tagged::new(ek, tag))
}

/// Serialize a ciphertext.
pub fn serialize_ciphertext<S: Scheme>(scheme: &S, ct: &S::Ciphertext, tag: &KeyTag) -> Vec<u8> {
    seal(
        scheme.parameters(),
        BlobKind::Ciphertext,
        &tag.key_id,
        scheme.ciphertext_to_bytes(ct),
    )
}

/// Deserialize a ciphertext, read for `client_id` if known.
pub fn deserialize_ciphertext<S: Scheme>(
    scheme: &S,
    client_id: Option<ClientId>,
    bytes: &[u8],
) -> Result<Tagged<S::Ciphertext>> {
    let (tag, payload) = open(bytes, BlobKind::Ciphertext, scheme.parameters())
        .map_err(|reason| Error::ciphertext_load(client_id, reason))?;
    let ct = scheme
        .ciphertext_from_bytes(&payload)
        .map_err(|e| Error::ciphertext_load(client_id, e.to_string()))?;
    Ok(Tagged::new(ct, tag))
}

/// A store the key generation center writes key blobs to, and the other
/// parties read them from.
pub trait KeyStore {
    /// Store the blob of a key, replacing any previous one.
    fn put(&mut self, kind: KeyKind, bytes: &[u8]) -> Result<()>;

    /// Read the blob of a key, or `None` if it was never stored.
    fn get(&self, kind: KeyKind) -> Result<Option<Vec<u8>>>;
}

/// A key store keeping each key in its own file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileKeyStore {
    public_key_file: PathBuf,
    secret_key_file: PathBuf,
    relin_keys_file: PathBuf,
}

impl FileKeyStore {
    /// Create a store over three files.
    pub fn new<P: Into<PathBuf>>(public_key_file: P, secret_key_file: P, relin_keys_file: P) -> Self {
        Self {
            public_key_file: public_key_file.into(),
            secret_key_file: secret_key_file.into(),
            relin_keys_file: relin_keys_file.into(),
        }
    }

    /// Returns the file a key is stored in.
    pub fn path(&self, kind: KeyKind) -> &Path {
        match kind {
            KeyKind::Public => &self.public_key_file,
            KeyKind::Secret => &self.secret_key_file,
            KeyKind::Eval => &self.relin_keys_file,
        }
    }
}

impl KeyStore for FileKeyStore {
    fn put(&mut self, kind: KeyKind, bytes: &[u8]) -> Result<()> {
        let path = self.path(kind);
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        fs::write(path, bytes).map_err(|e| Error::io(path, e))?;
        debug!(%kind, path = %path.display(), len = bytes.len(), "stored key");
        Ok(())
    }

    fn get(&self, kind: KeyKind) -> Result<Option<Vec<u8>>> {
        let path = self.path(kind);
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }
}

/// A key store in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    blobs: HashMap<KeyKind, Vec<u8>>,
}

impl MemoryKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn put(&mut self, kind: KeyKind, bytes: &[u8]) -> Result<()> {
        self.blobs.insert(kind, bytes.to_vec());
        Ok(())
    }

    fn get(&self, kind: KeyKind) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(&kind).cloned())
    }
}

fn fetch<K: KeyStore + ?Sized>(store: &K, kind: KeyKind) -> Result<Vec<u8>> {
    store
        .get(kind)?
        .ok_or_else(|| Error::key_load(kind, "not found in the key store"))
}

/// Load the keys shared with clients and the aggregator. Both keys must
/// belong to the same key set.
pub fn load_public_keys<S: Scheme, K: KeyStore + ?Sized>(
    store: &K,
    scheme: &S,
) -> Result<PublicKeys<S>> {
    let public_key = deserialize_public_key(scheme, &fetch(store, KeyKind::Public)?)?;
    let eval_key = deserialize_eval_key(scheme, &fetch(store, KeyKind::Eval)?)?;
    if let Some(reason) = public_key.tag().mismatch(eval_key.tag()) {
        return Err(Error::key_load(KeyKind::Eval, reason));
    }
    let tag = *public_key.tag();
    Ok(PublicKeys::new(
        public_key.into_inner(),
        eval_key.into_inner(),
        tag,
    ))
}

/// Load the secret key of the decrypting party.
pub fn load_secret_key<S: Scheme, K: KeyStore + ?Sized>(
    store: &K,
    scheme: &S,
) -> Result<DecryptionKey<S>> {
    let secret_key = deserialize_secret_key(scheme, &fetch(store, KeyKind::Secret)?)?;
    let tag = *secret_key.tag();
    Ok(DecryptionKey::new(secret_key.into_inner(), tag))
}

#[cfg(test)]
mod tests {
    use super::{
        deserialize_ciphertext, deserialize_eval_key, deserialize_public_key,
        deserialize_secret_key, load_public_keys, load_secret_key, open, seal,
        serialize_ciphertext, serialize_eval_key, serialize_public_key, serialize_secret_key,
        BlobKind, FileKeyStore, KeyId, KeyKind, KeyStore, MemoryKeyStore, Tagged, MAGIC,
    };
    use crate::proto::secagg::Envelope;
    use crate::{bfv::BfvScheme, kgc, Error, Parameters};
    use prost::Message;
    use rand::rng;
    use secagg_traits::{SchemeBase, SchemeEncoder, SchemeEncrypter};
    use std::{error::Error as StdError, sync::Arc};

    #[test]
    fn envelope() -> Result<(), Box<dyn StdError>> {
        let par = Parameters::small();
        let key_id = KeyId::from_public_key_bytes(b"pk");
        let bytes = seal(&par, BlobKind::EvalKey, &key_id, vec![1, 2, 3]);

        let (tag, payload) = open(&bytes, BlobKind::EvalKey, &par)?;
        assert_eq!(payload, vec![1, 2, 3]);
        assert_eq!(tag.key_id, key_id);
        assert_eq!(tag.parameters_tag, par.tag());

        assert!(open(&bytes, BlobKind::PublicKey, &par)
            .unwrap_err()
            .contains("expected public key, found evaluation key"));
        assert!(open(&bytes, BlobKind::EvalKey, &Parameters::default())
            .unwrap_err()
            .starts_with("parameters"));
        assert!(open(&bytes[..bytes.len() - 2], BlobKind::EvalKey, &par).is_err());

        let mut envelope = Envelope::decode(bytes.as_slice())?;
        envelope.magic = MAGIC + 1;
        assert!(open(&envelope.encode_to_vec(), BlobKind::EvalKey, &par)
            .unwrap_err()
            .starts_with("bad magic"));
        envelope.magic = MAGIC;
        envelope.version = 2;
        assert_eq!(
            open(&envelope.encode_to_vec(), BlobKind::EvalKey, &par).unwrap_err(),
            "unsupported version 2"
        );
        envelope.version = 1;
        envelope.scheme_id = "ckks".to_string();
        assert!(open(&envelope.encode_to_vec(), BlobKind::EvalKey, &par).is_err());
        Ok(())
    }

    #[test]
    fn keys_roundtrip() -> Result<(), Box<dyn StdError>> {
        let mut rng = rng();
        let scheme = BfvScheme::try_new(&Arc::new(Parameters::small()))?;
        let keys = kgc::generate(&scheme, &mut rng)?;
        let tag = *keys.tag();

        let pk = Tagged::new(keys.public_key().clone(), tag);
        let bytes = serialize_public_key(&scheme, keys.public_key(), &tag);
        assert_eq!(deserialize_public_key(&scheme, &bytes)?, pk);

        let ek = Tagged::new(keys.eval_key().clone(), tag);
        let bytes = serialize_eval_key(&scheme, keys.eval_key(), &tag);
        assert_eq!(deserialize_eval_key(&scheme, &bytes)?, ek);

        let bytes = serialize_secret_key(&scheme, keys.secret_key(), &tag);
        let sk = deserialize_secret_key(&scheme, &bytes)?;
        assert_eq!(sk.value(), keys.secret_key());
        assert_eq!(sk.tag(), &tag);

        // A blob of one kind is never accepted as another.
        assert!(matches!(
            deserialize_eval_key(
                &scheme,
                &serialize_public_key(&scheme, keys.public_key(), &tag)
            ),
            Err(Error::KeyLoad {
                kind: KeyKind::Eval,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn public_key_bound_to_key_id() -> Result<(), Box<dyn StdError>> {
        let mut rng = rng();
        let scheme = BfvScheme::try_new(&Arc::new(Parameters::small()))?;
        let first = kgc::generate(&scheme, &mut rng)?;
        let second = kgc::generate(&scheme, &mut rng)?;
        assert_ne!(first.tag(), second.tag());

        let bytes = serialize_public_key(&scheme, first.public_key(), second.tag());
        assert!(matches!(
            deserialize_public_key(&scheme, &bytes),
            Err(Error::KeyLoad {
                kind: KeyKind::Public,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn ciphertext_under_other_parameters() -> Result<(), Box<dyn StdError>> {
        let mut rng = rng();
        let scheme = BfvScheme::try_new(&Arc::new(Parameters::small()))?;
        let keys = kgc::generate(&scheme, &mut rng)?;
        let pt = scheme.encode(&[1.5])?;
        let ct = scheme.encrypt(&pt, keys.public_key(), &mut rng)?;
        let bytes = serialize_ciphertext(&scheme, &ct, keys.tag());
        assert_eq!(deserialize_ciphertext(&scheme, None, &bytes)?.tag(), keys.tag());

        let other = BfvScheme::try_new(&Arc::new(Parameters::default()))?;
        assert!(matches!(
            deserialize_ciphertext(&other, None, &bytes),
            Err(Error::CiphertextLoad { .. })
        ));
        Ok(())
    }

    #[test]
    fn stores() -> Result<(), Box<dyn StdError>> {
        let mut rng = rng();
        let scheme = BfvScheme::try_new(&Arc::new(Parameters::small()))?;
        let keys = kgc::generate(&scheme, &mut rng)?;

        let dir = tempfile::tempdir()?;
        let mut file_store = FileKeyStore::new(
            dir.path().join("keys/public_key.seal"),
            dir.path().join("keys/secret_key.seal"),
            dir.path().join("keys/relin_keys.seal"),
        );
        let mut memory_store = MemoryKeyStore::new();
        assert!(matches!(
            load_public_keys(&memory_store, &scheme),
            Err(Error::KeyLoad { .. })
        ));

        for store in [&mut file_store as &mut dyn KeyStore, &mut memory_store] {
            assert_eq!(store.get(KeyKind::Public)?, None);
            kgc::persist(&scheme, &keys, store)?;
            let public = load_public_keys(&*store, &scheme)?;
            assert_eq!(public.tag(), keys.tag());
            assert_eq!(public.public_key(), keys.public_key());
            let secret = load_secret_key(&*store, &scheme)?;
            assert_eq!(secret.tag(), keys.tag());
        }
        Ok(())
    }
}
