//! Ingestion of the ciphertexts submitted by clients.
//!
//! One ciphertext is expected per client. Absent or unreadable sources are
//! skipped with a warning; ingestion only fails when nothing was loaded.

use crate::distribution::deserialize_ciphertext;
use crate::{ClientContribution, ClientId, Error, Result, Scheme};
use itertools::Itertools;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Extension of ciphertext files when none is configured.
pub const DEFAULT_EXTENSION: &str = ".ct";

/// Resolves the serialized ciphertext of a client.
pub trait SourceResolver: Sync {
    /// Returns the bytes submitted by a client, or `None` if the client did
    /// not submit anything.
    fn resolve(&self, id: ClientId) -> io::Result<Option<Vec<u8>>>;
}

impl<F> SourceResolver for F
where
    F: Fn(ClientId) -> io::Result<Option<Vec<u8>>> + Sync,
{
    fn resolve(&self, id: ClientId) -> io::Result<Option<Vec<u8>>> {
        self(id)
    }
}

/// Resolves ciphertexts from files named `<prefix><id><extension>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSourceResolver {
    prefix: String,
    extension: String,
}

impl FileSourceResolver {
    /// Create a resolver with the default extension.
    pub fn new<P: Into<String>>(prefix: P) -> Self {
        Self::with_extension(prefix, DEFAULT_EXTENSION)
    }

    /// Create a resolver with a custom extension.
    pub fn with_extension<P: Into<String>, E: Into<String>>(prefix: P, extension: E) -> Self {
        Self {
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    /// Returns the path of the ciphertext of a client.
    pub fn path(&self, id: ClientId) -> PathBuf {
        PathBuf::from(format!("{}{}{}", self.prefix, id, self.extension))
    }
}

impl SourceResolver for FileSourceResolver {
    fn resolve(&self, id: ClientId) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path(id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Resolves ciphertexts from memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySourceResolver {
    sources: HashMap<ClientId, Vec<u8>>,
}

impl MemorySourceResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the submission of a client.
    pub fn insert(&mut self, id: ClientId, bytes: Vec<u8>) {
        self.sources.insert(id, bytes);
    }

    /// Remove the submission of a client.
    pub fn remove(&mut self, id: ClientId) -> Option<Vec<u8>> {
        self.sources.remove(&id)
    }
}

impl SourceResolver for MemorySourceResolver {
    fn resolve(&self, id: ClientId) -> io::Result<Option<Vec<u8>>> {
        Ok(self.sources.get(&id).cloned())
    }
}

/// Why a client was skipped.
#[derive(Debug)]
pub enum SkipReason {
    /// The client did not submit a ciphertext.
    Missing,
    /// The submission could not be read or deserialized.
    Unreadable(Error),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Missing => f.write_str("missing"),
            SkipReason::Unreadable(e) => write!(f, "unreadable: {e}"),
        }
    }
}

/// A client whose contribution was not ingested.
#[derive(Debug)]
pub struct SkippedClient {
    /// The client.
    pub client_id: ClientId,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// The outcome of ingestion.
#[derive(Debug)]
pub struct Ingested<C> {
    /// The contributions, in ascending client order.
    pub contributions: Vec<ClientContribution<C>>,
    /// The skipped clients, in ascending client order.
    pub skipped: Vec<SkippedClient>,
}

fn load<S: Scheme, R: SourceResolver + ?Sized>(
    scheme: &S,
    resolver: &R,
    id: ClientId,
) -> std::result::Result<ClientContribution<S::Ciphertext>, SkipReason> {
    let bytes = resolver
        .resolve(id)
        .map_err(|e| SkipReason::Unreadable(Error::ciphertext_load(Some(id), e.to_string())))?
        .ok_or(SkipReason::Missing)?;
    let ct = deserialize_ciphertext(scheme, Some(id), &bytes).map_err(SkipReason::Unreadable)?;
    let tag = *ct.tag();
    Ok(ClientContribution::new(id, ct.into_inner(), tag))
}

/// Load the ciphertext of every expected client.
///
/// The identifiers are sorted and deduplicated. Sources are read and
/// deserialized in parallel; the outcome is reported in ascending order.
pub fn ingest<S, R, I>(scheme: &S, expected_ids: I, resolver: &R) -> Result<Ingested<S::Ciphertext>>
where
    S: Scheme + Sync,
    S::Ciphertext: Send,
    R: SourceResolver + ?Sized,
    I: IntoIterator<Item = ClientId>,
{
    let ids = expected_ids.into_iter().sorted().dedup().collect_vec();
    let expected = ids.len();

    let outcomes = ids
        .par_iter()
        .map(|id| (*id, load(scheme, resolver, *id)))
        .collect::<Vec<_>>();

    let mut contributions = Vec::with_capacity(expected);
    let mut skipped = vec![];
    for (client_id, outcome) in outcomes {
        match outcome {
            Ok(contribution) => {
                debug!(%client_id, "loaded contribution");
                contributions.push(contribution)
            }
            Err(reason) => {
                warn!(%client_id, %reason, "skipping client");
                skipped.push(SkippedClient { client_id, reason })
            }
        }
    }

    if contributions.is_empty() {
        return Err(Error::NoContributions { expected });
    }
    info!(
        loaded = contributions.len(),
        skipped = skipped.len(),
        expected,
        "ingested contributions"
    );
    Ok(Ingested {
        contributions,
        skipped,
    })
}
