//! Client identifiers and the encrypted contributions they submit.

use crate::{Error, KeyTag, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::num::NonZeroU32;
use std::str::FromStr;

/// Identifier of a client. Identifiers are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct ClientId(NonZeroU32);

impl ClientId {
    /// Create a client identifier, rejecting zero and values above `u32::MAX`.
    pub fn new(id: u64) -> Result<Self> {
        u32::try_from(id)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(Error::InvalidClientId(id))
    }

    /// Returns the identifier as an integer.
    pub const fn get(&self) -> u32 {
        self.0.get()
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for ClientId {
    type Error = Error;

    fn try_from(id: u64) -> Result<Self> {
        Self::new(id)
    }
}

impl From<ClientId> for u64 {
    fn from(id: ClientId) -> Self {
        id.get() as u64
    }
}

impl FromStr for ClientId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id = s
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::Config(format!("Invalid client id: {s}")))?;
        Self::new(id)
    }
}

/// The encrypted reading of one client, with the tag of the key set it was
/// encrypted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContribution<C> {
    client_id: ClientId,
    ciphertext: C,
    tag: KeyTag,
}

impl<C> ClientContribution<C> {
    /// Create a contribution.
    pub fn new(client_id: ClientId, ciphertext: C, tag: KeyTag) -> Self {
        Self {
            client_id,
            ciphertext,
            tag,
        }
    }

    /// Returns the identifier of the client.
    pub const fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Returns the ciphertext.
    pub fn ciphertext(&self) -> &C {
        &self.ciphertext
    }

    /// Returns the tag of the key set the ciphertext was encrypted under.
    pub fn tag(&self) -> &KeyTag {
        &self.tag
    }

    /// Returns the ciphertext, dropping the metadata.
    pub fn into_ciphertext(self) -> C {
        self.ciphertext
    }
}
