//! Client side: encryption of meter readings under the shared public key.

use crate::distribution::serialize_ciphertext;
use crate::ingest::FileSourceResolver;
use crate::kgc::PublicKeys;
use crate::metrics::{timed, Stage, StageTimings};
use crate::{ClientId, Error, Result, Scheme};
use rand::{CryptoRng, Rng, RngCore};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Range of a simulated hourly consumption, in kWh.
pub const READING_RANGE: std::ops::Range<f64> = 0.5..5.0;

/// Draw a simulated meter reading.
pub fn simulated_reading<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.random_range(READING_RANGE)
}

/// Encrypt a vector of readings, and serialize the ciphertext. The first
/// reading lands in the slot that is aggregated.
pub fn encrypt_readings<S: Scheme, R: RngCore + CryptoRng>(
    scheme: &S,
    keys: &PublicKeys<S>,
    readings: &[f64],
    rng: &mut R,
    timings: &mut StageTimings,
) -> Result<Vec<u8>> {
    let ct = timed(timings, Stage::Encryption, || {
        let pt = scheme.encode(readings)?;
        scheme.encrypt(&pt, keys.public_key(), rng)
    })?;
    Ok(serialize_ciphertext(scheme, &ct, keys.tag()))
}

/// Encrypt a single reading, and serialize the ciphertext.
pub fn encrypt_reading<S: Scheme, R: RngCore + CryptoRng>(
    scheme: &S,
    keys: &PublicKeys<S>,
    reading: f64,
    rng: &mut R,
) -> Result<Vec<u8>> {
    encrypt_readings(scheme, keys, &[reading], rng, &mut StageTimings::new())
}

/// Write the contribution of a client where the resolver will look for it.
pub fn write_contribution(
    resolver: &FileSourceResolver,
    client_id: ClientId,
    bytes: &[u8],
) -> Result<PathBuf> {
    let path = resolver.path(client_id);
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    fs::write(&path, bytes).map_err(|e| Error::io(&path, e))?;
    info!(%client_id, path = %path.display(), size = bytes.len(), "wrote contribution");
    Ok(path)
}
