//! Decryption and decoding of the aggregate.
//!
//! Slot 0 of the decoded plaintext holds the total; the remaining slots are
//! padding and are ignored.

use crate::kgc::DecryptionKey;
use crate::metrics::{timed, Stage, StageTimings};
use crate::{AggregationResult, Error, Result, Scheme};
use serde::Serialize;
use tracing::info;

/// The decoded statistics of one aggregation round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecodedResult {
    /// Sum of the readings.
    pub total: f64,
    /// Mean of the readings, `total / contributor_count`.
    pub average: f64,
    /// Number of readings in the sum.
    pub contributor_count: usize,
}

/// Decrypt and decode an aggregate.
///
/// The decryption key must belong to the key set the aggregate is encrypted
/// under; decrypting with any other key would silently return noise, so it
/// is rejected upfront.
pub fn finalize<S: Scheme>(
    scheme: &S,
    result: &AggregationResult<S::Ciphertext>,
    key: &DecryptionKey<S>,
) -> Result<DecodedResult> {
    if let Some(reason) = result.tag().mismatch(key.tag()) {
        return Err(Error::Decryption(format!("wrong decryption key: {reason}")));
    }
    // Never zero: aggregation refuses an empty set.
    let contributor_count = result.contributor_count();

    let pt = scheme
        .decrypt(result.ciphertext(), key.secret_key())
        .map_err(|e| Error::Decryption(e.to_string()))?;
    let slots = scheme
        .decode(&pt)
        .map_err(|e| Error::Decryption(e.to_string()))?;
    let total = *slots
        .first()
        .ok_or_else(|| Error::Decryption("no slot in the plaintext".to_string()))?;

    let decoded = DecodedResult {
        total,
        average: total / contributor_count as f64,
        contributor_count,
    };
    info!(contributors = contributor_count, "decrypted aggregate");
    Ok(decoded)
}

/// Decrypt and decode an aggregate, and record the time spent.
pub fn finalize_timed<S: Scheme>(
    scheme: &S,
    result: &AggregationResult<S::Ciphertext>,
    key: &DecryptionKey<S>,
    timings: &mut StageTimings,
) -> Result<DecodedResult> {
    timed(timings, Stage::Decryption, || finalize(scheme, result, key))
}
