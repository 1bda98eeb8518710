//! The roles of an aggregation round, and a driver running a whole round
//! from a configuration.
//!
//! The [`Aggregator`] only ever holds the shared keys; the secret key lives
//! in the [`Decryptor`].

use crate::aggregate::{aggregate_timed, AggregationResult, FoldStrategy};
use crate::config::AggregationConfig;
use crate::decode::{finalize_timed, DecodedResult};
use crate::distribution::{load_public_keys, load_secret_key};
use crate::ingest::{ingest, SkippedClient, SourceResolver};
use crate::kgc::{DecryptionKey, PublicKeys};
use crate::metrics::{timed, Stage, StageTimings};
use crate::{ClientId, KeyStore, Parameters, Result, Scheme};
use std::sync::Arc;
use tracing::info;

/// The untrusted party folding the contributions.
#[derive(Debug)]
pub struct Aggregator<S: Scheme> {
    scheme: S,
    keys: PublicKeys<S>,
    strategy: FoldStrategy,
}

/// The encrypted outcome of the aggregator's work.
#[derive(Debug)]
pub struct Aggregated<C> {
    /// The encrypted sum.
    pub result: AggregationResult<C>,
    /// Clients whose contribution was not folded in.
    pub skipped: Vec<SkippedClient>,
}

impl<S> Aggregator<S>
where
    S: Scheme + Sync,
    S::Ciphertext: Send + Sync,
{
    /// Create an aggregator from the shared keys.
    pub fn new(scheme: S, keys: PublicKeys<S>) -> Self {
        Self {
            scheme,
            keys,
            strategy: FoldStrategy::default(),
        }
    }

    /// Create an aggregator loading the shared keys from a store.
    pub fn from_store<K: KeyStore + ?Sized>(parameters: &Arc<Parameters>, store: &K) -> Result<Self> {
        let scheme = S::try_new(parameters)?;
        let keys = load_public_keys(store, &scheme)?;
        Ok(Self::new(scheme, keys))
    }

    /// Set the fold strategy.
    pub fn with_strategy(mut self, strategy: FoldStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Returns the scheme instance.
    pub fn scheme(&self) -> &S {
        &self.scheme
    }

    /// Returns the shared keys.
    pub fn keys(&self) -> &PublicKeys<S> {
        &self.keys
    }

    /// Ingest the contributions of the expected clients and fold them.
    pub fn run<R, I>(
        &self,
        expected_ids: I,
        resolver: &R,
        timings: &mut StageTimings,
    ) -> Result<Aggregated<S::Ciphertext>>
    where
        R: SourceResolver + ?Sized,
        I: IntoIterator<Item = ClientId>,
    {
        let ingested = timed(timings, Stage::Deserialization, || {
            ingest(&self.scheme, expected_ids, resolver)
        })?;
        let result = aggregate_timed(
            &self.scheme,
            &ingested.contributions,
            &self.keys,
            self.strategy,
            timings,
        )?;
        Ok(Aggregated {
            result,
            skipped: ingested.skipped,
        })
    }
}

/// The party holding the secret key.
#[derive(Debug)]
pub struct Decryptor<S: Scheme> {
    scheme: S,
    key: DecryptionKey<S>,
}

impl<S: Scheme> Decryptor<S> {
    /// Create a decryptor from the secret key.
    pub fn new(scheme: S, key: DecryptionKey<S>) -> Self {
        Self { scheme, key }
    }

    /// Create a decryptor loading the secret key from a store.
    pub fn from_store<K: KeyStore + ?Sized>(parameters: &Arc<Parameters>, store: &K) -> Result<Self> {
        let scheme = S::try_new(parameters)?;
        let key = load_secret_key(store, &scheme)?;
        Ok(Self::new(scheme, key))
    }

    /// Decrypt and decode an aggregate.
    pub fn finalize(
        &self,
        result: &AggregationResult<S::Ciphertext>,
        timings: &mut StageTimings,
    ) -> Result<DecodedResult> {
        finalize_timed(&self.scheme, result, &self.key, timings)
    }
}

/// The outcome of a round.
#[derive(Debug)]
pub struct RoundReport {
    /// The decoded statistics.
    pub result: DecodedResult,
    /// The clients whose contribution was folded in.
    pub contributors: Vec<ClientId>,
    /// The clients that were skipped, with the reason.
    pub skipped: Vec<SkippedClient>,
    /// Duration of each stage.
    pub timings: StageTimings,
}

/// Run a whole round from a configuration: load the keys from the key files,
/// ingest and fold the contributions, and decrypt the total.
pub fn run_round<S>(config: &AggregationConfig, strategy: FoldStrategy) -> Result<RoundReport>
where
    S: Scheme + Sync,
    S::Ciphertext: Send + Sync,
{
    let parameters = Arc::new(config.parameters()?);
    let store = config.key_store();
    let aggregator = Aggregator::<S>::from_store(&parameters, &store)?.with_strategy(strategy);
    let decryptor = Decryptor::<S>::from_store(&parameters, &store)?;
    info!(
        expected = config.num_clients,
        key_id = %aggregator.keys().tag().key_id,
        "keys loaded"
    );

    let mut timings = StageTimings::new();
    let aggregated = aggregator.run(
        config.expected_ids()?,
        &config.source_resolver(),
        &mut timings,
    )?;
    let result = decryptor.finalize(&aggregated.result, &mut timings)?;
    Ok(RoundReport {
        result,
        contributors: aggregated.result.contributors().to_vec(),
        skipped: aggregated.skipped,
        timings,
    })
}
