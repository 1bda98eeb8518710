//! Homomorphic aggregation of the contributions.
//!
//! Every ciphertext must carry the tag of the evaluation key it is folded
//! with. Addition of fresh ciphertexts is exact modular addition of their
//! polynomials, so the decrypted sum does not depend on the fold order.

use crate::kgc::PublicKeys;
use crate::metrics::{timed, Stage, StageTimings};
use crate::{ClientContribution, ClientId, Error, KeyTag, Result, Scheme};
use itertools::Itertools;
use rayon::prelude::*;
use tracing::info;

/// The encrypted sum of the contributions.
///
/// Only [`aggregate_with`] builds it, from at least one contribution, so the
/// contributor count is never zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationResult<C> {
    ciphertext: C,
    contributors: Vec<ClientId>,
    tag: KeyTag,
}

impl<C> AggregationResult<C> {
    /// Returns the encrypted sum.
    pub fn ciphertext(&self) -> &C {
        &self.ciphertext
    }

    /// Returns the number of contributions folded in, at least one.
    pub fn contributor_count(&self) -> usize {
        self.contributors.len()
    }

    /// Returns the clients whose contributions were folded in, in ascending
    /// order.
    pub fn contributors(&self) -> &[ClientId] {
        &self.contributors
    }

    /// Returns the tag of the key set the sum is encrypted under.
    pub fn tag(&self) -> &KeyTag {
        &self.tag
    }
}

/// How contributions are folded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FoldStrategy {
    /// Left fold, in client order.
    #[default]
    Sequential,
    /// Parallel pairwise reduction.
    Tree,
}

/// Fold the contributions with a left fold starting from the first one.
pub fn aggregate<S>(
    scheme: &S,
    contributions: &[ClientContribution<S::Ciphertext>],
    keys: &PublicKeys<S>,
) -> Result<AggregationResult<S::Ciphertext>>
where
    S: Scheme + Sync,
    S::Ciphertext: Send + Sync,
{
    aggregate_with(scheme, contributions, keys, FoldStrategy::Sequential)
}

/// Fold the contributions with a given strategy. All contributions are
/// checked against the key set before any addition; a mismatch aborts the
/// whole aggregation. So does a ciphertext the scheme refuses to add, and
/// more contributions than the parameters allow to sum.
pub fn aggregate_with<S>(
    scheme: &S,
    contributions: &[ClientContribution<S::Ciphertext>],
    keys: &PublicKeys<S>,
    strategy: FoldStrategy,
) -> Result<AggregationResult<S::Ciphertext>>
where
    S: Scheme + Sync,
    S::Ciphertext: Send + Sync,
{
    let (first, rest) = contributions
        .split_first()
        .ok_or(Error::NoContributions { expected: 0 })?;
    if let Some(c) = contributions.iter().find(|c| c.tag() != keys.tag()) {
        let reason = keys.tag().mismatch(c.tag()).unwrap_or_default();
        return Err(Error::incompatible(c.client_id(), reason));
    }
    let max = scheme.parameters().max_contributors();
    if contributions.len() > max {
        return Err(Error::TooManyContributions {
            count: contributions.len(),
            max,
        });
    }

    let ciphertext = match strategy {
        FoldStrategy::Sequential => fold_sequential(scheme, first, rest)?,
        FoldStrategy::Tree => match contributions
            .par_iter()
            .map(|c| Ok::<_, Error>(c.ciphertext().clone()))
            .try_reduce_with(|a, b| scheme.add(&a, &b))
        {
            Some(Ok(ciphertext)) => ciphertext,
            // Replay in order to name the contribution that cannot be added.
            _ => fold_sequential(scheme, first, rest)?,
        },
    };

    let contributors = contributions
        .iter()
        .map(|c| c.client_id())
        .sorted()
        .collect_vec();
    info!(
        contributors = contributors.len(),
        ?strategy,
        "aggregated contributions"
    );
    Ok(AggregationResult {
        ciphertext,
        contributors,
        tag: *keys.tag(),
    })
}

/// Left fold; an addition that fails is blamed on the contribution being
/// added.
fn fold_sequential<S: Scheme>(
    scheme: &S,
    first: &ClientContribution<S::Ciphertext>,
    rest: &[ClientContribution<S::Ciphertext>],
) -> Result<S::Ciphertext> {
    rest.iter().try_fold(first.ciphertext().clone(), |acc, c| {
        scheme
            .add(&acc, c.ciphertext())
            .map_err(|e| Error::incompatible(c.client_id(), e.to_string()))
    })
}

/// Fold the contributions and record the time spent.
pub fn aggregate_timed<S>(
    scheme: &S,
    contributions: &[ClientContribution<S::Ciphertext>],
    keys: &PublicKeys<S>,
    strategy: FoldStrategy,
    timings: &mut StageTimings,
) -> Result<AggregationResult<S::Ciphertext>>
where
    S: Scheme + Sync,
    S::Ciphertext: Send + Sync,
{
    timed(timings, Stage::Computation, || {
        aggregate_with(scheme, contributions, keys, strategy)
    })
}
