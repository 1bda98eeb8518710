//! Aggregation rounds over BFV, from key generation to the decoded average.

use rand::rng;
use secagg::bfv::BfvScheme;
use secagg::client::{encrypt_reading, write_contribution};
use secagg::config::AggregationConfig;
use secagg::ingest::SkipReason;
use secagg::kgc::KgcStatus;
use secagg::metrics::{Stage, StageTimings};
use secagg::pipeline::{run_round, Aggregator, Decryptor};
use secagg::{
    ClientId, DecodedResult, Error, FoldStrategy, KeyGenerationCenter, KeyKind, KeyStore, MemoryKeyStore,
    MemorySourceResolver, Parameters, ParametersBuilder,
};
use std::{error::Error as StdError, fs, sync::Arc};

fn ids(range: std::ops::RangeInclusive<u64>) -> Result<Vec<ClientId>, Error> {
    range.map(ClientId::new).collect()
}

#[test]
fn three_meters() -> Result<(), Box<dyn StdError>> {
    let mut rng = rng();
    let parameters = Arc::new(Parameters::small());
    let mut kgc = KeyGenerationCenter::<BfvScheme>::new(&parameters)?;
    let mut store = MemoryKeyStore::new();
    kgc.generate(&mut rng)?;
    kgc.persist(&mut store)?;
    assert_eq!(kgc.status(), KgcStatus::Persisted);

    let aggregator = Aggregator::<BfvScheme>::from_store(&parameters, &store)?;
    let mut resolver = MemorySourceResolver::new();
    for (id, reading) in ids(1..=3)?.into_iter().zip([5.0, 7.0, 9.0]) {
        let bytes = encrypt_reading(aggregator.scheme(), aggregator.keys(), reading, &mut rng)?;
        resolver.insert(id, bytes);
    }

    let mut timings = StageTimings::new();
    let aggregated = aggregator.run(ids(1..=3)?, &resolver, &mut timings)?;
    assert!(aggregated.skipped.is_empty());
    assert_eq!(aggregated.result.contributor_count(), 3);

    let decryptor = Decryptor::<BfvScheme>::from_store(&parameters, &store)?;
    let decoded = decryptor.finalize(&aggregated.result, &mut timings)?;
    assert_eq!(decoded.total, 21.0);
    assert_eq!(decoded.average, 7.0);
    assert_eq!(decoded.contributor_count, 3);

    for stage in [Stage::Deserialization, Stage::Computation, Stage::Decryption] {
        assert!(timings.get(stage).is_some());
    }
    Ok(())
}

/// Generate keys, encrypt one reading per client, aggregate and decrypt.
fn full_round(parameters: &Arc<Parameters>, readings: &[f64]) -> Result<DecodedResult, Box<dyn StdError>> {
    let mut rng = rng();
    let mut kgc = KeyGenerationCenter::<BfvScheme>::new(parameters)?;
    let mut store = MemoryKeyStore::new();
    kgc.generate(&mut rng)?;
    kgc.persist(&mut store)?;

    let aggregator = Aggregator::<BfvScheme>::from_store(parameters, &store)?;
    let expected = ids(1..=readings.len() as u64)?;
    let mut resolver = MemorySourceResolver::new();
    for (id, reading) in expected.iter().zip(readings) {
        let bytes = encrypt_reading(aggregator.scheme(), aggregator.keys(), *reading, &mut rng)?;
        resolver.insert(*id, bytes);
    }
    let mut timings = StageTimings::new();
    let aggregated = aggregator.run(expected, &resolver, &mut timings)?;
    let decryptor = Decryptor::<BfvScheme>::from_store(parameters, &store)?;
    Ok(decryptor.finalize(&aggregated.result, &mut timings)?)
}

#[test]
fn default_parameters_round() -> Result<(), Box<dyn StdError>> {
    let parameters = Arc::new(Parameters::default());
    let decoded = full_round(&parameters, &[1.25, -2.5, 1000.0, 0.001])?;
    assert!((decoded.total - 998.751).abs() < 1e-8);
    assert_eq!(decoded.contributor_count, 4);
    Ok(())
}

#[test]
fn deployment_config_round() -> Result<(), Box<dyn StdError>> {
    let config: AggregationConfig = include_str!("../examples/config.json").parse()?;
    let parameters = Arc::new(config.parameters()?);
    assert_eq!(parameters.max_contributors(), config.num_clients as usize);

    let readings = (1..=config.num_clients)
        .map(|i| i as f64 * 0.5 + 0.25)
        .collect::<Vec<_>>();
    let decoded = full_round(&parameters, &readings)?;
    assert_eq!(decoded.total, 30.0);
    assert_eq!(decoded.average, 3.0);
    assert_eq!(decoded.contributor_count, 10);
    Ok(())
}

#[test]
fn readings_that_would_wrap() -> Result<(), Box<dyn StdError>> {
    let mut rng = rng();
    let parameters = Arc::new(Parameters::small());
    let mut kgc = KeyGenerationCenter::<BfvScheme>::new(&parameters)?;
    kgc.generate(&mut rng)?;
    let keys = kgc.keys().ok_or("no key set")?;

    // Two of these would pass half the plaintext modulus and decode negative.
    let outcome = encrypt_reading(kgc.scheme(), keys.public_keys(), 20000.0, &mut rng);
    assert!(matches!(outcome, Err(Error::Scheme(_))));

    // The largest readings allowed still sum exactly, at the maximum count.
    let readings = vec![-255.75; parameters.max_contributors()];
    let decoded = full_round(&parameters, &readings)?;
    assert_eq!(decoded.total, -255.75 * 128.0);
    assert_eq!(decoded.contributor_count, 128);
    Ok(())
}

#[test]
fn absent_meter() -> Result<(), Box<dyn StdError>> {
    let mut rng = rng();
    let parameters = Arc::new(Parameters::small());
    let mut kgc = KeyGenerationCenter::<BfvScheme>::new(&parameters)?;
    kgc.generate(&mut rng)?;
    let keys = kgc.keys().ok_or("no key set")?;
    let (public, secret) = (keys.public_keys(), keys.decryption_key());

    let scheme = kgc.scheme();
    let mut resolver = MemorySourceResolver::new();
    resolver.insert(ClientId::new(1)?, encrypt_reading(scheme, public, 1.5, &mut rng)?);
    resolver.insert(ClientId::new(3)?, encrypt_reading(scheme, public, -0.5, &mut rng)?);

    let ingested = secagg::ingest(scheme, ids(1..=3)?, &resolver)?;
    assert_eq!(ingested.skipped.len(), 1);
    assert_eq!(ingested.skipped[0].client_id.get(), 2);
    assert!(matches!(ingested.skipped[0].reason, SkipReason::Missing));

    let result = secagg::aggregate(scheme, &ingested.contributions, public)?;
    assert_eq!(
        result.contributors().iter().map(|c| c.get()).collect::<Vec<_>>(),
        vec![1, 3]
    );
    let decoded = secagg::finalize(scheme, &result, secret)?;
    assert_eq!(decoded.total, 1.0);
    assert_eq!(decoded.average, 0.5);
    assert_eq!(decoded.contributor_count, 2);
    Ok(())
}

#[test]
fn round_from_files() -> Result<(), Box<dyn StdError>> {
    let mut rng = rng();
    let dir = tempfile::tempdir()?;
    let path = |name: &str| dir.path().join(name);
    let config = AggregationConfig {
        scheme: secagg::SchemeId::Bfv,
        poly_modulus_degree: 2048,
        ckks_scale_bits: 8,
        coeff_modulus_bits: vec![27, 27],
        plaintext_bits: 24,
        security_level: secagg::SecurityLevel::Tc128,
        num_clients: 5,
        max_contributors: Some(128),
        public_key_file: path("keys/public_key.seal"),
        secret_key_file: path("keys/secret_key.seal"),
        relin_keys_file: path("keys/relin_keys.seal"),
        data_path_prefix: path("data/ct_client_").to_string_lossy().into_owned(),
        ciphertext_extension: ".ct".to_string(),
    };
    let parameters = Arc::new(config.parameters()?);
    assert_eq!(*parameters, Parameters::small());

    let mut kgc = KeyGenerationCenter::<BfvScheme>::new(&parameters)?;
    let mut store = config.key_store();
    kgc.generate(&mut rng)?;
    kgc.persist(&mut store)?;
    for kind in KeyKind::ALL {
        assert!(store.path(kind).exists());
    }

    let aggregator = Aggregator::<BfvScheme>::from_store(&parameters, &store)?;
    let resolver = config.source_resolver();
    for (id, reading) in [(1, 1.5), (2, 2.25), (4, 3.0)] {
        let bytes = encrypt_reading(aggregator.scheme(), aggregator.keys(), reading, &mut rng)?;
        write_contribution(&resolver, ClientId::new(id)?, &bytes)?;
    }
    fs::write(resolver.path(ClientId::new(5)?), b"not a ciphertext")?;

    let report = run_round::<BfvScheme>(&config, FoldStrategy::Tree)?;
    assert_eq!(report.result.total, 6.75);
    assert_eq!(report.result.average, 2.25);
    assert_eq!(report.result.contributor_count, 3);
    assert_eq!(
        report.contributors.iter().map(|c| c.get()).collect::<Vec<_>>(),
        vec![1, 2, 4]
    );
    assert_eq!(report.skipped.len(), 2);
    assert!(matches!(report.skipped[0].reason, SkipReason::Missing));
    assert_eq!(report.skipped[1].client_id.get(), 5);
    assert!(matches!(
        report.skipped[1].reason,
        SkipReason::Unreadable(Error::CiphertextLoad { .. })
    ));
    Ok(())
}

#[test]
fn nothing_submitted() -> Result<(), Box<dyn StdError>> {
    let mut rng = rng();
    let parameters = Arc::new(Parameters::small());
    let mut kgc = KeyGenerationCenter::<BfvScheme>::new(&parameters)?;
    let mut store = MemoryKeyStore::new();
    kgc.generate(&mut rng)?;
    kgc.persist(&mut store)?;

    let aggregator = Aggregator::<BfvScheme>::from_store(&parameters, &store)?;
    let outcome = aggregator.run(ids(1..=4)?, &MemorySourceResolver::new(), &mut StageTimings::new());
    assert!(matches!(outcome, Err(Error::NoContributions { expected: 4 })));
    Ok(())
}

#[test]
fn parameter_mismatch() -> Result<(), Box<dyn StdError>> {
    let mut rng = rng();
    let small = Arc::new(Parameters::small());
    let other = ParametersBuilder::new()
        .set_degree(2048)
        .set_coeff_modulus_bits(&[27, 27])
        .set_plaintext_bits(24)
        .set_scale_bits(6)
        .build_arc()?;
    assert_ne!(small.tag(), other.tag());

    // Keys generated under other parameters are refused.
    let mut kgc = KeyGenerationCenter::<BfvScheme>::new(&other)?;
    let mut foreign_store = MemoryKeyStore::new();
    kgc.generate(&mut rng)?;
    kgc.persist(&mut foreign_store)?;
    assert!(matches!(
        Aggregator::<BfvScheme>::from_store(&small, &foreign_store),
        Err(Error::KeyLoad {
            kind: KeyKind::Public,
            ..
        })
    ));
    assert!(matches!(
        Decryptor::<BfvScheme>::from_store(&small, &foreign_store),
        Err(Error::KeyLoad {
            kind: KeyKind::Secret,
            ..
        })
    ));

    // So are ciphertexts: they are skipped, the others are aggregated.
    let foreign = Aggregator::<BfvScheme>::from_store(&other, &foreign_store)?;
    let mut kgc = KeyGenerationCenter::<BfvScheme>::new(&small)?;
    let mut store = MemoryKeyStore::new();
    kgc.generate(&mut rng)?;
    kgc.persist(&mut store)?;
    let aggregator = Aggregator::<BfvScheme>::from_store(&small, &store)?;

    let mut resolver = MemorySourceResolver::new();
    resolver.insert(
        ClientId::new(1)?,
        encrypt_reading(aggregator.scheme(), aggregator.keys(), 4.0, &mut rng)?,
    );
    resolver.insert(
        ClientId::new(2)?,
        encrypt_reading(foreign.scheme(), foreign.keys(), 4.0, &mut rng)?,
    );
    let aggregated = aggregator.run(ids(1..=2)?, &resolver, &mut StageTimings::new())?;
    assert_eq!(aggregated.result.contributor_count(), 1);
    assert_eq!(aggregated.skipped.len(), 1);
    assert!(matches!(
        aggregated.skipped[0].reason,
        SkipReason::Unreadable(Error::CiphertextLoad { .. })
    ));

    // A decryption key of another key set is refused.
    let decryptor = Decryptor::<BfvScheme>::from_store(&other, &foreign_store)?;
    let mut swapped = MemoryKeyStore::new();
    swapped.put(KeyKind::Public, &store.get(KeyKind::Public)?.ok_or("no public key")?)?;
    swapped.put(KeyKind::Eval, &store.get(KeyKind::Eval)?.ok_or("no evaluation key")?)?;
    swapped.put(KeyKind::Secret, &foreign_store.get(KeyKind::Secret)?.ok_or("no secret key")?)?;
    assert!(Decryptor::<BfvScheme>::from_store(&small, &swapped).is_err());
    assert!(matches!(
        decryptor.finalize(&aggregated.result, &mut StageTimings::new()),
        Err(Error::Decryption(_))
    ));
    Ok(())
}
