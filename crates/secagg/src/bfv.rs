//! Binding of the scheme capability to the BFV scheme of the `fhe` crate.
//!
//! BFV plaintexts are polynomials with coefficients modulo `t`. A vector of
//! reals is encoded in the coefficients in fixed point: each value `v` becomes
//! `round(v * 2^scale_bits)`, stored modulo `t = 2^plaintext_bits` in two's
//! complement. Homomorphic addition is exact, so a sum decodes to the sum of
//! the rounded inputs as long as it stays within `(-t/2, t/2)`.

use crate::{Error, Parameters, ParametersError, Result, SchemeId};
use fhe::bfv::{
    BfvParameters, BfvParametersBuilder, Ciphertext, Encoding, Plaintext, PublicKey,
    RelinearizationKey, SecretKey,
};
use fhe_traits::{
    DeserializeParametrized, FheDecoder, FheDecrypter, FheEncoder, FheEncrypter, Serialize,
};
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use secagg_traits::{
    SchemeBase, SchemeDecrypter, SchemeEncoder, SchemeEncrypter, SchemeKeygen, SchemeSerialize,
};
use std::fmt::{self, Debug};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Size of the seed a secret key is derived from.
const SEED_SIZE: usize = 32;

/// Number of polynomials of a fresh ciphertext.
const CIPHERTEXT_SIZE: usize = 2;

/// Secret key of the BFV binding.
///
/// The key is derived deterministically from a seed, and the seed is what
/// gets serialized.
pub struct BfvSecretKey {
    seed: Zeroizing<[u8; SEED_SIZE]>,
    key: SecretKey,
}

impl BfvSecretKey {
    fn from_seed(seed: Zeroizing<[u8; SEED_SIZE]>, par: &Arc<BfvParameters>) -> Self {
        let key = SecretKey::random(par, &mut ChaCha8Rng::from_seed(*seed));
        Self { seed, key }
    }
}

impl PartialEq for BfvSecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.seed == other.seed
    }
}

impl Eq for BfvSecretKey {}

impl Debug for BfvSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BfvSecretKey(..)")
    }
}

/// The BFV scheme, instantiated for a parameter set.
#[derive(Debug, Clone)]
pub struct BfvScheme {
    par: Arc<Parameters>,
    bfv: Arc<BfvParameters>,
}

impl BfvScheme {
    /// Returns the parameters of the underlying BFV instance.
    pub fn bfv_parameters(&self) -> &Arc<BfvParameters> {
        &self.bfv
    }

    fn encode_value(&self, value: f64) -> Result<u64> {
        if !value.is_finite() {
            return Err(Error::Scheme(format!("Cannot encode {value}")));
        }
        let t = self.par.plaintext_modulus();
        let x = (value * self.par.scale()).round();
        // Bounded so that a sum of max_contributors values cannot wrap.
        let bound = self.par.value_bound();
        if x.abs() >= bound as f64 {
            return Err(Error::Scheme(format!(
                "Value {value} is out of range: readings must stay below {} in magnitude to sum {} of them",
                bound as f64 / self.par.scale(),
                self.par.max_contributors()
            )));
        }
        let x = x as i64;
        Ok(if x < 0 {
            t - x.unsigned_abs()
        } else {
            x as u64
        })
    }

    fn decode_value(&self, coefficient: u64) -> f64 {
        let t = self.par.plaintext_modulus();
        let x = if coefficient >= t / 2 {
            -((t - coefficient) as i64)
        } else {
            coefficient as i64
        };
        x as f64 / self.par.scale()
    }

    fn size(ct: &Ciphertext) -> usize {
        (0..).take_while(|i| ct.get(*i).is_some()).count()
    }
}

impl SchemeBase for BfvScheme {
    type Parameters = Parameters;
    type Error = Error;
    type PublicKey = PublicKey;
    type SecretKey = BfvSecretKey;
    type EvalKey = RelinearizationKey;
    type Plaintext = Plaintext;
    type Ciphertext = Ciphertext;

    fn try_new(par: &Arc<Parameters>) -> Result<Self> {
        if par.scheme_id() != SchemeId::Bfv {
            return Err(
                ParametersError::UnknownScheme(par.scheme_id().as_str().to_string()).into(),
            );
        }
        par.validate()?;
        let bfv = BfvParametersBuilder::new()
            .set_degree(par.poly_modulus_degree())
            .set_plaintext_modulus(par.plaintext_modulus())
            .set_moduli_sizes(par.coeff_modulus_bits())
            .build_arc()
            .map_err(|e| ParametersError::Rejected(e.to_string()))?;
        Ok(Self {
            par: par.clone(),
            bfv,
        })
    }

    fn parameters(&self) -> &Arc<Parameters> {
        &self.par
    }

    fn add(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> Result<Ciphertext> {
        if Self::size(lhs) != CIPHERTEXT_SIZE || Self::size(rhs) != CIPHERTEXT_SIZE {
            return Err(Error::Scheme(format!(
                "Cannot add ciphertexts of sizes {} and {}",
                Self::size(lhs),
                Self::size(rhs)
            )));
        }
        if lhs.get(0).map(|c| c.ctx()) != rhs.get(0).map(|c| c.ctx()) {
            return Err(Error::Scheme(
                "Cannot add ciphertexts at different levels".to_string(),
            ));
        }
        let mut sum = lhs.clone();
        sum += rhs;
        Ok(sum)
    }
}

impl SchemeKeygen for BfvScheme {
    fn keygen<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<(PublicKey, BfvSecretKey, RelinearizationKey)> {
        let mut seed = Zeroizing::new([0u8; SEED_SIZE]);
        rng.fill_bytes(seed.as_mut());
        let sk = BfvSecretKey::from_seed(seed, &self.bfv);
        let pk = PublicKey::new(&sk.key, rng);
        let rk = RelinearizationKey::new(&sk.key, rng)?;
        Ok((pk, sk, rk))
    }
}

impl SchemeEncoder for BfvScheme {
    fn encode(&self, values: &[f64]) -> Result<Plaintext> {
        let degree = self.par.poly_modulus_degree();
        if values.len() > degree {
            return Err(Error::Scheme(format!(
                "Cannot encode {} values in {degree} slots",
                values.len()
            )));
        }
        let mut coefficients = vec![0u64; degree];
        for (c, v) in coefficients.iter_mut().zip(values) {
            *c = self.encode_value(*v)?;
        }
        Ok(Plaintext::try_encode(
            coefficients.as_slice(),
            Encoding::poly(),
            &self.bfv,
        )?)
    }

    fn decode(&self, pt: &Plaintext) -> Result<Vec<f64>> {
        let coefficients = Vec::<u64>::try_decode(pt, Encoding::poly())?;
        Ok(coefficients
            .into_iter()
            .map(|c| self.decode_value(c))
            .collect())
    }
}

impl SchemeEncrypter for BfvScheme {
    fn encrypt<R: RngCore + CryptoRng>(
        &self,
        pt: &Plaintext,
        pk: &PublicKey,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        Ok(pk.try_encrypt(pt, rng)?)
    }
}

impl SchemeDecrypter for BfvScheme {
    fn decrypt(&self, ct: &Ciphertext, sk: &BfvSecretKey) -> Result<Plaintext> {
        Ok(sk.key.try_decrypt(ct)?)
    }
}

impl SchemeSerialize for BfvScheme {
    fn public_key_to_bytes(&self, pk: &PublicKey) -> Vec<u8> {
        pk.to_bytes()
    }

    fn public_key_from_bytes(&self, bytes: &[u8]) -> Result<PublicKey> {
        Ok(PublicKey::from_bytes(bytes, &self.bfv)?)
    }

    fn secret_key_to_bytes(&self, sk: &BfvSecretKey) -> Vec<u8> {
        sk.seed.to_vec()
    }

    fn secret_key_from_bytes(&self, bytes: &[u8]) -> Result<BfvSecretKey> {
        let seed = <[u8; SEED_SIZE]>::try_from(bytes).map_err(|_| {
            Error::Scheme(format!(
                "Invalid secret key: {} bytes instead of {SEED_SIZE}",
                bytes.len()
            ))
        })?;
        Ok(BfvSecretKey::from_seed(Zeroizing::new(seed), &self.bfv))
    }

    fn eval_key_to_bytes(&self, ek: &RelinearizationKey) -> Vec<u8> {
        ek.to_bytes()
    }

    fn eval_key_from_bytes(&self, bytes: &[u8]) -> Result<RelinearizationKey> {
        Ok(RelinearizationKey::from_bytes(bytes, &self.bfv)?)
    }

    fn ciphertext_to_bytes(&self, ct: &Ciphertext) -> Vec<u8> {
        ct.to_bytes()
    }

    fn ciphertext_from_bytes(&self, bytes: &[u8]) -> Result<Ciphertext> {
        let ct = Ciphertext::from_bytes(bytes, &self.bfv)?;
        if Self::size(&ct) != CIPHERTEXT_SIZE {
            return Err(Error::Scheme(format!(
                "Invalid ciphertext: {} polynomials instead of {CIPHERTEXT_SIZE}",
                Self::size(&ct)
            )));
        }
        Ok(ct)
    }
}
