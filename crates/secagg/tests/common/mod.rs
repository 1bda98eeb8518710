//! A stand-in scheme that keeps readings in the clear.
//!
//! Keys are random markers: a ciphertext remembers the marker of the public
//! key it was encrypted under, and only the matching secret key opens it.
//! Sums are exact up to floating point, which lets the pipeline be checked
//! without the noise and the cost of a lattice scheme.

#![allow(dead_code)]

use rand::{CryptoRng, RngCore};
use secagg::{Error, Parameters};
use secagg_traits::{
    SchemeBase, SchemeDecrypter, SchemeEncoder, SchemeEncrypter, SchemeKeygen, SchemeSerialize,
};
use std::sync::Arc;

/// A key marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker(u64);

/// Readings with the marker of the key they are encrypted under.
#[derive(Debug, Clone, PartialEq)]
pub struct PlainCiphertext {
    values: Vec<f64>,
    key: u64,
}

/// Base type of the stand-in scheme.
#[derive(Debug)]
pub struct PlainScheme {
    par: Arc<Parameters>,
}

impl SchemeBase for PlainScheme {
    type Parameters = Parameters;
    type Error = Error;
    type PublicKey = Marker;
    type SecretKey = Marker;
    type EvalKey = Marker;
    type Plaintext = Vec<f64>;
    type Ciphertext = PlainCiphertext;

    fn try_new(par: &Arc<Parameters>) -> Result<Self, Error> {
        par.validate()?;
        Ok(Self { par: par.clone() })
    }

    fn parameters(&self) -> &Arc<Parameters> {
        &self.par
    }

    fn add(&self, lhs: &PlainCiphertext, rhs: &PlainCiphertext) -> Result<PlainCiphertext, Error> {
        if lhs.key != rhs.key {
            return Err(Error::Scheme("ciphertexts under different keys".to_string()));
        }
        let len = lhs.values.len().max(rhs.values.len());
        let values = (0..len)
            .map(|i| lhs.values.get(i).unwrap_or(&0.0) + rhs.values.get(i).unwrap_or(&0.0))
            .collect();
        Ok(PlainCiphertext {
            values,
            key: lhs.key,
        })
    }
}

impl SchemeKeygen for PlainScheme {
    fn keygen<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<(Marker, Marker, Marker), Error> {
        let marker = Marker(rng.next_u64());
        Ok((marker, marker, marker))
    }
}

impl SchemeEncoder for PlainScheme {
    fn encode(&self, values: &[f64]) -> Result<Vec<f64>, Error> {
        if values.len() > self.par.poly_modulus_degree() {
            return Err(Error::Scheme("too many values".to_string()));
        }
        Ok(values.to_vec())
    }

    fn decode(&self, pt: &Vec<f64>) -> Result<Vec<f64>, Error> {
        Ok(pt.clone())
    }
}

impl SchemeEncrypter for PlainScheme {
    /// Encrypt as identity.
    fn encrypt<R: RngCore + CryptoRng>(
        &self,
        pt: &Vec<f64>,
        pk: &Marker,
        _: &mut R,
    ) -> Result<PlainCiphertext, Error> {
        Ok(PlainCiphertext {
            values: pt.clone(),
            key: pk.0,
        })
    }
}

impl SchemeDecrypter for PlainScheme {
    fn decrypt(&self, ct: &PlainCiphertext, sk: &Marker) -> Result<Vec<f64>, Error> {
        if ct.key != sk.0 {
            return Err(Error::Scheme("wrong secret key".to_string()));
        }
        Ok(ct.values.clone())
    }
}

fn marker_from_bytes(bytes: &[u8]) -> Result<Marker, Error> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Scheme("marker must be 8 bytes".to_string()))?;
    Ok(Marker(u64::from_le_bytes(bytes)))
}

impl SchemeSerialize for PlainScheme {
    fn public_key_to_bytes(&self, pk: &Marker) -> Vec<u8> {
        pk.0.to_le_bytes().to_vec()
    }

    fn public_key_from_bytes(&self, bytes: &[u8]) -> Result<Marker, Error> {
        marker_from_bytes(bytes)
    }

    fn secret_key_to_bytes(&self, sk: &Marker) -> Vec<u8> {
        sk.0.to_le_bytes().to_vec()
    }

    fn secret_key_from_bytes(&self, bytes: &[u8]) -> Result<Marker, Error> {
        marker_from_bytes(bytes)
    }

    fn eval_key_to_bytes(&self, ek: &Marker) -> Vec<u8> {
        ek.0.to_le_bytes().to_vec()
    }

    fn eval_key_from_bytes(&self, bytes: &[u8]) -> Result<Marker, Error> {
        marker_from_bytes(bytes)
    }

    fn ciphertext_to_bytes(&self, ct: &PlainCiphertext) -> Vec<u8> {
        let mut bytes = ct.key.to_le_bytes().to_vec();
        ct.values
            .iter()
            .for_each(|v| bytes.extend_from_slice(&v.to_le_bytes()));
        bytes
    }

    fn ciphertext_from_bytes(&self, bytes: &[u8]) -> Result<PlainCiphertext, Error> {
        if bytes.len() < 8 || bytes.len() % 8 != 0 {
            return Err(Error::Scheme("truncated ciphertext".to_string()));
        }
        let (key, values) = bytes.split_at(8);
        let values = values
            .chunks_exact(8)
            .map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                f64::from_le_bytes(b)
            })
            .collect();
        Ok(PlainCiphertext {
            values,
            key: marker_from_bytes(key)?.0,
        })
    }
}
