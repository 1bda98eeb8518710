//! Parameters of the aggregation scheme.

use crate::proto::secagg::Parameters as ParametersProto;
use crate::{Error, ParametersError, Result};
use prost::Message;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Debug, Display};
use std::str::FromStr;
use std::sync::Arc;

/// Supported polynomial degrees, smallest first.
const DEGREES: [usize; 6] = [1024, 2048, 4096, 8192, 16384, 32768];

/// Bits of ciphertext modulus kept above the plaintext for noise growth.
const NOISE_MARGIN_BITS: usize = 24;

/// Identifier of the homomorphic scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeId {
    /// The BFV scheme, with a fixed-point encoding of reals.
    Bfv,
}

impl SchemeId {
    /// Returns the canonical name of the scheme.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SchemeId::Bfv => "bfv",
        }
    }
}

impl Display for SchemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemeId {
    type Err = ParametersError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bfv" => Ok(SchemeId::Bfv),
            _ => Err(ParametersError::UnknownScheme(s.to_string())),
        }
    }
}

/// Classical security level, following the homomorphic encryption standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum SecurityLevel {
    /// 128-bit classical security.
    Tc128,
    /// 192-bit classical security.
    Tc192,
    /// 256-bit classical security.
    Tc256,
}

impl SecurityLevel {
    /// Returns the number of bits of security.
    pub const fn bits(&self) -> usize {
        match self {
            SecurityLevel::Tc128 => 128,
            SecurityLevel::Tc192 => 192,
            SecurityLevel::Tc256 => 256,
        }
    }

    /// Returns the largest total modulus size (in bits) for a degree, or
    /// `None` if the degree is not supported.
    pub fn max_modulus_bits(&self, degree: usize) -> Option<usize> {
        let table: [usize; 6] = match self {
            SecurityLevel::Tc128 => [27, 54, 109, 218, 438, 881],
            SecurityLevel::Tc192 => [19, 37, 75, 152, 305, 611],
            SecurityLevel::Tc256 => [14, 29, 58, 118, 237, 476],
        };
        DEGREES
            .iter()
            .position(|d| *d == degree)
            .map(|i| table[i])
    }
}

impl Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit security", self.bits())
    }
}

impl TryFrom<usize> for SecurityLevel {
    type Error = ParametersError;

    fn try_from(bits: usize) -> std::result::Result<Self, Self::Error> {
        match bits {
            128 => Ok(SecurityLevel::Tc128),
            192 => Ok(SecurityLevel::Tc192),
            256 => Ok(SecurityLevel::Tc256),
            _ => Err(ParametersError::UnknownSecurityLevel(bits)),
        }
    }
}

impl From<SecurityLevel> for usize {
    fn from(level: SecurityLevel) -> Self {
        level.bits()
    }
}

/// Digest identifying a parameter set.
///
/// Every persisted blob carries the tag of the parameters it was produced
/// under, so that material from another parameter set is rejected before it
/// reaches the scheme.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParametersTag(pub(crate) [u8; 32]);

impl ParametersTag {
    /// Returns the bytes of the tag.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub(crate) fn try_from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }
}

impl Display for ParametersTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

impl Debug for ParametersTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParametersTag({self})")
    }
}

/// Parameters of the aggregation scheme.
///
/// Reals are encoded in fixed point with `scale_bits` fractional bits, inside
/// a plaintext modulus of `plaintext_bits` bits. At most `max_contributors`
/// encodings are summed, so each one is bounded by [`Parameters::value_bound`]
/// and the sum never wraps around the plaintext modulus. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct Parameters {
    scheme_id: SchemeId,
    poly_modulus_degree: usize,
    coeff_modulus_bits: Box<[usize]>,
    scale_bits: usize,
    plaintext_bits: usize,
    security_level: SecurityLevel,
    max_contributors: usize,
}

impl Debug for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameters")
            .field("scheme_id", &self.scheme_id)
            .field("poly_modulus_degree", &self.poly_modulus_degree)
            .field("coeff_modulus_bits", &self.coeff_modulus_bits)
            .field("scale_bits", &self.scale_bits)
            .field("plaintext_bits", &self.plaintext_bits)
            .field("security_level", &self.security_level.bits())
            .field("max_contributors", &self.max_contributors)
            .finish()
    }
}

impl Default for Parameters {
    /// Degree 8192, modulus chain `[58, 54, 54, 52]`, 30 bits of scale and a
    /// 51-bit plaintext, at 128-bit security. Sums of up to 1024 readings
    /// below 1024 in magnitude.
    fn default() -> Self {
        Self {
            scheme_id: SchemeId::Bfv,
            poly_modulus_degree: 8192,
            coeff_modulus_bits: Box::new([58, 54, 54, 52]),
            scale_bits: 30,
            plaintext_bits: 51,
            security_level: SecurityLevel::Tc128,
            max_contributors: 1024,
        }
    }
}

impl Parameters {
    /// Returns the scheme identifier.
    pub const fn scheme_id(&self) -> SchemeId {
        self.scheme_id
    }

    /// Returns the polynomial degree, which is also the number of slots.
    pub const fn poly_modulus_degree(&self) -> usize {
        self.poly_modulus_degree
    }

    /// Returns the sizes of the ciphertext moduli.
    pub fn coeff_modulus_bits(&self) -> &[usize] {
        &self.coeff_modulus_bits
    }

    /// Returns the number of fractional bits of the encoding.
    pub const fn scale_bits(&self) -> usize {
        self.scale_bits
    }

    /// Returns the size of the plaintext modulus.
    pub const fn plaintext_bits(&self) -> usize {
        self.plaintext_bits
    }

    /// Returns the security level.
    pub const fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// Returns the largest number of contributions that may be summed.
    pub const fn max_contributors(&self) -> usize {
        self.max_contributors
    }

    /// Returns the bound on the magnitude of one encoded reading, in units of
    /// `2^-scale_bits`: `(t / 2) / max_contributors`. A sum of at most
    /// `max_contributors` such readings stays below `t / 2` in magnitude.
    pub fn value_bound(&self) -> u64 {
        (self.plaintext_modulus() / 2) / self.max_contributors.max(1) as u64
    }

    /// Returns the scaling factor `2^scale_bits`.
    pub fn scale(&self) -> f64 {
        (self.scale_bits as f64).exp2()
    }

    /// Returns the plaintext modulus `2^plaintext_bits`.
    pub fn plaintext_modulus(&self) -> u64 {
        1u64 << self.plaintext_bits
    }

    /// Returns the total size of the ciphertext modulus.
    pub fn total_modulus_bits(&self) -> usize {
        self.coeff_modulus_bits.iter().sum()
    }

    /// Small parameter set for tests and benchmarks: degree 2048, modulus
    /// chain `[27, 27]`, 24-bit plaintext, 8 bits of scale. Sums of up to 128
    /// readings below 256 in magnitude.
    pub fn small() -> Self {
        Self {
            scheme_id: SchemeId::Bfv,
            poly_modulus_degree: 2048,
            coeff_modulus_bits: Box::new([27, 27]),
            scale_bits: 8,
            plaintext_bits: 24,
            security_level: SecurityLevel::Tc128,
            max_contributors: 128,
        }
    }

    /// Check that the parameters describe a valid and secure instance.
    pub fn validate(&self) -> std::result::Result<(), ParametersError> {
        let degree = self.poly_modulus_degree;
        if !DEGREES.contains(&degree) {
            return Err(ParametersError::InvalidDegree(degree));
        }

        if self.coeff_modulus_bits.len() < 2 {
            return Err(ParametersError::TooFewModuli(
                self.coeff_modulus_bits.len(),
                2,
            ));
        }
        if let Some(size) = self
            .coeff_modulus_bits
            .iter()
            .find(|size| !(10..=62).contains(*size))
        {
            return Err(ParametersError::InvalidModulusSize(*size, 10, 62));
        }

        let bits = self.total_modulus_bits();
        let max = self
            .security_level
            .max_modulus_bits(degree)
            .ok_or(ParametersError::InvalidDegree(degree))?;
        if bits > max {
            return Err(ParametersError::Insecure {
                bits,
                max,
                degree,
                level: self.security_level,
            });
        }

        if !(2..=61).contains(&self.plaintext_bits) {
            return Err(ParametersError::InvalidPlaintextSize(
                self.plaintext_bits,
                2,
                61,
            ));
        }
        // The plaintext modulus is reduced modulo every ciphertext modulus.
        let smallest = self.coeff_modulus_bits.iter().copied().min().unwrap_or(0);
        if self.plaintext_bits >= smallest {
            return Err(ParametersError::PlaintextAboveModulus(
                self.plaintext_bits,
                smallest,
            ));
        }
        if self.plaintext_bits + NOISE_MARGIN_BITS > bits {
            return Err(ParametersError::NoiseBudget(bits, self.plaintext_bits));
        }

        // A sign bit and at least one integer bit.
        if self.scale_bits + 2 > self.plaintext_bits {
            return Err(ParametersError::InvalidScale(
                self.scale_bits,
                self.plaintext_bits,
            ));
        }

        if self.max_contributors == 0 || u32::try_from(self.max_contributors).is_err() {
            return Err(ParametersError::InvalidMaxContributors(
                self.max_contributors,
            ));
        }
        if self.value_bound() < 1u64 << self.scale_bits {
            return Err(ParametersError::ContributorRange(
                self.max_contributors,
                self.plaintext_bits,
                self.scale_bits,
            ));
        }

        Ok(())
    }

    /// Returns the tag of these parameters: the SHA-256 digest of their
    /// canonical serialization.
    pub fn tag(&self) -> ParametersTag {
        ParametersTag(Sha256::digest(self.to_bytes()).into())
    }

    /// Serialize the parameters.
    pub fn to_bytes(&self) -> Vec<u8> {
        ParametersProto::from(self).encode_to_vec()
    }

    /// Deserialize and validate parameters.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let proto = ParametersProto::decode(bytes)
            .map_err(|e| Error::Scheme(format!("Invalid parameters encoding: {e}")))?;
        let par = Parameters::try_from(&proto)?;
        par.validate()?;
        Ok(par)
    }
}

impl TryFrom<&ParametersProto> for Parameters {
    type Error = ParametersError;

    fn try_from(value: &ParametersProto) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            scheme_id: value.scheme_id.parse()?,
            poly_modulus_degree: value.degree as usize,
            coeff_modulus_bits: value.moduli_sizes.iter().map(|s| *s as usize).collect(),
            scale_bits: value.scale_bits as usize,
            plaintext_bits: value.plaintext_bits as usize,
            security_level: SecurityLevel::try_from(value.security_level as usize)?,
            max_contributors: value.max_contributors as usize,
        })
    }
}

/// Builder for parameters of the aggregation scheme.
#[derive(Debug, Clone)]
pub struct ParametersBuilder {
    scheme_id: SchemeId,
    degree: usize,
    coeff_modulus_bits: Vec<usize>,
    scale_bits: usize,
    plaintext_bits: usize,
    security_level: SecurityLevel,
    max_contributors: usize,
}

impl ParametersBuilder {
    /// Creates a new instance of the builder, starting from the default
    /// parameters.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let par = Parameters::default();
        Self {
            scheme_id: par.scheme_id,
            degree: par.poly_modulus_degree,
            coeff_modulus_bits: par.coeff_modulus_bits.to_vec(),
            scale_bits: par.scale_bits,
            plaintext_bits: par.plaintext_bits,
            security_level: par.security_level,
            max_contributors: par.max_contributors,
        }
    }

    /// Sets the scheme.
    pub fn set_scheme(&mut self, scheme_id: SchemeId) -> &mut Self {
        self.scheme_id = scheme_id;
        self
    }

    /// Sets the polynomial degree. Returns an error if the degree is not a
    /// power of two between 1024 and 32768 when building.
    pub fn set_degree(&mut self, degree: usize) -> &mut Self {
        self.degree = degree;
        self
    }

    /// Sets the sizes of the ciphertext moduli.
    pub fn set_coeff_modulus_bits(&mut self, sizes: &[usize]) -> &mut Self {
        self.coeff_modulus_bits = sizes.to_owned();
        self
    }

    /// Sets the number of fractional bits of the encoding.
    pub fn set_scale_bits(&mut self, scale_bits: usize) -> &mut Self {
        self.scale_bits = scale_bits;
        self
    }

    /// Sets the size of the plaintext modulus.
    pub fn set_plaintext_bits(&mut self, plaintext_bits: usize) -> &mut Self {
        self.plaintext_bits = plaintext_bits;
        self
    }

    /// Sets the security level.
    pub fn set_security_level(&mut self, level: SecurityLevel) -> &mut Self {
        self.security_level = level;
        self
    }

    /// Sets the largest number of contributions that may be summed. The
    /// larger it is, the smaller the range of each reading.
    pub fn set_max_contributors(&mut self, max_contributors: usize) -> &mut Self {
        self.max_contributors = max_contributors;
        self
    }

    /// Build a new `Parameters` inside an `Arc`.
    pub fn build_arc(&self) -> Result<Arc<Parameters>> {
        self.build().map(Arc::new)
    }

    /// Build and validate a new `Parameters`.
    pub fn build(&self) -> Result<Parameters> {
        let par = Parameters {
            scheme_id: self.scheme_id,
            poly_modulus_degree: self.degree,
            coeff_modulus_bits: self.coeff_modulus_bits.clone().into_boxed_slice(),
            scale_bits: self.scale_bits,
            plaintext_bits: self.plaintext_bits,
            security_level: self.security_level,
            max_contributors: self.max_contributors,
        };
        par.validate()?;
        Ok(par)
    }
}
