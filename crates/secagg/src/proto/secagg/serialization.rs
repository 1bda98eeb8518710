//! Conversions between the library types and their protobuf representation.

use super::generated::Parameters as ParametersProto;
use crate::Parameters;

impl From<&Parameters> for ParametersProto {
    fn from(par: &Parameters) -> Self {
        ParametersProto {
            scheme_id: par.scheme_id().as_str().to_string(),
            degree: par.poly_modulus_degree() as u32,
            moduli_sizes: par
                .coeff_modulus_bits()
                .iter()
                .map(|s| *s as u32)
                .collect(),
            scale_bits: par.scale_bits() as u32,
            plaintext_bits: par.plaintext_bits() as u32,
            security_level: par.security_level().bits() as u32,
            max_contributors: par.max_contributors() as u32,
        }
    }
}
