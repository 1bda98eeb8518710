#![allow(missing_docs)]
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Parameters {
    #[prost(string, tag = "1")]
    pub scheme_id: ::prost::alloc::string::String,
    #[prost(uint32, tag = "2")]
    pub degree: u32,
    #[prost(uint32, repeated, tag = "3")]
    pub moduli_sizes: ::prost::alloc::vec::Vec<u32>,
    #[prost(uint32, tag = "4")]
    pub scale_bits: u32,
    #[prost(uint32, tag = "5")]
    pub plaintext_bits: u32,
    #[prost(uint32, tag = "6")]
    pub security_level: u32,
    #[prost(uint32, tag = "7")]
    pub max_contributors: u32,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(fixed32, tag = "1")]
    pub magic: u32,
    #[prost(uint32, tag = "2")]
    pub version: u32,
    #[prost(string, tag = "3")]
    pub scheme_id: ::prost::alloc::string::String,
    #[prost(uint32, tag = "4")]
    pub kind: u32,
    #[prost(bytes = "vec", tag = "5")]
    pub parameters_tag: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    pub key_id: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "7")]
    pub payload: ::prost::alloc::vec::Vec<u8>,
}
