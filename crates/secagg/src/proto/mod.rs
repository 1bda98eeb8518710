//! Protobuf definitions for parameters and persisted blobs.

/// Protobuf for the aggregation parameters and the blob envelope.
pub mod secagg;
