//! secagg protobuf definitions and conversions.

#[allow(clippy::all)]
mod generated;
mod serialization;

pub use generated::*;
