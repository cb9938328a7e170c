//! # Lattice Serde
//! Typed byte streams shared by the lattice command layer and by distributed
//! objects. Every value is written in a fixed, little-endian encoding so that
//! any node can read what any other node wrote.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod data_istream;
mod data_ostream;
mod error;
mod impls;
mod serde;

pub use data_istream::DataIStream;
pub use data_ostream::DataOStream;
pub use error::SerdeErr;
pub use serde::{ConstByteLength, Serde};
