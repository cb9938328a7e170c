use std::fmt;

use lattice_serde::{ConstByteLength, DataIStream, DataOStream, Serde, SerdeErr};
use uuid::Uuid;

macro_rules! impl_uuid_id {
    ($name:ident) => {
        impl $name {
            /// The nil id, used where no node or object is addressed
            pub const NONE: Self = Self(Uuid::nil());

            /// Generates a new random (v4) id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub const fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }

            pub const fn as_u128(&self) -> u128 {
                self.0.as_u128()
            }

            pub fn is_none(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::NONE
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Serde for $name {
            fn ser(&self, writer: &mut DataOStream) {
                writer.write(&self.as_u128());
            }

            fn de(reader: &mut DataIStream) -> Result<Self, SerdeErr> {
                Ok(Self::from_u128(reader.read()?))
            }

            fn byte_length(&self) -> usize {
                <Self as ConstByteLength>::const_byte_length()
            }
        }

        impl ConstByteLength for $name {
            fn const_byte_length() -> usize {
                <u128 as ConstByteLength>::const_byte_length()
            }
        }
    };
}

/// Identifies a node in the cluster
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(Uuid);

/// Identifies a distributed object, shared by its master and all slaves
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(Uuid);

impl_uuid_id!(NodeId);
impl_uuid_id!(ObjectId);
