use std::fmt;

use lattice_serde::{ConstByteLength, DataIStream, DataOStream, Serde, SerdeErr};

use super::error::ObjectError;

/// A distributed object's version. Strictly increasing, never wraps.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u64);

impl Version {
    /// Version of an object that has no data yet, and of a master at
    /// registration time
    pub const NONE: Version = Version(0);
    /// Version produced by the first commit
    pub const FIRST: Version = Version(1);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Result<Version, ObjectError> {
        self.0
            .checked_add(1)
            .map(Version)
            .ok_or(ObjectError::VersionOverflow { version: self.0 })
    }

    /// Whether `self` directly follows `previous`
    pub fn follows(&self, previous: Version) -> bool {
        previous.0.checked_add(1) == Some(self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Serde for Version {
    fn ser(&self, writer: &mut DataOStream) {
        writer.write(&self.0);
    }

    fn de(reader: &mut DataIStream) -> Result<Self, SerdeErr> {
        Ok(Self(reader.read()?))
    }

    fn byte_length(&self) -> usize {
        <Self as ConstByteLength>::const_byte_length()
    }
}

impl ConstByteLength for Version {
    fn const_byte_length() -> usize {
        <u64 as ConstByteLength>::const_byte_length()
    }
}

/// What a slave's `sync` should apply
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyncTarget {
    /// Everything received so far, without blocking
    Head,
    /// Exactly one version, waiting for it if necessary
    Next,
    /// Up to and including the given version, waiting for it if necessary
    Version(Version),
}
