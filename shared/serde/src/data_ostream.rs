use crate::serde::Serde;

/// Accumulates typed values into a growable byte buffer.
///
/// The stream never fails: it grows as needed. The bytes it produces are read
/// back with a [`DataIStream`](crate::DataIStream) in the same order.
#[derive(Debug, Default, Clone)]
pub struct DataOStream {
    buffer: Vec<u8>,
}

impl DataOStream {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Write any serializable value
    pub fn write<T: Serde>(&mut self, value: &T) -> &mut Self {
        value.ser(self);
        self
    }

    /// Write raw bytes with no length prefix
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    /// Write a `u64` length prefix followed by the bytes
    pub fn write_sized_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        (bytes.len() as u64).ser(self);
        self.write_bytes(bytes)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns whether anything has been written since creation or the last reset
    pub fn has_data(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Discard everything written so far, keeping the allocation
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
