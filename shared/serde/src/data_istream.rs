use crate::{error::SerdeErr, serde::Serde};

/// A read cursor over bytes produced by a [`DataOStream`](crate::DataOStream).
///
/// Reading past the end fails with [`SerdeErr::OutOfRange`] and leaves the
/// cursor where it was.
#[derive(Debug, Clone)]
pub struct DataIStream<'b> {
    buffer: &'b [u8],
    position: usize,
}

impl<'b> DataIStream<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Read any serializable value
    pub fn read<T: Serde>(&mut self) -> Result<T, SerdeErr> {
        T::de(self)
    }

    /// Read exactly `length` raw bytes
    pub fn read_bytes(&mut self, length: usize) -> Result<&'b [u8], SerdeErr> {
        let remaining = self.remaining();
        if length > remaining {
            return Err(SerdeErr::OutOfRange {
                requested: length,
                remaining,
            });
        }
        let start = self.position;
        self.position += length;
        Ok(&self.buffer[start..self.position])
    }

    /// Read a fixed-size array of raw bytes
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SerdeErr> {
        let bytes = self.read_bytes(N)?;
        let mut output = [0u8; N];
        output.copy_from_slice(bytes);
        Ok(output)
    }

    /// Read a `u64` length prefix followed by that many bytes
    pub fn read_sized_bytes(&mut self) -> Result<&'b [u8], SerdeErr> {
        let checkpoint = self.position;
        let length = self.read_length()?;
        match self.read_bytes(length) {
            Ok(bytes) => Ok(bytes),
            Err(err) => {
                self.position = checkpoint;
                Err(err)
            }
        }
    }

    /// Read a `u64` length prefix and convert it to `usize`
    pub(crate) fn read_length(&mut self) -> Result<usize, SerdeErr> {
        let length = u64::de(self)?;
        usize::try_from(length).map_err(|_| SerdeErr::LengthOverflow { length })
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The unread tail of the stream
    pub fn rest(&self) -> &'b [u8] {
        &self.buffer[self.position..]
    }

    /// Fails if any bytes are left unread
    pub fn expect_end(&self) -> Result<(), SerdeErr> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(SerdeErr::TrailingBytes { remaining }),
        }
    }
}
