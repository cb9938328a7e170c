use crate::{data_istream::DataIStream, data_ostream::DataOStream, error::SerdeErr};

/// A value that can be written to a [`DataOStream`] and read back from a
/// [`DataIStream`].
///
/// Implementations must read exactly the bytes they wrote, in the same order.
pub trait Serde: Sized {
    /// Append the value to the stream
    fn ser(&self, writer: &mut DataOStream);

    /// Read the value from the stream, advancing the cursor
    fn de(reader: &mut DataIStream) -> Result<Self, SerdeErr>;

    /// Number of bytes `ser` will append
    fn byte_length(&self) -> usize;
}

/// Implemented by values whose encoding always has the same size
pub trait ConstByteLength {
    fn const_byte_length() -> usize;
}
