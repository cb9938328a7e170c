use crate::{
    data_istream::DataIStream,
    data_ostream::DataOStream,
    error::SerdeErr,
    serde::{ConstByteLength, Serde},
};

// Numbers

macro_rules! impl_serde_for_number {
    ($($t:ty),*) => {
        $(
            impl Serde for $t {
                fn ser(&self, writer: &mut DataOStream) {
                    writer.write_bytes(&self.to_le_bytes());
                }

                fn de(reader: &mut DataIStream) -> Result<Self, SerdeErr> {
                    let bytes = reader.read_array::<{ std::mem::size_of::<$t>() }>()?;
                    Ok(<$t>::from_le_bytes(bytes))
                }

                fn byte_length(&self) -> usize {
                    std::mem::size_of::<$t>()
                }
            }

            impl ConstByteLength for $t {
                fn const_byte_length() -> usize {
                    std::mem::size_of::<$t>()
                }
            }
        )*
    };
}

impl_serde_for_number!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

// Boolean

impl Serde for bool {
    fn ser(&self, writer: &mut DataOStream) {
        u8::from(*self).ser(writer);
    }

    fn de(reader: &mut DataIStream) -> Result<Self, SerdeErr> {
        match u8::de(reader)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SerdeErr::InvalidValue {
                type_name: "bool",
                value: u64::from(other),
            }),
        }
    }

    fn byte_length(&self) -> usize {
        1
    }
}

impl ConstByteLength for bool {
    fn const_byte_length() -> usize {
        1
    }
}

// Unit

impl Serde for () {
    fn ser(&self, _: &mut DataOStream) {}

    fn de(_: &mut DataIStream) -> Result<Self, SerdeErr> {
        Ok(())
    }

    fn byte_length(&self) -> usize {
        0
    }
}

// Strings

impl Serde for String {
    fn ser(&self, writer: &mut DataOStream) {
        writer.write_sized_bytes(self.as_bytes());
    }

    fn de(reader: &mut DataIStream) -> Result<Self, SerdeErr> {
        let checkpoint = reader.clone();
        let bytes = reader.read_sized_bytes()?;
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => {
                *reader = checkpoint;
                Err(SerdeErr::InvalidUtf8 {
                    length: bytes.len(),
                })
            }
        }
    }

    fn byte_length(&self) -> usize {
        8 + self.len()
    }
}

// Containers

impl<T: Serde> Serde for Vec<T> {
    fn ser(&self, writer: &mut DataOStream) {
        (self.len() as u64).ser(writer);
        for item in self {
            item.ser(writer);
        }
    }

    fn de(reader: &mut DataIStream) -> Result<Self, SerdeErr> {
        let checkpoint = reader.clone();
        let length = reader.read_length()?;
        let available = reader.remaining();
        // a hostile prefix must not trigger a huge allocation up front
        let mut output = Vec::with_capacity(length.min(available));
        for _ in 0..length {
            let before = reader.remaining();
            let item = match T::de(reader) {
                Ok(item) => item,
                Err(error) => {
                    *reader = checkpoint;
                    return Err(error);
                }
            };
            // zero-width items never run out of input, so the input bounds them
            if reader.remaining() == before && length > available {
                *reader = checkpoint;
                return Err(SerdeErr::OutOfRange {
                    requested: length,
                    remaining: available,
                });
            }
            output.push(item);
        }
        Ok(output)
    }

    fn byte_length(&self) -> usize {
        8 + self.iter().map(Serde::byte_length).sum::<usize>()
    }
}

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut DataOStream) {
        match self {
            Some(value) => {
                true.ser(writer);
                value.ser(writer);
            }
            None => false.ser(writer),
        }
    }

    fn de(reader: &mut DataIStream) -> Result<Self, SerdeErr> {
        if bool::de(reader)? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }

    fn byte_length(&self) -> usize {
        1 + self.as_ref().map_or(0, Serde::byte_length)
    }
}

impl<A: Serde, B: Serde> Serde for (A, B) {
    fn ser(&self, writer: &mut DataOStream) {
        self.0.ser(writer);
        self.1.ser(writer);
    }

    fn de(reader: &mut DataIStream) -> Result<Self, SerdeErr> {
        Ok((A::de(reader)?, B::de(reader)?))
    }

    fn byte_length(&self) -> usize {
        self.0.byte_length() + self.1.byte_length()
    }
}

impl<const N: usize> Serde for [u8; N] {
    fn ser(&self, writer: &mut DataOStream) {
        writer.write_bytes(self);
    }

    fn de(reader: &mut DataIStream) -> Result<Self, SerdeErr> {
        reader.read_array::<N>()
    }

    fn byte_length(&self) -> usize {
        N
    }
}
