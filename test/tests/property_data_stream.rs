/// PROPERTY-BASED TESTS: data streams and command framing
///
/// Values read back in the order they were written, and reading never
/// runs past the end of a buffer.

use proptest::prelude::*;

use lattice_shared::{
    Command, CommandHeader, CommandKind, DataIStream, DataOStream, ObjectCommand, SerdeErr,
};

proptest! {
    #[test]
    fn mixed_values_read_back_in_order(
        number in any::<u64>(),
        signed in any::<i32>(),
        text in ".{0,32}",
        list in prop::collection::vec(any::<u16>(), 0..16),
        flag in any::<bool>(),
        maybe in any::<Option<i64>>(),
        real in any::<f64>().prop_filter("NaN never equals itself", |value| !value.is_nan()),
    ) {
        let mut writer = DataOStream::new();
        writer
            .write(&number)
            .write(&signed)
            .write(&text)
            .write(&list)
            .write(&flag)
            .write(&maybe)
            .write(&real);
        let bytes = writer.into_bytes();

        let mut reader = DataIStream::new(&bytes);
        prop_assert_eq!(reader.read::<u64>().unwrap(), number);
        prop_assert_eq!(reader.read::<i32>().unwrap(), signed);
        prop_assert_eq!(reader.read::<String>().unwrap(), text);
        prop_assert_eq!(reader.read::<Vec<u16>>().unwrap(), list);
        prop_assert_eq!(reader.read::<bool>().unwrap(), flag);
        prop_assert_eq!(reader.read::<Option<i64>>().unwrap(), maybe);
        prop_assert_eq!(reader.read::<f64>().unwrap(), real);
        prop_assert!(reader.expect_end().is_ok());
    }

    #[test]
    fn truncated_buffers_fail_without_moving_the_cursor(value in any::<u64>(), cut in 0usize..8) {
        let mut writer = DataOStream::new();
        writer.write(&value);
        let bytes = writer.into_bytes();

        let mut reader = DataIStream::new(&bytes[..cut]);
        prop_assert_eq!(
            reader.read::<u64>(),
            Err(SerdeErr::OutOfRange { requested: 8, remaining: cut })
        );
        prop_assert_eq!(reader.position(), 0);
    }

    #[test]
    fn command_header_frames_payload(
        payload in prop::collection::vec(any::<u8>(), 0..256),
        target in any::<u128>(),
    ) {
        let command = Command::new(ObjectCommand::Delta, target, payload.clone());
        let bytes = command.to_bytes().unwrap();
        prop_assert_eq!(bytes.len(), CommandHeader::SIZE + payload.len());

        let mut header_bytes = [0u8; CommandHeader::SIZE];
        header_bytes.copy_from_slice(&bytes[..CommandHeader::SIZE]);
        let header = CommandHeader::decode(&header_bytes).unwrap();
        prop_assert_eq!(header.size as usize, bytes.len());
        prop_assert_eq!(header.target, target);
        prop_assert_eq!(header.kind().unwrap(), CommandKind::Object(ObjectCommand::Delta));
        prop_assert_eq!(&bytes[CommandHeader::SIZE..], payload.as_slice());
    }
}
