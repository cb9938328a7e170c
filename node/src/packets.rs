//! Payloads of the commands exchanged between nodes

use lattice_shared::{
    Command, CommandError, CommandKind, DataIStream, DataOStream, ObjectId, Serde, SerdeErr,
    Version,
};

macro_rules! payload {
    ($(#[$meta:meta])* $name:ident { $($field:ident: $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub(crate) struct $name {
            $(pub $field: $ty,)*
        }

        impl Serde for $name {
            fn ser(&self, writer: &mut DataOStream) {
                $(writer.write(&self.$field);)*
            }

            fn de(reader: &mut DataIStream) -> Result<Self, SerdeErr> {
                Ok(Self {
                    $($field: reader.read()?,)*
                })
            }

            fn byte_length(&self) -> usize {
                0 $(+ self.$field.byte_length())*
            }
        }
    };
}

payload!(
    /// First command on a new connection, target is the sender's node id
    ConnectPayload {
        listen: String,
    }
);

// Node commands other than Connect target the addressed node, object
// commands target the object.

payload!(
    /// Target is the responder's node id
    ConnectReplyPayload {
        accepted: bool,
    }
);

payload!(FindMasterPayload {
    request_id: u32,
    object_id: ObjectId,
});

payload!(FindMasterReplyPayload {
    request_id: u32,
    is_master: bool,
});

payload!(
    /// `version` None maps the head version
    MapObjectPayload {
        request_id: u32,
        object_id: ObjectId,
        version: Option<Version>,
    }
);

payload!(
    /// `version` None means the map failed
    MapObjectReplyPayload {
        request_id: u32,
        version: Option<Version>,
    }
);

payload!(UnmapObjectPayload { object_id: ObjectId });

payload!(InstancePayload {
    version: Version,
    data: Vec<u8>,
});

payload!(DeltaPayload {
    version: Version,
    is_instance: bool,
    data: Vec<u8>,
});

payload!(SlaveDeltaPayload {
    sequence: u32,
    data: Vec<u8>,
});

payload!(CommitPayload { sequence: u32 });

payload!(PushPayload {
    group: u128,
    type_id: u128,
    version: Version,
    data: Vec<u8>,
});

payload!(ObsoletePayload { version: Version });

payload!(BarrierEnterPayload {
    round: u32,
    timeout_ms: u32,
});

payload!(BarrierEnterReplyPayload { round: u32 });

/// Builds a command carrying `payload`
pub(crate) fn command<K: Into<CommandKind>, P: Serde>(kind: K, target: u128, payload: &P) -> Command {
    let mut writer = DataOStream::with_capacity(payload.byte_length());
    writer.write(payload);
    Command::new(kind, target, writer.into_bytes())
}

/// Decodes the payload of `command`, which must consume all of it
pub(crate) fn read<P: Serde>(command: &Command) -> Result<P, CommandError> {
    let malformed = |source| CommandError::MalformedPayload {
        kind: command.kind(),
        source,
    };
    let mut reader = command.payload_reader();
    let payload = reader.read::<P>().map_err(malformed)?;
    reader.expect_end().map_err(malformed)?;
    Ok(payload)
}
