use lattice_serde::{DataIStream, DataOStream};

use crate::connection::connection::Connection;

use super::{command_header::CommandHeader, command_kind::CommandKind, error::CommandError};

/// A typed command with its target id and serialized payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    target: u128,
    payload: Vec<u8>,
}

impl Command {
    pub fn new<K: Into<CommandKind>>(kind: K, target: u128, payload: Vec<u8>) -> Self {
        Self {
            kind: kind.into(),
            target,
            payload,
        }
    }

    /// Builds a command whose payload is written by `write`
    pub fn build<K, F>(kind: K, target: u128, write: F) -> Self
    where
        K: Into<CommandKind>,
        F: FnOnce(&mut DataOStream),
    {
        let mut writer = DataOStream::new();
        write(&mut writer);
        Self::new(kind, target, writer.into_bytes())
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn target(&self) -> u128 {
        self.target
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_reader(&self) -> DataIStream<'_> {
        DataIStream::new(&self.payload)
    }

    pub fn header(&self) -> Result<CommandHeader, CommandError> {
        CommandHeader::new(self.kind, self.target, self.payload.len())
    }

    /// Header and payload as one contiguous buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>, CommandError> {
        let header = self.header()?;
        let mut bytes = Vec::with_capacity(header.size as usize);
        bytes.extend_from_slice(&header.encode());
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }

    /// Sends the command with a single `send`, so that concurrent writers on
    /// the same connection never interleave their bytes
    pub fn write_to(&self, connection: &dyn Connection) -> Result<(), CommandError> {
        let bytes = self.to_bytes()?;
        connection.send(&bytes)?;
        Ok(())
    }

    /// Blocks until one complete command has been read from `connection`.
    ///
    /// The payload of a command with an unknown tag is consumed before the
    /// error is returned.
    pub fn read_from(connection: &dyn Connection) -> Result<Self, CommandError> {
        let mut header_bytes = [0u8; CommandHeader::SIZE];
        connection.recv(&mut header_bytes)?;
        let header = CommandHeader::decode(&header_bytes)?;

        let mut payload = vec![0u8; header.payload_length()];
        connection.recv(&mut payload)?;

        Ok(Self {
            kind: header.kind()?,
            target: header.target,
            payload,
        })
    }
}
