use super::{command_kind::CommandKind, error::CommandError};

/// Largest command, header included, that a node will read off a connection
pub const MAX_COMMAND_SIZE: usize = 64 * 1024 * 1024;

/// The fixed-size prefix of every command on the wire.
///
/// Layout, little-endian: `tag: u32`, `size: u32` (header plus payload),
/// `target: u128`. A receiver reads these 24 bytes first and knows from
/// `size` exactly how many payload bytes follow.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CommandHeader {
    pub tag: u32,
    pub size: u32,
    pub target: u128,
}

impl CommandHeader {
    pub const SIZE: usize = 24;

    pub fn new(kind: CommandKind, target: u128, payload_length: usize) -> Result<Self, CommandError> {
        let size = Self::SIZE + payload_length;
        if size > MAX_COMMAND_SIZE {
            return Err(CommandError::TooLarge {
                size,
                max: MAX_COMMAND_SIZE,
            });
        }
        Ok(Self {
            tag: kind.tag(),
            size: size as u32,
            target,
        })
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.tag.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.size.to_le_bytes());
        bytes[8..24].copy_from_slice(&self.target.to_le_bytes());
        bytes
    }

    /// Decodes a header and validates its size field. The tag is checked
    /// separately by [`CommandHeader::kind`] so that the payload of an
    /// unknown command can still be consumed.
    pub fn decode(bytes: &[u8; Self::SIZE]) -> Result<Self, CommandError> {
        let mut tag = [0u8; 4];
        let mut size = [0u8; 4];
        let mut target = [0u8; 16];
        tag.copy_from_slice(&bytes[0..4]);
        size.copy_from_slice(&bytes[4..8]);
        target.copy_from_slice(&bytes[8..24]);

        let header = Self {
            tag: u32::from_le_bytes(tag),
            size: u32::from_le_bytes(size),
            target: u128::from_le_bytes(target),
        };

        if (header.size as usize) < Self::SIZE {
            return Err(CommandError::MalformedHeader { size: header.size });
        }
        if header.size as usize > MAX_COMMAND_SIZE {
            return Err(CommandError::TooLarge {
                size: header.size as usize,
                max: MAX_COMMAND_SIZE,
            });
        }
        Ok(header)
    }

    pub fn kind(&self) -> Result<CommandKind, CommandError> {
        CommandKind::from_tag(self.tag)
    }

    pub fn payload_length(&self) -> usize {
        self.size as usize - Self::SIZE
    }
}
