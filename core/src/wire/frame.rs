/// Wire frame — message framing with length, kind, and CRC32

use super::WireError;
use crc32fast::Hasher;

/// Message kind carried in the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Resource-state advertisement (0x01)
    StateAdvert = 0x01,
    /// Computation-graph update (0x02)
    GraphUpdate = 0x02,
    /// Free-form execution-request parameters (0x03)
    ExecParams = 0x03,
}

impl MessageKind {
    pub fn from_u8(value: u8) -> Result<Self, WireError> {
        match value {
            0x01 => Ok(MessageKind::StateAdvert),
            0x02 => Ok(MessageKind::GraphUpdate),
            0x03 => Ok(MessageKind::ExecParams),
            other => Err(WireError::InvalidKind(other)),
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Frame wrapping an encoded record for transport
///
/// Format (overhead: 7 bytes):
/// [2 bytes] length (LE u16) - kind byte plus payload, NOT length/CRC
/// [1 byte]  kind
/// [N bytes] payload (an encoded field record)
/// [4 bytes] CRC32 over length + kind + payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

impl WireFrame {
    /// 2 bytes (length) + 1 byte (kind) + 4 bytes (CRC32)
    pub const OVERHEAD: usize = 7;

    pub fn new(kind: MessageKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// Serialize to bytes: [2 LE length][1 kind][N payload][4 LE CRC32]
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        let body_len = 1 + self.payload.len();
        if body_len > u16::MAX as usize {
            return Err(WireError::Oversize {
                got: body_len,
                max: u16::MAX as usize,
            });
        }

        let mut buf = Vec::with_capacity(Self::OVERHEAD + self.payload.len());
        buf.extend_from_slice(&(body_len as u16).to_le_bytes());
        buf.push(self.kind.as_u8());
        buf.extend_from_slice(&self.payload);

        let mut hasher = Hasher::new();
        hasher.update(&buf);
        buf.extend_from_slice(&hasher.finalize().to_le_bytes());

        Ok(buf)
    }

    /// Deserialize from bytes, verifying length and CRC32.
    pub fn from_bytes(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < Self::OVERHEAD {
            return Err(WireError::Truncated {
                need: Self::OVERHEAD,
                got: data.len(),
            });
        }

        let body_len = u16::from_le_bytes([data[0], data[1]]) as usize;
        let expected_total = 2 + body_len + 4;
        if data.len() != expected_total {
            return Err(WireError::Truncated {
                need: expected_total,
                got: data.len(),
            });
        }

        let crc_offset = data.len() - 4;
        let received_crc = u32::from_le_bytes([
            data[crc_offset],
            data[crc_offset + 1],
            data[crc_offset + 2],
            data[crc_offset + 3],
        ]);
        let mut hasher = Hasher::new();
        hasher.update(&data[..crc_offset]);
        if hasher.finalize() != received_crc {
            return Err(WireError::CrcMismatch);
        }

        let kind = MessageKind::from_u8(data[2])?;
        let payload = data[3..crc_offset].to_vec();

        Ok(WireFrame { kind, payload })
    }
}
