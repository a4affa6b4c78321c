use crate::errors::{DbaError, ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes in front of every payload: length, header checksum, payload checksum.
pub(crate) const FRAME_HEADER_LEN: usize = 12;

/// Error type for record framing and codec failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    /// A complete frame did not decode to a record
    #[error("Failed to decode record at offset {offset}: {reason}")]
    Decode { offset: usize, reason: String },
    /// A frame header or payload does not match its checksum
    #[error("Checksum mismatch in record {part} at offset {offset}")]
    Checksum { offset: usize, part: &'static str },
    /// A record could not be encoded
    #[error("Failed to encode record: {0}")]
    Encode(String),
    /// A record is larger than a frame can describe
    #[error("Record of {0} bytes exceeds the frame limit")]
    TooLarge(usize),
}

impl From<RecordError> for DbaError {
    fn from(err: RecordError) -> Self {
        let kind = match err {
            RecordError::Decode { .. } | RecordError::Checksum { .. } => ErrorKind::FileCorrupted,
            RecordError::Encode(_) | RecordError::TooLarge(_) => ErrorKind::EncodingError,
        };
        DbaError::new(&err.to_string(), kind)
    }
}

/// One entry of the flat-file log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub(crate) enum Record {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl Record {
    /// Encodes the record as a length-prefixed frame.
    pub(crate) fn to_frame(&self) -> Result<Vec<u8>, RecordError> {
        let payload = bincode::serde::encode_to_vec(self, bincode::config::legacy())
            .map_err(|e| RecordError::Encode(e.to_string()))?;
        let len = u32::try_from(payload.len()).map_err(|_| RecordError::TooLarge(payload.len()))?;

        let len = len.to_le_bytes();
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.extend_from_slice(&len);
        frame.extend_from_slice(&crc32(&len).to_le_bytes());
        frame.extend_from_slice(&crc32(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }
}

/// Result of scanning a log buffer.
#[derive(Debug, Default)]
pub(crate) struct Replay {
    pub records: Vec<Record>,
    /// Length of the prefix made of complete frames.
    pub valid_len: usize,
    /// Whether an incomplete frame follows `valid_len`.
    pub torn_tail: bool,
}

/// Splits `buffer` into records.
///
/// Only the last frame may be incomplete, and only when its header is intact
/// or itself cut short: that is an interrupted append, reported as a torn
/// tail. A header or payload failing its checksum is corruption wherever it
/// sits, so a damaged length never hides the records after it.
pub(crate) fn replay(buffer: &[u8]) -> Result<Replay, RecordError> {
    let mut replay = Replay::default();
    let mut offset = 0;

    while offset < buffer.len() {
        let remaining = buffer.len() - offset;
        if remaining < FRAME_HEADER_LEN {
            replay.torn_tail = true;
            break;
        }

        let header = &buffer[offset..offset + FRAME_HEADER_LEN];
        if crc32(&header[0..4]) != read_u32(&header[4..8]) {
            return Err(RecordError::Checksum {
                offset,
                part: "header",
            });
        }

        let len = read_u32(&header[0..4]) as usize;
        if remaining - FRAME_HEADER_LEN < len {
            replay.torn_tail = true;
            break;
        }

        let start = offset + FRAME_HEADER_LEN;
        let payload = &buffer[start..start + len];
        if crc32(payload) != read_u32(&header[8..12]) {
            return Err(RecordError::Checksum {
                offset,
                part: "payload",
            });
        }

        let (record, _) =
            bincode::serde::decode_from_slice::<Record, _>(payload, bincode::config::legacy())
                .map_err(|e| RecordError::Decode {
                    offset,
                    reason: e.to_string(),
                })?;

        replay.records.push(record);
        offset = start + len;
        replay.valid_len = offset;
    }

    Ok(replay)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(bytes);
    u32::from_le_bytes(word)
}

/// CRC-32 (IEEE, reflected) of `data`.
fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xffff_ffffu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xedb8_8320
            } else {
                crc >> 1
            };
        }
    }
    !crc
}
