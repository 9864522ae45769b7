//! Command/response framing.
//!
//! Wire format: 2 opcode bytes, then zero or more groups of 2 data bytes
//! followed by the CRC of those 2 bytes. Responses use the same
//! 2-data-plus-CRC cadence. The single exception is the VOC algorithm state
//! write, where the CRC follows every chunk of up to 3 raw bytes; that
//! irregular cadence comes straight from the datasheet and is kept as-is for
//! wire compatibility.

use crate::cmd::Command;
use crate::crc;
use crate::types::TuningParameters;

/// Longest write frame: opcode plus six word/CRC groups (tuning parameters).
const MAX_TX_LEN: usize = 20;

/// Largest decoded response payload (serial number and product name,
/// 32 characters).
pub(crate) const MAX_DATA_LEN: usize = 32;

/// Largest raw response: every 2 data bytes cost 3 bytes on the wire.
pub(crate) const MAX_WIRE_LEN: usize = MAX_DATA_LEN / 2 * 3;

/// Raw byte count to request from the bus for `data_len` decoded bytes.
pub(crate) const fn wire_len(data_len: usize) -> usize {
    data_len / 2 * 3
}

/// Framing failures while decoding a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// A received checksum byte disagrees with the checksum of its data word.
    ChecksumMismatch,
    /// The response ended with fewer data bytes than the command defines.
    LengthMismatch,
    /// The response contained no data at all.
    NoData,
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameError::ChecksumMismatch => f.write_str("checksum mismatch in received frame"),
            FrameError::LengthMismatch => f.write_str("received frame has the wrong data length"),
            FrameError::NoData => f.write_str("received no data"),
        }
    }
}

#[cfg(feature = "thiserror")]
impl core::error::Error for FrameError {}

/// Typed parameter payload of a write frame.
///
/// Field order inside each variant is the wire contract; it matches the
/// datasheet layout of the corresponding command.
pub(crate) enum Payload<'a> {
    /// A single 16-bit parameter (warm start, RH/T acceleration).
    Scalar(u16),
    /// A 32-bit parameter split over two words (auto-cleaning interval).
    Interval(u32),
    /// Six signed tuning words (VOC/NOx tuning).
    Tuning(&'a TuningParameters),
    /// Pre-scaled temperature compensation words.
    TempComp {
        offset: i16,
        slope: i16,
        time_constant: u16,
    },
    /// Opaque byte blob with the chunk-of-3 checksum cadence
    /// (VOC algorithm state only).
    Blob(&'a [u8]),
}

/// One outgoing transaction, owned by the transaction that built it.
pub(crate) struct Frame {
    buf: [u8; MAX_TX_LEN],
    len: usize,
}

impl Frame {
    /// A bare frame: just the 2 opcode bytes, MSB first.
    pub(crate) fn new(cmd: Command) -> Self {
        let mut frame = Frame {
            buf: [0; MAX_TX_LEN],
            len: 0,
        };
        let opcode = cmd.opcode().to_be_bytes();
        frame.push(opcode[0]);
        frame.push(opcode[1]);
        frame
    }

    /// Opcode followed by the serialized payload.
    pub(crate) fn with_payload(cmd: Command, payload: Payload<'_>) -> Self {
        let mut frame = Self::new(cmd);
        match payload {
            Payload::Scalar(value) => frame.push_word(value),
            Payload::Interval(value) => {
                frame.push_word((value >> 16) as u16);
                frame.push_word(value as u16);
            }
            Payload::Tuning(tuning) => {
                for word in tuning.as_words() {
                    frame.push_word(word as u16);
                }
            }
            Payload::TempComp {
                offset,
                slope,
                time_constant,
            } => {
                frame.push_word(offset as u16);
                frame.push_word(slope as u16);
                frame.push_word(time_constant);
            }
            Payload::Blob(bytes) => frame.push_chunked(bytes),
        }
        frame
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    fn push(&mut self, byte: u8) {
        self.buf[self.len] = byte;
        self.len += 1;
    }

    /// 2 data bytes MSB first, then their CRC.
    fn push_word(&mut self, word: u16) {
        let bytes = word.to_be_bytes();
        self.push(bytes[0]);
        self.push(bytes[1]);
        self.push(crc::crc(&bytes));
    }

    /// Irregular cadence for the VOC algorithm state: a CRC after every chunk
    /// of up to 3 raw bytes.
    fn push_chunked(&mut self, data: &[u8]) {
        for chunk in data.chunks(3) {
            for &byte in chunk {
                self.push(byte);
            }
            self.push(crc::crc(chunk));
        }
    }
}

/// Decoded response data with the checksum bytes stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReceiveBuffer {
    data: heapless::Vec<u8, MAX_DATA_LEN>,
}

impl ReceiveBuffer {
    /// Regroups `raw` into validated 2-data-plus-CRC groups.
    ///
    /// Fails immediately on the first checksum mismatch. With
    /// `stop_on_zero_word` set, an all-zero data word ends the read early and
    /// successfully; the device pads zero-terminated text fields (serial
    /// number, product name) with zero words.
    pub(crate) fn decode(
        raw: &[u8],
        expected_len: usize,
        stop_on_zero_word: bool,
    ) -> Result<Self, FrameError> {
        let mut data = heapless::Vec::new();
        for group in raw.chunks(3) {
            if group.len() < 3 {
                // Trailing partial group; the length check below reports it.
                break;
            }
            if !crc::validate(&group[..2], group[2]) {
                return Err(FrameError::ChecksumMismatch);
            }
            data.extend_from_slice(&group[..2])
                .map_err(|_| FrameError::LengthMismatch)?;
            if stop_on_zero_word && group[0] == 0 && group[1] == 0 {
                return Ok(ReceiveBuffer { data });
            }
            if data.len() >= expected_len {
                break;
            }
        }
        if data.is_empty() {
            return Err(FrameError::NoData);
        }
        if data.len() != expected_len {
            return Err(FrameError::LengthMismatch);
        }
        Ok(ReceiveBuffer { data })
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Big-endian unsigned 16-bit word at `offset`.
    pub(crate) fn u16_at(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    /// Same bit pattern as [`Self::u16_at`], reinterpreted as two's complement.
    pub(crate) fn i16_at(&self, offset: usize) -> i16 {
        self.u16_at(offset) as i16
    }

    /// 32-bit value from two consecutive words, MSB first across all 4 bytes.
    pub(crate) fn u32_at(&self, offset: usize) -> u32 {
        (u32::from(self.u16_at(offset)) << 16) | u32::from(self.u16_at(offset + 2))
    }

    pub(crate) fn scaled_u16(&self, offset: usize, scale: f32) -> f32 {
        f32::from(self.u16_at(offset)) / scale
    }

    pub(crate) fn scaled_i16(&self, offset: usize, scale: f32) -> f32 {
        f32::from(self.i16_at(offset)) / scale
    }
}
