// Copyright (C) 2026-present The minibgp Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Codec to decode & encode BGP messages from byte streams

use byteorder::{ByteOrder, NetworkEndian};
use bytes::{Buf, BufMut, BytesMut};
use std::fmt::{Display, Formatter};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    BgpMessage, BgpMessageParsingError, BgpMessageWritingError, BGP_MARKER,
    BGP_MAX_MESSAGE_LENGTH, BGP_MIN_MESSAGE_LENGTH,
};

/// Offset of the two-octet length field inside the fixed header.
const LENGTH_OFFSET: usize = BGP_MARKER.len();

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BgpCodecDecoderError {
    IoError(String),
    BgpMessageParsingError(BgpMessageParsingError),
}

impl From<std::io::Error> for BgpCodecDecoderError {
    fn from(error: std::io::Error) -> Self {
        Self::IoError(error.to_string())
    }
}

impl From<BgpMessageParsingError> for BgpCodecDecoderError {
    fn from(error: BgpMessageParsingError) -> Self {
        Self::BgpMessageParsingError(error)
    }
}

impl Display for BgpCodecDecoderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(err) => write!(f, "IoError({err})"),
            Self::BgpMessageParsingError(err) => write!(f, "BgpMessageParsingError({err})"),
        }
    }
}

/// Stream codec for the BGP wire format.
///
/// Decoding never consumes a partial frame: bytes accumulate until a full
/// message (as declared by the header length) is buffered. A header whose
/// declared length falls outside `[19, 4096]` desynchronizes the stream;
/// recovery discards bytes up to the next marker candidate, at most one
/// probe per call, so an adversarial stream costs one scan per fed chunk.
#[derive(Debug, Default, Clone)]
pub struct BgpCodec;

impl BgpCodec {
    /// Drop bytes up to (but not including) the next occurrence of the
    /// marker, or the whole buffer when no candidate exists. The scan
    /// starts past the rejected header's marker: a corrupt length field
    /// that extends the 0xFF run (e.g. 0xFFFF) would otherwise match an
    /// overlapping pseudo-marker inside the bad header and leave the
    /// stream misaligned.
    fn resync(buf: &mut BytesMut) {
        match buf[BGP_MARKER.len()..]
            .windows(BGP_MARKER.len())
            .position(|window| window == BGP_MARKER)
        {
            Some(pos) => {
                log::debug!(
                    "Discarding {} bytes to next marker candidate",
                    pos + BGP_MARKER.len()
                );
                buf.advance(pos + BGP_MARKER.len())
            }
            None => {
                log::debug!("Discarding {} bytes, no marker candidate in buffer", buf.len());
                buf.clear()
            }
        }
    }
}

impl Decoder for BgpCodec {
    type Item = BgpMessage;
    type Error = BgpCodecDecoderError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() < BGP_MIN_MESSAGE_LENGTH as usize {
            return Ok(None);
        }
        let length = NetworkEndian::read_u16(&buf[LENGTH_OFFSET..LENGTH_OFFSET + 2]);
        if !(BGP_MIN_MESSAGE_LENGTH..=BGP_MAX_MESSAGE_LENGTH).contains(&length) {
            log::debug!("Header declares invalid message length {length}, resynchronizing");
            Self::resync(buf);
            return Ok(None);
        }
        if buf.len() < length as usize {
            buf.reserve(length as usize - buf.len());
            return Ok(None);
        }
        let frame = buf.split_to(length as usize);
        let msg = BgpMessage::from_bytes(&frame)?;
        Ok(Some(msg))
    }
}

impl Encoder<BgpMessage> for BgpCodec {
    type Error = BgpMessageWritingError;

    fn encode(&mut self, msg: BgpMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let wire = msg.to_bytes()?;
        dst.reserve(wire.len());
        dst.put_slice(&wire);
        Ok(())
    }
}

/// Push-style frame reassembler over [`BgpCodec`] for callers that own
/// their transport instead of going through `Framed`.
///
/// Feed arbitrary chunks with [`append`](Self::append), then drain with
/// [`next_message`](Self::next_message) until it yields `None`. Message
/// boundaries never depend on how the input was chunked.
#[derive(Debug, Default)]
pub struct BgpFramer {
    codec: BgpCodec,
    buffer: BytesMut,
}

impl BgpFramer {
    pub fn new() -> BgpFramer {
        Self::default()
    }

    pub fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn next_message(&mut self) -> Result<Option<BgpMessage>, BgpCodecDecoderError> {
        self.codec.decode(&mut self.buffer)
    }

    /// Bytes currently held waiting for a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open::BgpOpenMessage;
    use std::net::Ipv4Addr;

    fn keepalive_wire() -> Vec<u8> {
        BgpMessage::KeepAlive.to_bytes().unwrap().to_vec()
    }

    #[test]
    fn test_partial_frame_buffers() {
        let wire = keepalive_wire();
        let mut framer = BgpFramer::new();
        framer.append(&wire[..10]);
        assert_eq!(framer.next_message(), Ok(None));
        assert_eq!(framer.buffered(), 10);
        framer.append(&wire[10..]);
        assert_eq!(framer.next_message(), Ok(Some(BgpMessage::KeepAlive)));
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_concatenated_frames() {
        let open = BgpMessage::Open(BgpOpenMessage::new(
            65001,
            180,
            Ipv4Addr::new(192, 0, 2, 1),
        ));
        let mut wire = open.to_bytes().unwrap().to_vec();
        wire.extend_from_slice(&keepalive_wire());
        let mut framer = BgpFramer::new();
        framer.append(&wire);
        assert_eq!(framer.next_message(), Ok(Some(open)));
        assert_eq!(framer.next_message(), Ok(Some(BgpMessage::KeepAlive)));
        assert_eq!(framer.next_message(), Ok(None));
    }

    #[test]
    fn test_chunking_invariance() {
        // feeding byte-at-a-time yields the same messages as one big chunk
        let open = BgpMessage::Open(BgpOpenMessage::new(
            65002,
            90,
            Ipv4Addr::new(192, 0, 2, 2),
        ));
        let mut wire = keepalive_wire();
        wire.extend_from_slice(&open.to_bytes().unwrap());
        let mut framer = BgpFramer::new();
        let mut messages = Vec::new();
        for byte in wire {
            framer.append(&[byte]);
            while let Some(msg) = framer.next_message().unwrap() {
                messages.push(msg);
            }
        }
        assert_eq!(messages, vec![BgpMessage::KeepAlive, open]);
    }

    #[test]
    fn test_resync_after_corrupt_length() {
        // first header declares length 5, valid keepalive follows
        let mut wire = BGP_MARKER.to_vec();
        wire.extend_from_slice(&[0x00, 0x05, 0x04]);
        wire.extend_from_slice(&keepalive_wire());
        let mut framer = BgpFramer::new();
        framer.append(&wire);
        assert_eq!(framer.next_message(), Ok(None));
        assert_eq!(framer.next_message(), Ok(Some(BgpMessage::KeepAlive)));
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_resync_discards_markerless_garbage() {
        let garbage = [0x00u8; 32];
        let mut framer = BgpFramer::new();
        framer.append(&garbage);
        assert_eq!(framer.next_message(), Ok(None));
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_oversized_length_resyncs() {
        let mut wire = BGP_MARKER.to_vec();
        wire.extend_from_slice(&[0xff, 0xff, 0x02]);
        wire.extend_from_slice(&keepalive_wire());
        let mut framer = BgpFramer::new();
        framer.append(&wire);
        assert_eq!(framer.next_message(), Ok(None));
        assert_eq!(framer.next_message(), Ok(Some(BgpMessage::KeepAlive)));
    }

    #[test]
    fn test_resync_skips_extended_marker_run() {
        // a corrupt length of 0xffff continues the 0xff marker run; the
        // recovery scan must not latch onto an overlapping pseudo-marker
        // inside the bad header, which would leave the stream misaligned
        // and swallow the valid frame behind it
        let mut wire = BGP_MARKER.to_vec();
        wire.extend_from_slice(&[0xff, 0xff, 0x02]);
        wire.extend_from_slice(&keepalive_wire());
        let mut framer = BgpFramer::new();
        framer.append(&wire);
        let mut recovered = None;
        for _ in 0..4 {
            if let Some(msg) = framer.next_message().unwrap() {
                recovered = Some(msg);
                break;
            }
        }
        assert_eq!(recovered, Some(BgpMessage::KeepAlive));
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_decode_error_consumes_frame() {
        // undefined message type 5; the frame is dropped, stream continues
        let mut wire = BGP_MARKER.to_vec();
        wire.extend_from_slice(&[0x00, 0x13, 0x05]);
        wire.extend_from_slice(&keepalive_wire());
        let mut framer = BgpFramer::new();
        framer.append(&wire);
        assert!(matches!(
            framer.next_message(),
            Err(BgpCodecDecoderError::BgpMessageParsingError(_))
        ));
        assert_eq!(framer.next_message(), Ok(Some(BgpMessage::KeepAlive)));
    }

    #[test]
    fn test_encoder_writes_wire() {
        let mut codec = BgpCodec;
        let mut buf = BytesMut::new();
        codec.encode(BgpMessage::KeepAlive, &mut buf).unwrap();
        assert_eq!(buf.to_vec(), keepalive_wire());
    }
}
