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

//! BGP PDU data representation for a minimal BGP-4 speaker.
//!
//! Only the message subset exercised by the speaker is modeled: OPEN,
//! UPDATE, NOTIFICATION, and KEEPALIVE. Path attributes are carried as
//! opaque bytes; capability negotiation and multiprotocol NLRI are not
//! supported.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{
    iana::{BgpMessageType, UndefinedBgpMessageType},
    notification::{BgpNotificationMessage, BgpNotificationMessageParsingError},
    open::{BgpOpenMessage, BgpOpenMessageParsingError},
    update::{BgpUpdateMessage, BgpUpdateMessageParsingError},
};

pub mod codec;
pub mod iana;
pub mod nlri;
pub mod notification;
pub mod open;
pub mod update;

/// Synchronization marker prefixing every message. A fixed constant in this
/// subset; its content is not authenticated.
pub const BGP_MARKER: [u8; 16] = [0xff; 16];

/// Min message size in BGP is 19 octets. They're counted from
/// 16-octets synchronization marker, 2-octets length, and 1 octet for type.
pub const BGP_MIN_MESSAGE_LENGTH: u16 = 19;

/// [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271) defined max length as 4096.
pub const BGP_MAX_MESSAGE_LENGTH: u16 = 4096;

/// BGP version supported by this implementation.
pub const BGP_VERSION: u8 = 4;

/// BGP message wire format as defined by [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271#section-4.1)
/// Here we don't keep the length and type in memory. The type is inferred by
/// the enum value, while the length is computed at serialization time.
///
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                                                               +
/// |                                                               |
/// +                                                               +
/// |                           Marker                              |
/// +                                                               +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |          Length               |      Type     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum BgpMessage {
    Open(BgpOpenMessage),
    Update(BgpUpdateMessage),
    Notification(BgpNotificationMessage),
    KeepAlive,
}

impl BgpMessage {
    /// Get the BGP message IANA type
    pub const fn get_type(&self) -> BgpMessageType {
        match self {
            Self::Open(_) => BgpMessageType::Open,
            Self::Update(_) => BgpMessageType::Update,
            Self::Notification(_) => BgpMessageType::Notification,
            Self::KeepAlive => BgpMessageType::KeepAlive,
        }
    }

    fn payload(&self) -> Result<Bytes, BgpMessageWritingError> {
        match self {
            Self::Open(open) => open.to_payload(),
            Self::Update(update) => update.to_payload(),
            Self::Notification(notif) => Ok(notif.to_payload()),
            Self::KeepAlive => Ok(Bytes::new()),
        }
    }

    /// Serialize into wire format: marker, big-endian total length, type
    /// octet, then the payload verbatim.
    pub fn to_bytes(&self) -> Result<Bytes, BgpMessageWritingError> {
        let payload = self.payload()?;
        let total = BGP_MIN_MESSAGE_LENGTH as usize + payload.len();
        if total > BGP_MAX_MESSAGE_LENGTH as usize {
            return Err(BgpMessageWritingError::PayloadTooLarge(total));
        }
        let mut buf = BytesMut::with_capacity(total);
        buf.put_slice(&BGP_MARKER);
        buf.put_u16(total as u16);
        buf.put_u8(self.get_type().into());
        buf.put_slice(&payload);
        Ok(buf.freeze())
    }

    /// Deserialize a single complete message. The buffer must hold the whole
    /// frame; anything past the 19-octet header is taken as the payload.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, BgpMessageParsingError> {
        if buf.len() < BGP_MIN_MESSAGE_LENGTH as usize {
            return Err(BgpMessageParsingError::Incomplete(buf.len()));
        }
        let msg_type = BgpMessageType::try_from(buf[18])?;
        let payload = &buf[BGP_MIN_MESSAGE_LENGTH as usize..];
        let msg = match msg_type {
            BgpMessageType::Open => Self::Open(BgpOpenMessage::from_payload(payload)?),
            BgpMessageType::Update => Self::Update(BgpUpdateMessage::from_payload(payload)?),
            BgpMessageType::Notification => {
                Self::Notification(BgpNotificationMessage::from_payload(payload)?)
            }
            BgpMessageType::KeepAlive => {
                if !payload.is_empty() {
                    return Err(BgpMessageParsingError::BadMessageLength(buf.len() as u16));
                }
                Self::KeepAlive
            }
        };
        Ok(msg)
    }
}

/// BGP Message level parsing errors
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BgpMessageParsingError {
    /// Fewer bytes available than the 19-octet fixed header.
    Incomplete(usize),
    BadMessageLength(u16),
    UndefinedBgpMessageType(UndefinedBgpMessageType),
    BgpOpenMessageParsingError(BgpOpenMessageParsingError),
    BgpUpdateMessageParsingError(BgpUpdateMessageParsingError),
    BgpNotificationMessageParsingError(BgpNotificationMessageParsingError),
}

impl From<UndefinedBgpMessageType> for BgpMessageParsingError {
    fn from(value: UndefinedBgpMessageType) -> Self {
        Self::UndefinedBgpMessageType(value)
    }
}

impl From<BgpOpenMessageParsingError> for BgpMessageParsingError {
    fn from(value: BgpOpenMessageParsingError) -> Self {
        Self::BgpOpenMessageParsingError(value)
    }
}

impl From<BgpUpdateMessageParsingError> for BgpMessageParsingError {
    fn from(value: BgpUpdateMessageParsingError) -> Self {
        Self::BgpUpdateMessageParsingError(value)
    }
}

impl From<BgpNotificationMessageParsingError> for BgpMessageParsingError {
    fn from(value: BgpNotificationMessageParsingError) -> Self {
        Self::BgpNotificationMessageParsingError(value)
    }
}

impl Display for BgpMessageParsingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incomplete(have) => write!(f, "Incomplete({have})"),
            Self::BadMessageLength(length) => write!(f, "BadMessageLength({length})"),
            Self::UndefinedBgpMessageType(t) => write!(f, "UndefinedBgpMessageType({})", t.0),
            Self::BgpOpenMessageParsingError(err) => {
                write!(f, "BgpOpenMessageParsingError({err})")
            }
            Self::BgpUpdateMessageParsingError(err) => {
                write!(f, "BgpUpdateMessageParsingError({err})")
            }
            Self::BgpNotificationMessageParsingError(err) => {
                write!(f, "BgpNotificationMessageParsingError({err})")
            }
        }
    }
}

/// BGP Message serialization errors
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BgpMessageWritingError {
    StdIoError(String),
    /// Total message length would exceed [`BGP_MAX_MESSAGE_LENGTH`].
    PayloadTooLarge(usize),
    /// OPEN optional parameters don't fit the one-octet length field.
    OptionalParametersTooLong(usize),
    /// UPDATE path attributes don't fit the two-octet length field.
    PathAttributesTooLong(usize),
}

impl From<std::io::Error> for BgpMessageWritingError {
    fn from(error: std::io::Error) -> Self {
        Self::StdIoError(error.to_string())
    }
}

impl Display for BgpMessageWritingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StdIoError(err) => write!(f, "StdIoError({err})"),
            Self::PayloadTooLarge(len) => write!(f, "PayloadTooLarge({len})"),
            Self::OptionalParametersTooLong(len) => {
                write!(f, "OptionalParametersTooLong({len})")
            }
            Self::PathAttributesTooLong(len) => write!(f, "PathAttributesTooLong({len})"),
        }
    }
}
