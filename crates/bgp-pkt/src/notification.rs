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

//! Representations for BGP Notification message

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::iana::{
    BgpErrorCode, MessageHeaderErrorSubCode, OpenMessageErrorSubCode, UndefinedBgpErrorCode,
    UpdateMessageErrorSubCode,
};

/// BGP Notification message
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | Error code    | Error subcode |   Data (variable)             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The sub-code is kept as a raw octet; its meaning depends on the error
/// code and unknown values are preserved as received.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BgpNotificationMessage {
    code: BgpErrorCode,
    sub_code: u8,
    data: Bytes,
}

impl BgpNotificationMessage {
    pub fn new(code: BgpErrorCode, sub_code: u8, data: Bytes) -> BgpNotificationMessage {
        BgpNotificationMessage {
            code,
            sub_code,
            data,
        }
    }

    pub fn message_header_error(
        sub_code: MessageHeaderErrorSubCode,
        data: Bytes,
    ) -> BgpNotificationMessage {
        Self::new(BgpErrorCode::MessageHeaderError, sub_code as u8, data)
    }

    pub fn open_message_error(
        sub_code: OpenMessageErrorSubCode,
        data: Bytes,
    ) -> BgpNotificationMessage {
        Self::new(BgpErrorCode::OpenMessageError, sub_code as u8, data)
    }

    pub fn update_message_error(
        sub_code: UpdateMessageErrorSubCode,
        data: Bytes,
    ) -> BgpNotificationMessage {
        Self::new(BgpErrorCode::UpdateMessageError, sub_code as u8, data)
    }

    pub fn hold_timer_expired() -> BgpNotificationMessage {
        Self::new(BgpErrorCode::HoldTimerExpired, 0, Bytes::new())
    }

    pub fn finite_state_machine_error() -> BgpNotificationMessage {
        Self::new(BgpErrorCode::FiniteStateMachineError, 0, Bytes::new())
    }

    pub fn cease() -> BgpNotificationMessage {
        Self::new(BgpErrorCode::Cease, 0, Bytes::new())
    }

    pub const fn code(&self) -> BgpErrorCode {
        self.code
    }

    pub const fn sub_code(&self) -> u8 {
        self.sub_code
    }

    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn to_payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(2 + self.data.len());
        buf.put_u8(self.code.into());
        buf.put_u8(self.sub_code);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    pub fn from_payload(
        payload: &[u8],
    ) -> Result<BgpNotificationMessage, BgpNotificationMessageParsingError> {
        let [code, sub_code, data @ ..] = payload else {
            return Err(BgpNotificationMessageParsingError::Incomplete(
                payload.len(),
            ));
        };
        let code = BgpErrorCode::try_from(*code)?;
        Ok(Self::new(code, *sub_code, Bytes::copy_from_slice(data)))
    }
}

/// BGP Notification Message Parsing errors
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BgpNotificationMessageParsingError {
    /// Fewer bytes than the two-octet code and sub-code.
    Incomplete(usize),
    UndefinedBgpErrorCode(UndefinedBgpErrorCode),
}

impl From<UndefinedBgpErrorCode> for BgpNotificationMessageParsingError {
    fn from(value: UndefinedBgpErrorCode) -> Self {
        Self::UndefinedBgpErrorCode(value)
    }
}

impl Display for BgpNotificationMessageParsingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incomplete(have) => write!(f, "Incomplete({have})"),
            Self::UndefinedBgpErrorCode(code) => write!(f, "UndefinedBgpErrorCode({})", code.0),
        }
    }
}
