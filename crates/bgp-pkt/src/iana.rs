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

//! IANA-assigned numbers for the subset of BGP-4 implemented by this crate.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, FromRepr};

/// BGP message types as defined by [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271)
#[repr(u8)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum BgpMessageType {
    Open = 1,
    Update = 2,
    Notification = 3,
    KeepAlive = 4,
}

/// BGP Message type is not one of [`BgpMessageType`], the carried value is the
/// undefined code.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct UndefinedBgpMessageType(pub u8);

impl From<BgpMessageType> for u8 {
    fn from(value: BgpMessageType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for BgpMessageType {
    type Error = UndefinedBgpMessageType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match Self::from_repr(value) {
            Some(val) => Ok(val),
            None => Err(UndefinedBgpMessageType(value)),
        }
    }
}

/// NOTIFICATION error codes as defined by [RFC4271](https://datatracker.ietf.org/doc/html/rfc4271#section-4.5)
#[repr(u8)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum BgpErrorCode {
    MessageHeaderError = 1,
    OpenMessageError = 2,
    UpdateMessageError = 3,
    HoldTimerExpired = 4,
    FiniteStateMachineError = 5,
    Cease = 6,
}

/// NOTIFICATION error code is not one of [`BgpErrorCode`].
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct UndefinedBgpErrorCode(pub u8);

impl From<BgpErrorCode> for u8 {
    fn from(value: BgpErrorCode) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for BgpErrorCode {
    type Error = UndefinedBgpErrorCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match Self::from_repr(value) {
            Some(val) => Ok(val),
            None => Err(UndefinedBgpErrorCode(value)),
        }
    }
}

/// Message header error sub-codes for [`BgpErrorCode::MessageHeaderError`].
#[repr(u8)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum MessageHeaderErrorSubCode {
    Unspecific = 0,
    ConnectionNotSynchronized = 1,
    BadMessageLength = 2,
    BadMessageType = 3,
}

/// OPEN message error sub-codes for [`BgpErrorCode::OpenMessageError`].
#[repr(u8)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum OpenMessageErrorSubCode {
    Unspecific = 0,
    UnsupportedVersionNumber = 1,
    BadPeerAs = 2,
    BadBgpIdentifier = 3,
    UnsupportedOptionalParameter = 4,
    UnacceptableHoldTime = 6,
}

/// UPDATE message error sub-codes for [`BgpErrorCode::UpdateMessageError`].
#[repr(u8)]
#[derive(Display, FromRepr, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum UpdateMessageErrorSubCode {
    Unspecific = 0,
    MalformedAttributeList = 1,
    InvalidNetworkField = 10,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgp_message_type() {
        let keepalive_code = 4;
        let undefined_code = 5;
        let keepalive = BgpMessageType::try_from(keepalive_code);
        let undefined = BgpMessageType::try_from(undefined_code);
        let keepalive_u8: u8 = BgpMessageType::KeepAlive.into();
        assert_eq!(keepalive, Ok(BgpMessageType::KeepAlive));
        assert_eq!(keepalive_u8, keepalive_code);
        assert_eq!(undefined, Err(UndefinedBgpMessageType(undefined_code)));
    }

    #[test]
    fn test_bgp_error_code() {
        let hold_code = 4;
        let undefined_code = 7;
        let hold = BgpErrorCode::try_from(hold_code);
        let undefined = BgpErrorCode::try_from(undefined_code);
        let hold_u8: u8 = BgpErrorCode::HoldTimerExpired.into();
        assert_eq!(hold, Ok(BgpErrorCode::HoldTimerExpired));
        assert_eq!(hold_u8, hold_code);
        assert_eq!(undefined, Err(UndefinedBgpErrorCode(undefined_code)));
    }
}
