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

//! Representations for BGP Open message

use bytes::{BufMut, Bytes, BytesMut};
use nom::{
    combinator::map_res,
    error::ErrorKind,
    multi::length_data,
    number::complete::{be_u16, be_u32, be_u8},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    net::Ipv4Addr,
};

use crate::{BgpMessageWritingError, BGP_VERSION};

/// Fixed OPEN fields: version, my AS, hold time, BGP identifier, and the
/// optional parameters length octet.
pub const BGP_OPEN_MIN_PAYLOAD_LENGTH: usize = 10;

/// BGP Open message
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+
/// |    Version    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     My Autonomous System      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           Hold Time           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         BGP Identifier                        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | Opt Parm Len  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// |             Optional Parameters (variable)                    |
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Optional parameters are carried as opaque bytes; capability negotiation
/// is not part of this subset.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BgpOpenMessage {
    version: u8,
    my_as: u16,
    hold_time: u16,
    bgp_id: Ipv4Addr,
    opt_params: Bytes,
}

impl BgpOpenMessage {
    pub fn new(my_as: u16, hold_time: u16, bgp_id: Ipv4Addr) -> BgpOpenMessage {
        Self::with_opt_params(my_as, hold_time, bgp_id, Bytes::new())
    }

    pub fn with_opt_params(
        my_as: u16,
        hold_time: u16,
        bgp_id: Ipv4Addr,
        opt_params: Bytes,
    ) -> BgpOpenMessage {
        BgpOpenMessage {
            version: BGP_VERSION,
            my_as,
            hold_time,
            bgp_id,
            opt_params,
        }
    }

    pub const fn version(&self) -> u8 {
        self.version
    }

    pub const fn my_as(&self) -> u16 {
        self.my_as
    }

    pub const fn hold_time(&self) -> u16 {
        self.hold_time
    }

    pub const fn bgp_id(&self) -> Ipv4Addr {
        self.bgp_id
    }

    pub const fn opt_params(&self) -> &Bytes {
        &self.opt_params
    }

    pub fn to_payload(&self) -> Result<Bytes, BgpMessageWritingError> {
        if self.opt_params.len() > u8::MAX as usize {
            return Err(BgpMessageWritingError::OptionalParametersTooLong(
                self.opt_params.len(),
            ));
        }
        let mut buf = BytesMut::with_capacity(BGP_OPEN_MIN_PAYLOAD_LENGTH + self.opt_params.len());
        buf.put_u8(self.version);
        buf.put_u16(self.my_as);
        buf.put_u16(self.hold_time);
        buf.put_u32(self.bgp_id.into());
        buf.put_u8(self.opt_params.len() as u8);
        buf.put_slice(&self.opt_params);
        Ok(buf.freeze())
    }

    /// Parse the OPEN payload (the bytes following the fixed message header).
    /// Fails on fewer than [`BGP_OPEN_MIN_PAYLOAD_LENGTH`] bytes, a version
    /// other than 4, or a declared optional parameters length exceeding the
    /// remaining bytes.
    pub fn from_payload(payload: &[u8]) -> Result<BgpOpenMessage, BgpOpenMessageParsingError> {
        match parse_open_payload(payload) {
            Ok((rem, open)) => {
                if rem.is_empty() {
                    Ok(open)
                } else {
                    Err(BgpOpenMessageParsingError::NomError(ErrorKind::NonEmpty))
                }
            }
            Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => Err(err),
            Err(nom::Err::Incomplete(_)) => {
                Err(BgpOpenMessageParsingError::NomError(ErrorKind::Eof))
            }
        }
    }
}

fn parse_open_payload(
    buf: &[u8],
) -> IResult<&[u8], BgpOpenMessage, BgpOpenMessageParsingError> {
    let (buf, _version) = map_res(be_u8, |version| {
        if version == BGP_VERSION {
            Ok(version)
        } else {
            Err(BgpOpenMessageParsingError::UnsupportedVersionNumber(version))
        }
    })(buf)?;
    let (buf, my_as) = be_u16(buf)?;
    let (buf, hold_time) = be_u16(buf)?;
    let (buf, bgp_id) = be_u32(buf)?;
    let (buf, opt_params) = length_data(be_u8)(buf)?;
    Ok((
        buf,
        BgpOpenMessage::with_opt_params(
            my_as,
            hold_time,
            Ipv4Addr::from(bgp_id),
            Bytes::copy_from_slice(opt_params),
        ),
    ))
}

/// BGP Open Message Parsing errors
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BgpOpenMessageParsingError {
    /// Errors triggered by the nom parser, see [`nom::error::ErrorKind`] for
    /// additional information.
    NomError(ErrorKind),
    UnsupportedVersionNumber(u8),
}

impl<'a> nom::error::ParseError<&'a [u8]> for BgpOpenMessageParsingError {
    fn from_error_kind(_input: &'a [u8], kind: ErrorKind) -> Self {
        Self::NomError(kind)
    }

    fn append(_input: &'a [u8], _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a> nom::error::FromExternalError<&'a [u8], BgpOpenMessageParsingError>
    for BgpOpenMessageParsingError
{
    fn from_external_error(
        _input: &'a [u8],
        _kind: ErrorKind,
        error: BgpOpenMessageParsingError,
    ) -> Self {
        error
    }
}

impl Display for BgpOpenMessageParsingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NomError(kind) => write!(f, "NomError({})", kind.description()),
            Self::UnsupportedVersionNumber(version) => {
                write!(f, "UnsupportedVersionNumber({version})")
            }
        }
    }
}
