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

//! Representations for BGP Update message

use bytes::{BufMut, Bytes, BytesMut};
use ipnet::Ipv4Net;
use nom::{error::ErrorKind, multi::length_data, number::complete::be_u16, IResult};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{
    nlri::{encode_nlri, nlri_len, parse_nlri, NlriParsingError},
    BgpMessageWritingError,
};

/// BGP Update message
/// ```text
/// +-----------------------------------------------------+
/// |   Withdrawn Routes Length (2 octets)                |
/// +-----------------------------------------------------+
/// |   Withdrawn Routes (variable)                       |
/// +-----------------------------------------------------+
/// |   Total Path Attribute Length (2 octets)            |
/// +-----------------------------------------------------+
/// |   Path Attributes (variable)                        |
/// +-----------------------------------------------------+
/// |   Network Layer Reachability Information (variable) |
/// +-----------------------------------------------------+
/// ```
///
/// Path attributes are carried as opaque bytes and never interpreted; the
/// speaker stores them alongside the routes they announce.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BgpUpdateMessage {
    withdrawn_routes: Vec<Ipv4Net>,
    path_attributes: Bytes,
    nlri: Vec<Ipv4Net>,
}

impl BgpUpdateMessage {
    pub fn new(
        withdrawn_routes: Vec<Ipv4Net>,
        path_attributes: Bytes,
        nlri: Vec<Ipv4Net>,
    ) -> BgpUpdateMessage {
        BgpUpdateMessage {
            withdrawn_routes,
            path_attributes,
            nlri,
        }
    }

    pub const fn withdrawn_routes(&self) -> &Vec<Ipv4Net> {
        &self.withdrawn_routes
    }

    pub const fn path_attributes(&self) -> &Bytes {
        &self.path_attributes
    }

    pub const fn nlri(&self) -> &Vec<Ipv4Net> {
        &self.nlri
    }

    pub fn to_payload(&self) -> Result<Bytes, BgpMessageWritingError> {
        if self.path_attributes.len() > u16::MAX as usize {
            return Err(BgpMessageWritingError::PathAttributesTooLong(
                self.path_attributes.len(),
            ));
        }
        let mut buf = BytesMut::with_capacity(
            4 + nlri_len(&self.withdrawn_routes)
                + self.path_attributes.len()
                + nlri_len(&self.nlri),
        );
        buf.put_u16(nlri_len(&self.withdrawn_routes) as u16);
        encode_nlri(&self.withdrawn_routes, &mut buf);
        buf.put_u16(self.path_attributes.len() as u16);
        buf.put_slice(&self.path_attributes);
        encode_nlri(&self.nlri, &mut buf);
        Ok(buf.freeze())
    }

    /// Parse the UPDATE payload. The announced NLRI runs from the end of the
    /// path attributes to the end of the message.
    pub fn from_payload(payload: &[u8]) -> Result<BgpUpdateMessage, BgpUpdateMessageParsingError> {
        match parse_update_payload(payload) {
            Ok((_, update)) => Ok(update),
            Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => Err(err),
            Err(nom::Err::Incomplete(_)) => {
                Err(BgpUpdateMessageParsingError::NomError(ErrorKind::Eof))
            }
        }
    }
}

fn parse_update_payload(
    buf: &[u8],
) -> IResult<&[u8], BgpUpdateMessage, BgpUpdateMessageParsingError> {
    let (buf, withdrawn_buf) = length_data(be_u16)(buf)?;
    let withdrawn_routes = parse_nlri(withdrawn_buf)
        .map_err(|err| nom::Err::Error(BgpUpdateMessageParsingError::WithdrawnRoutesError(err)))?;
    let (buf, path_attributes) = length_data(be_u16)(buf)?;
    let nlri = parse_nlri(buf)
        .map_err(|err| nom::Err::Error(BgpUpdateMessageParsingError::NlriError(err)))?;
    Ok((
        &buf[buf.len()..],
        BgpUpdateMessage::new(
            withdrawn_routes,
            Bytes::copy_from_slice(path_attributes),
            nlri,
        ),
    ))
}

/// BGP Update Message Parsing errors
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BgpUpdateMessageParsingError {
    /// Errors triggered by the nom parser, see [`nom::error::ErrorKind`] for
    /// additional information.
    NomError(ErrorKind),
    WithdrawnRoutesError(NlriParsingError),
    NlriError(NlriParsingError),
}

impl<'a> nom::error::ParseError<&'a [u8]> for BgpUpdateMessageParsingError {
    fn from_error_kind(_input: &'a [u8], kind: ErrorKind) -> Self {
        Self::NomError(kind)
    }

    fn append(_input: &'a [u8], _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl Display for BgpUpdateMessageParsingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NomError(kind) => write!(f, "NomError({})", kind.description()),
            Self::WithdrawnRoutesError(err) => write!(f, "WithdrawnRoutesError({err})"),
            Self::NlriError(err) => write!(f, "NlriError({err})"),
        }
    }
}
