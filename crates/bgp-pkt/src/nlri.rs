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

//! IPv4 unicast NLRI wire encoding.
//!
//! Each entry is a one-octet prefix length followed by the minimal number of
//! prefix octets, `ceil(prefix_length / 8)`, zero-extended to four octets
//! when reconstructing the address.

use bytes::{BufMut, BytesMut};
use ipnet::Ipv4Net;
use nom::{
    bytes::complete::take,
    combinator::map_res,
    error::ErrorKind,
    number::complete::be_u8,
    IResult,
};
use std::{
    fmt::{Display, Formatter},
    net::Ipv4Addr,
};

const IPV4_MAX_PREFIX_LEN: u8 = 32;

/// Number of octets a prefix of the given bit length occupies on the wire.
const fn prefix_octets(prefix_len: u8) -> usize {
    (prefix_len as usize).div_ceil(8)
}

/// Parse a sequence of NLRI entries until the buffer is exhausted.
///
/// A declared prefix length with too few remaining octets is an error, never
/// a silent truncation.
pub fn parse_nlri(buf: &[u8]) -> Result<Vec<Ipv4Net>, NlriParsingError> {
    let mut routes = Vec::new();
    let mut rem = buf;
    while !rem.is_empty() {
        match parse_prefix(rem) {
            Ok((next, net)) => {
                routes.push(net);
                rem = next;
            }
            Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => return Err(err),
            Err(nom::Err::Incomplete(_)) => return Err(NlriParsingError::NomError(ErrorKind::Eof)),
        }
    }
    Ok(routes)
}

/// Wire size of the given prefixes in NLRI encoding.
pub fn nlri_len(prefixes: &[Ipv4Net]) -> usize {
    prefixes
        .iter()
        .map(|net| 1 + prefix_octets(net.prefix_len()))
        .sum()
}

/// Encode prefixes in NLRI form, emitting only the significant octets of each
/// network address.
pub fn encode_nlri(prefixes: &[Ipv4Net], buf: &mut BytesMut) {
    for net in prefixes {
        let octets = net.network().octets();
        buf.put_u8(net.prefix_len());
        buf.put_slice(&octets[..prefix_octets(net.prefix_len())]);
    }
}

fn parse_prefix(buf: &[u8]) -> IResult<&[u8], Ipv4Net, NlriParsingError> {
    let (buf, prefix_len) = map_res(be_u8, |len| {
        if len <= IPV4_MAX_PREFIX_LEN {
            Ok(len)
        } else {
            Err(NlriParsingError::InvalidPrefixLength(len))
        }
    })(buf)?;
    let (buf, prefix_bytes) = take(prefix_octets(prefix_len))(buf)?;
    let mut octets = [0u8; 4];
    octets[..prefix_bytes.len()].copy_from_slice(prefix_bytes);
    let net = Ipv4Net::new(Ipv4Addr::from(octets), prefix_len)
        .map_err(|_| nom::Err::Error(NlriParsingError::InvalidPrefixLength(prefix_len)))?;
    Ok((buf, net))
}

/// NLRI parsing errors
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NlriParsingError {
    /// Errors triggered by the nom parser, see [`nom::error::ErrorKind`] for
    /// additional information.
    NomError(ErrorKind),
    InvalidPrefixLength(u8),
}

impl<'a> nom::error::ParseError<&'a [u8]> for NlriParsingError {
    fn from_error_kind(_input: &'a [u8], kind: ErrorKind) -> Self {
        Self::NomError(kind)
    }

    fn append(_input: &'a [u8], _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a> nom::error::FromExternalError<&'a [u8], NlriParsingError> for NlriParsingError {
    fn from_external_error(_input: &'a [u8], _kind: ErrorKind, error: NlriParsingError) -> Self {
        error
    }
}

impl Display for NlriParsingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NomError(kind) => write!(f, "NomError({})", kind.description()),
            Self::InvalidPrefixLength(len) => write!(f, "InvalidPrefixLength({len})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(prefixes: &[Ipv4Net]) {
        let mut buf = BytesMut::new();
        encode_nlri(prefixes, &mut buf);
        assert_eq!(buf.len(), nlri_len(prefixes));
        assert_eq!(parse_nlri(&buf), Ok(prefixes.to_vec()));
    }

    #[test]
    fn test_parse_partial_octet_prefix() {
        // /24 prefix carried in three octets, zero-extended to 192.168.10.0
        let good_wire = [24, 192, 168, 10];
        let routes = parse_nlri(&good_wire).unwrap();
        assert_eq!(
            routes,
            vec![Ipv4Net::new(Ipv4Addr::new(192, 168, 10, 0), 24).unwrap()]
        );
    }

    #[test]
    fn test_round_trip_all_prefix_lengths() {
        for prefix_len in 0..=32 {
            let net = Ipv4Net::new(Ipv4Addr::new(10, 20, 30, 40), prefix_len)
                .unwrap()
                .trunc();
            round_trip(&[net]);
        }
    }

    #[test]
    fn test_multiple_entries() {
        round_trip(&[
            "10.0.0.0/8".parse().unwrap(),
            "192.168.10.0/24".parse().unwrap(),
            "0.0.0.0/0".parse().unwrap(),
            "203.0.113.7/32".parse().unwrap(),
        ]);
    }

    #[test]
    fn test_truncated_prefix_bytes() {
        // /24 declares three prefix octets, only two present
        let bad_wire = [24, 192, 168];
        assert!(matches!(
            parse_nlri(&bad_wire),
            Err(NlriParsingError::NomError(_))
        ));
    }

    #[test]
    fn test_invalid_prefix_length() {
        let bad_wire = [33, 192, 168, 10, 1, 0];
        assert_eq!(
            parse_nlri(&bad_wire),
            Err(NlriParsingError::InvalidPrefixLength(33))
        );
    }
}
