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

use minibgp_pkt::{
    codec::BgpCodecDecoderError,
    iana::{MessageHeaderErrorSubCode, OpenMessageErrorSubCode, UpdateMessageErrorSubCode},
    notification::BgpNotificationMessage,
    open::{BgpOpenMessage, BgpOpenMessageParsingError},
    update::{BgpUpdateMessage, BgpUpdateMessageParsingError},
    BgpMessageParsingError,
};
use std::fmt::{Display, Formatter};

/// Events driving the session FSM. Produced either by the session's own
/// stream (decoded messages, timer ticks, transport failures) or injected by
/// the embedder.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SessionEvent {
    HoldTimerExpires,
    KeepAliveTimerExpires,
    TcpConnectionFails,
    BgpOpen(BgpOpenMessage),
    KeepAliveMsg,
    UpdateMsg(BgpUpdateMessage),
    NotifMsg(BgpNotificationMessage),
    /// Peer told us our OPEN carried an unsupported version.
    NotifMsgVerErr,
    /// Peer sent a NOTIFICATION we couldn't parse.
    NotifMsgErr,
    BgpHeaderErr(MessageHeaderErrorSubCode),
    BgpOpenMsgErr(OpenMessageErrorSubCode),
    UpdateMsgErr(UpdateMessageErrorSubCode),
}

impl Display for SessionEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::HoldTimerExpires => write!(f, "HoldTimerExpires"),
            SessionEvent::KeepAliveTimerExpires => write!(f, "KeepAliveTimerExpires"),
            SessionEvent::TcpConnectionFails => write!(f, "TcpConnectionFails"),
            SessionEvent::BgpOpen(_) => write!(f, "BgpOpen"),
            SessionEvent::KeepAliveMsg => write!(f, "KeepAliveMsg"),
            SessionEvent::UpdateMsg(_) => write!(f, "UpdateMsg"),
            SessionEvent::NotifMsg(_) => write!(f, "NotifMsg"),
            SessionEvent::NotifMsgVerErr => write!(f, "NotifMsgVerErr"),
            SessionEvent::NotifMsgErr => write!(f, "NotifMsgErr"),
            SessionEvent::BgpHeaderErr(sub) => write!(f, "BgpHeaderErr({sub})"),
            SessionEvent::BgpOpenMsgErr(sub) => write!(f, "BgpOpenMsgErr({sub})"),
            SessionEvent::UpdateMsgErr(sub) => write!(f, "UpdateMsgErr({sub})"),
        }
    }
}

/// Fold codec failures into FSM events so the session loop handles them
/// through the regular per-state dispatch.
impl From<BgpCodecDecoderError> for SessionEvent {
    fn from(value: BgpCodecDecoderError) -> Self {
        match value {
            BgpCodecDecoderError::IoError(_) => SessionEvent::TcpConnectionFails,
            BgpCodecDecoderError::BgpMessageParsingError(err) => match err {
                BgpMessageParsingError::Incomplete(_) | BgpMessageParsingError::BadMessageLength(_) => {
                    SessionEvent::BgpHeaderErr(MessageHeaderErrorSubCode::BadMessageLength)
                }
                BgpMessageParsingError::UndefinedBgpMessageType(_) => {
                    SessionEvent::BgpHeaderErr(MessageHeaderErrorSubCode::BadMessageType)
                }
                BgpMessageParsingError::BgpOpenMessageParsingError(open_err) => match open_err {
                    BgpOpenMessageParsingError::UnsupportedVersionNumber(_) => {
                        SessionEvent::BgpOpenMsgErr(
                            OpenMessageErrorSubCode::UnsupportedVersionNumber,
                        )
                    }
                    BgpOpenMessageParsingError::NomError(_) => {
                        SessionEvent::BgpOpenMsgErr(OpenMessageErrorSubCode::Unspecific)
                    }
                },
                BgpMessageParsingError::BgpUpdateMessageParsingError(update_err) => {
                    match update_err {
                        BgpUpdateMessageParsingError::NomError(_) => SessionEvent::UpdateMsgErr(
                            UpdateMessageErrorSubCode::MalformedAttributeList,
                        ),
                        BgpUpdateMessageParsingError::WithdrawnRoutesError(_)
                        | BgpUpdateMessageParsingError::NlriError(_) => {
                            SessionEvent::UpdateMsgErr(UpdateMessageErrorSubCode::InvalidNetworkField)
                        }
                    }
                }
                BgpMessageParsingError::BgpNotificationMessageParsingError(_) => {
                    SessionEvent::NotifMsgErr
                }
            },
        }
    }
}
