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

use minibgp_pkt::BgpMessageWritingError;
use std::fmt::{Display, Formatter};

/// Session states for the reduced BGP FSM. The connection is handed to the
/// session already established, so the RFC 4271 Connect and Active states
/// are collapsed into [`FsmState::Idle`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FsmState {
    Idle,
    OpenSent,
    OpenConfirm,
    Established,
}

impl Display for FsmState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FsmState::Idle => write!(f, "Idle"),
            FsmState::OpenSent => write!(f, "OpenSent"),
            FsmState::OpenConfirm => write!(f, "OpenConfirm"),
            FsmState::Established => write!(f, "Established"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FsmStateError {
    BgpMessageWritingError(BgpMessageWritingError),
}

impl From<BgpMessageWritingError> for FsmStateError {
    fn from(value: BgpMessageWritingError) -> Self {
        FsmStateError::BgpMessageWritingError(value)
    }
}

impl Display for FsmStateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FsmStateError::BgpMessageWritingError(err) => {
                write!(f, "BgpMessageWritingError({err:?})")
            }
        }
    }
}
