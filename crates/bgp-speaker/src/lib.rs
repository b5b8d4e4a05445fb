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

//! Minimal BGP-4 speaker: a per-peer session FSM over a framed transport,
//! resettable hold/keepalive timers, and a routing information base fed by
//! the peer's UPDATE messages.

pub mod events;
pub mod fsm;
pub mod rib;
pub mod session;

#[cfg(test)]
mod session_test;
