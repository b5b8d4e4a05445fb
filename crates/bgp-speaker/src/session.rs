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

//! Per-peer BGP session: FSM driving a framed transport, hold/keepalive
//! timers, and the peer's [`Rib`].

use async_trait::async_trait;
use chrono::prelude::*;
use futures::Stream;
use futures_util::{FutureExt, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Display,
    future::Future,
    io,
    net::{Ipv4Addr, SocketAddr},
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_util::codec::Framed;

use minibgp_pkt::{
    codec::BgpCodec,
    iana::{BgpErrorCode, OpenMessageErrorSubCode},
    notification::BgpNotificationMessage,
    open::BgpOpenMessage,
    BgpMessage,
};

use crate::{
    events::SessionEvent,
    fsm::{FsmState, FsmStateError},
    rib::{Rib, SharedRib},
};
use bytes::Bytes;

#[derive(Debug, Copy, Clone)]
pub struct SessionStats {
    created: DateTime<Utc>,
    messages_received: u64,
    messages_sent: u64,
    open_received: u64,
    open_sent: u64,
    update_received: u64,
    update_sent: u64,
    keepalive_received: u64,
    keepalive_sent: u64,
    notification_received: u64,
    notification_sent: u64,
    last_received: Option<DateTime<Utc>>,
    last_sent: Option<DateTime<Utc>>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            created: Utc::now(),
            messages_received: 0,
            messages_sent: 0,
            open_received: 0,
            open_sent: 0,
            update_received: 0,
            update_sent: 0,
            keepalive_received: 0,
            keepalive_sent: 0,
            notification_received: 0,
            notification_sent: 0,
            last_received: None,
            last_sent: None,
        }
    }
}

impl SessionStats {
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub const fn messages_received(&self) -> u64 {
        self.messages_received
    }

    pub const fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    pub const fn open_received(&self) -> u64 {
        self.open_received
    }

    pub const fn open_sent(&self) -> u64 {
        self.open_sent
    }

    pub const fn update_received(&self) -> u64 {
        self.update_received
    }

    pub const fn update_sent(&self) -> u64 {
        self.update_sent
    }

    pub const fn keepalive_received(&self) -> u64 {
        self.keepalive_received
    }

    pub const fn keepalive_sent(&self) -> u64 {
        self.keepalive_sent
    }

    pub const fn notification_received(&self) -> u64 {
        self.notification_received
    }

    pub const fn notification_sent(&self) -> u64 {
        self.notification_sent
    }

    pub const fn last_received(&self) -> Option<DateTime<Utc>> {
        self.last_received
    }

    pub const fn last_sent(&self) -> Option<DateTime<Utc>> {
        self.last_sent
    }
}

/// User configuration for a session.
///
/// Durations are unsigned seconds. A configured hold time of zero disables
/// both the hold and keepalive timers for the session, whatever the peer
/// offers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    my_as: u16,
    my_bgp_id: Ipv4Addr,
    peer_as: Option<u16>,
    hold_timer_duration: u16,
}

impl SessionConfig {
    pub fn new(my_as: u16, my_bgp_id: Ipv4Addr) -> SessionConfig {
        SessionConfig {
            my_as,
            my_bgp_id,
            peer_as: None,
            hold_timer_duration: 180,
        }
    }

    pub const fn my_as(&self) -> u16 {
        self.my_as
    }

    pub const fn my_bgp_id(&self) -> Ipv4Addr {
        self.my_bgp_id
    }

    pub const fn peer_as(&self) -> Option<u16> {
        self.peer_as
    }

    pub const fn hold_timer_duration(&self) -> Duration {
        Duration::from_secs(self.hold_timer_duration as u64)
    }
}

#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn new(my_as: u16, my_bgp_id: Ipv4Addr) -> SessionConfigBuilder {
        Self {
            config: SessionConfig::new(my_as, my_bgp_id),
        }
    }

    pub const fn peer_as(mut self, value: u16) -> Self {
        self.config.peer_as = Some(value);
        self
    }

    pub const fn hold_timer_duration(mut self, value: u16) -> Self {
        self.config.hold_timer_duration = value;
        self
    }

    pub const fn build(self) -> SessionConfig {
        self.config
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, strum_macros::Display)]
pub enum TerminationReason {
    HoldTimerExpired,
    ConnectionFailed,
    NotificationReceived,
    FsmError,
    HeaderError,
    OpenMessageError,
    UpdateMessageError,
    AdminShutdown,
}

/// Recorded exactly once, by the first [`Session::terminate`] call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SessionTermination {
    reason: TerminationReason,
    at: DateTime<Utc>,
}

impl SessionTermination {
    fn new(reason: TerminationReason) -> SessionTermination {
        SessionTermination {
            reason,
            at: Utc::now(),
        }
    }

    pub const fn reason(&self) -> TerminationReason {
        self.reason
    }

    pub const fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

/// A single BGP session over an already-established transport.
///
/// The session is a [`Stream`] of [`SessionEvent`]s; [`Session::run`] drives
/// it to completion, or the embedder can pull events and feed them back
/// through [`Session::handle_event`] one at a time.
#[derive(Debug)]
pub struct Session<A, I: AsyncRead + AsyncWrite> {
    peer_addr: A,
    state: FsmState,
    config: SessionConfig,
    peer_as: Option<u16>,
    peer_bgp_id: Option<Ipv4Addr>,
    peer_hold_time: Option<u16>,
    inner: Framed<I, BgpCodec>,
    stats: SessionStats,
    keepalive_timer: Option<tokio::time::Interval>,
    keepalive_timer_duration: Duration,
    hold_timer: Option<tokio::time::Interval>,
    hold_timer_duration: Duration,
    rib: SharedRib,
    termination: Option<SessionTermination>,
}

impl<A: Display + Unpin, I: AsyncRead + AsyncWrite + Unpin> Session<A, I> {
    pub fn new(
        peer_addr: A,
        config: SessionConfig,
        rib: SharedRib,
        inner: Framed<I, BgpCodec>,
    ) -> Self {
        Self {
            peer_addr,
            state: FsmState::Idle,
            config,
            peer_as: None,
            peer_bgp_id: None,
            peer_hold_time: None,
            inner,
            stats: SessionStats::default(),
            keepalive_timer: None,
            keepalive_timer_duration: Duration::from_secs(0),
            hold_timer: None,
            hold_timer_duration: config.hold_timer_duration(),
            rib,
            termination: None,
        }
    }

    pub const fn peer_addr(&self) -> &A {
        &self.peer_addr
    }

    pub const fn state(&self) -> FsmState {
        self.state
    }

    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub const fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub const fn peer_as(&self) -> Option<u16> {
        self.peer_as
    }

    pub const fn peer_bgp_id(&self) -> Option<Ipv4Addr> {
        self.peer_bgp_id
    }

    pub const fn peer_hold_time(&self) -> Option<u16> {
        self.peer_hold_time
    }

    pub const fn hold_timer_duration(&self) -> Duration {
        self.hold_timer_duration
    }

    pub const fn keepalive_timer_duration(&self) -> Duration {
        self.keepalive_timer_duration
    }

    pub const fn rib(&self) -> &SharedRib {
        &self.rib
    }

    pub const fn termination(&self) -> Option<&SessionTermination> {
        self.termination.as_ref()
    }

    /// Kick off the session from [`FsmState::Idle`]: send our OPEN and wait
    /// for the peer's. Any other state is a no-op.
    pub async fn start(&mut self) -> Result<(), FsmStateError> {
        if self.state != FsmState::Idle {
            return Ok(());
        }
        self.termination = None;
        if !self.config.hold_timer_duration().is_zero() {
            self.hold_timer_duration = self.config.hold_timer_duration();
            let mut interval = tokio::time::interval(self.hold_timer_duration);
            interval.reset();
            self.hold_timer.replace(interval);
        }
        let open = BgpOpenMessage::new(
            self.config.my_as,
            self.config.hold_timer_duration,
            self.config.my_bgp_id,
        );
        self.send(BgpMessage::Open(open)).await?;
        self.state = FsmState::OpenSent;
        Ok(())
    }

    /// Mark the session dead. Stops both timers and moves to
    /// [`FsmState::Idle`]; subsequent calls (whatever their reason) are
    /// no-ops and the first recorded termination is kept.
    pub fn terminate(&mut self, reason: TerminationReason) {
        if self.state == FsmState::Idle {
            return;
        }
        log::info!(
            "[{}][{}] Terminating session: {reason}",
            self.peer_addr,
            self.state
        );
        self.keepalive_timer.take();
        self.hold_timer.take();
        self.state = FsmState::Idle;
        self.termination = Some(SessionTermination::new(reason));
    }

    /// Drive the session until it terminates. Returns the recorded
    /// termination, if any event caused one.
    pub async fn run(&mut self) -> Result<Option<SessionTermination>, FsmStateError> {
        while self.state != FsmState::Idle {
            let event = match self.next().await {
                Some(event) => event,
                None => SessionEvent::TcpConnectionFails,
            };
            self.handle_event(event).await?;
        }
        Ok(self.termination)
    }

    pub async fn handle_event(
        &mut self,
        event: SessionEvent,
    ) -> Result<SessionEvent, FsmStateError> {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("[{}][{}] handling: {}", self.peer_addr, self.state, event);
        }
        let pre_state = self.state;
        match pre_state {
            // Events arriving after termination are ignored
            FsmState::Idle => {}
            FsmState::OpenSent => self.handle_open_sent_event(&event).await?,
            FsmState::OpenConfirm => self.handle_open_confirm_event(&event).await?,
            FsmState::Established => self.handle_established_event(&event).await?,
        }
        if self.state != pre_state {
            log::info!(
                "[{}][{}] Transitioned from {pre_state} on event: {event}",
                self.peer_addr,
                self.state
            );
        }
        Ok(event)
    }

    async fn handle_open_sent_event(&mut self, event: &SessionEvent) -> Result<(), FsmStateError> {
        match event {
            SessionEvent::HoldTimerExpires => {
                let notif = BgpNotificationMessage::hold_timer_expired();
                self.send_notification(notif).await;
                self.terminate(TerminationReason::HoldTimerExpired);
            }
            SessionEvent::BgpOpen(open) => {
                self.read_open_msg(open);
                self.set_negotiated_timers();
                self.start_timers();
                self.send_keepalive().await;
                if self.termination.is_none() {
                    self.state = FsmState::OpenConfirm;
                }
            }
            SessionEvent::TcpConnectionFails => {
                self.terminate(TerminationReason::ConnectionFailed);
            }
            SessionEvent::BgpHeaderErr(sub) => {
                let notif = BgpNotificationMessage::message_header_error(*sub, Bytes::new());
                self.send_notification(notif).await;
                self.terminate(TerminationReason::HeaderError);
            }
            SessionEvent::BgpOpenMsgErr(sub) => {
                let notif = BgpNotificationMessage::open_message_error(*sub, Bytes::new());
                self.send_notification(notif).await;
                self.terminate(TerminationReason::OpenMessageError);
            }
            SessionEvent::NotifMsgVerErr | SessionEvent::NotifMsg(_) => {
                self.terminate(TerminationReason::NotificationReceived);
            }
            SessionEvent::NotifMsgErr => {
                log::error!(
                    "[{}][{}] Error parsing notification message from peer",
                    self.peer_addr,
                    self.state
                );
            }
            SessionEvent::KeepAliveMsg
            | SessionEvent::UpdateMsg(_)
            | SessionEvent::UpdateMsgErr(_)
            | SessionEvent::KeepAliveTimerExpires => {
                let notif = BgpNotificationMessage::finite_state_machine_error();
                self.send_notification(notif).await;
                self.terminate(TerminationReason::FsmError);
            }
        }
        Ok(())
    }

    async fn handle_open_confirm_event(
        &mut self,
        event: &SessionEvent,
    ) -> Result<(), FsmStateError> {
        match event {
            SessionEvent::HoldTimerExpires => {
                let notif = BgpNotificationMessage::hold_timer_expired();
                self.send_notification(notif).await;
                self.terminate(TerminationReason::HoldTimerExpired);
            }
            SessionEvent::KeepAliveTimerExpires => {
                self.send_keepalive().await;
            }
            SessionEvent::KeepAliveMsg => {
                if let Some(interval) = self.hold_timer.as_mut() {
                    interval.reset()
                }
                self.state = FsmState::Established;
            }
            SessionEvent::TcpConnectionFails => {
                self.terminate(TerminationReason::ConnectionFailed);
            }
            SessionEvent::BgpHeaderErr(sub) => {
                let notif = BgpNotificationMessage::message_header_error(*sub, Bytes::new());
                self.send_notification(notif).await;
                self.terminate(TerminationReason::HeaderError);
            }
            SessionEvent::BgpOpenMsgErr(sub) => {
                let notif = BgpNotificationMessage::open_message_error(*sub, Bytes::new());
                self.send_notification(notif).await;
                self.terminate(TerminationReason::OpenMessageError);
            }
            SessionEvent::NotifMsgVerErr | SessionEvent::NotifMsg(_) => {
                self.terminate(TerminationReason::NotificationReceived);
            }
            SessionEvent::NotifMsgErr => {
                log::error!(
                    "[{}][{}] Error parsing notification message from peer",
                    self.peer_addr,
                    self.state
                );
            }
            SessionEvent::BgpOpen(_)
            | SessionEvent::UpdateMsg(_)
            | SessionEvent::UpdateMsgErr(_) => {
                let notif = BgpNotificationMessage::finite_state_machine_error();
                self.send_notification(notif).await;
                self.terminate(TerminationReason::FsmError);
            }
        }
        Ok(())
    }

    async fn handle_established_event(
        &mut self,
        event: &SessionEvent,
    ) -> Result<(), FsmStateError> {
        match event {
            SessionEvent::HoldTimerExpires => {
                let notif = BgpNotificationMessage::hold_timer_expired();
                self.send_notification(notif).await;
                self.terminate(TerminationReason::HoldTimerExpired);
            }
            SessionEvent::KeepAliveTimerExpires => {
                self.send_keepalive().await;
            }
            SessionEvent::KeepAliveMsg => {
                if let Some(interval) = self.hold_timer.as_mut() {
                    interval.reset()
                }
            }
            SessionEvent::UpdateMsg(update) => {
                if let Some(interval) = self.hold_timer.as_mut() {
                    interval.reset()
                }
                let outcome = self.rib.lock().await.apply_update(update);
                log::debug!(
                    "[{}][{}] Applied update: {} announced, {} withdrawn, {} withdrawals ignored",
                    self.peer_addr,
                    self.state,
                    outcome.announced,
                    outcome.withdrawn,
                    outcome.missing_withdrawals
                );
            }
            SessionEvent::UpdateMsgErr(sub) => {
                let notif = BgpNotificationMessage::update_message_error(*sub, Bytes::new());
                self.send_notification(notif).await;
                self.terminate(TerminationReason::UpdateMessageError);
            }
            SessionEvent::TcpConnectionFails => {
                self.terminate(TerminationReason::ConnectionFailed);
            }
            SessionEvent::NotifMsgVerErr | SessionEvent::NotifMsg(_) => {
                self.terminate(TerminationReason::NotificationReceived);
            }
            SessionEvent::NotifMsgErr => {
                log::error!(
                    "[{}][{}] Error parsing notification message from peer",
                    self.peer_addr,
                    self.state
                );
            }
            SessionEvent::BgpHeaderErr(sub) => {
                let notif = BgpNotificationMessage::message_header_error(*sub, Bytes::new());
                self.send_notification(notif).await;
                self.terminate(TerminationReason::HeaderError);
            }
            SessionEvent::BgpOpen(_) | SessionEvent::BgpOpenMsgErr(_) => {
                let notif = BgpNotificationMessage::finite_state_machine_error();
                self.send_notification(notif).await;
                self.terminate(TerminationReason::FsmError);
            }
        }
        Ok(())
    }

    fn read_open_msg(&mut self, open: &BgpOpenMessage) {
        self.peer_as = Some(open.my_as());
        self.peer_bgp_id = Some(open.bgp_id());
        self.peer_hold_time = Some(open.hold_time());
    }

    /// Negotiated hold time is the smaller of ours and the peer's; keepalive
    /// is a third of that. A zero on either side disables both timers.
    fn set_negotiated_timers(&mut self) {
        if self.config.hold_timer_duration().is_zero() {
            self.hold_timer_duration = Duration::from_secs(0);
            self.keepalive_timer_duration = Duration::from_secs(0);
            return;
        }
        if let Some(received_hold_time) = self.peer_hold_time {
            self.hold_timer_duration = Duration::from_secs(
                self.config.hold_timer_duration.min(received_hold_time) as u64,
            );
        }
        if self.hold_timer_duration.is_zero() {
            self.keepalive_timer_duration = Duration::from_secs(0);
        } else {
            self.keepalive_timer_duration = self.hold_timer_duration.div_f32(3.0);
        }
    }

    fn start_timers(&mut self) {
        if self.keepalive_timer_duration.is_zero() {
            self.keepalive_timer.take();
        } else {
            let mut interval = tokio::time::interval(self.keepalive_timer_duration);
            interval.reset();
            self.keepalive_timer.replace(interval);
        }
        if self.hold_timer_duration.is_zero() {
            self.hold_timer.take();
        } else {
            let mut interval = tokio::time::interval(self.hold_timer_duration);
            interval.reset();
            self.hold_timer.replace(interval);
        }
    }

    async fn send(&mut self, msg: BgpMessage) -> Result<(), FsmStateError> {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "[{}][{}] Sending message: {msg:?}",
                self.peer_addr,
                self.state
            );
        }
        self.stats.messages_sent += 1;
        self.stats.last_sent = Some(Utc::now());
        match &msg {
            BgpMessage::Open(_) => {
                self.stats.open_sent += 1;
            }
            BgpMessage::Update(_) => {
                if let Some(interval) = self.keepalive_timer.as_mut() {
                    interval.reset()
                }
                self.stats.update_sent += 1;
            }
            BgpMessage::Notification(_) => {
                self.stats.notification_sent += 1;
            }
            BgpMessage::KeepAlive => {
                if let Some(interval) = self.keepalive_timer.as_mut() {
                    interval.reset()
                }
                self.stats.keepalive_sent += 1;
            }
        }
        self.inner.send(msg).await?;
        Ok(())
    }

    /// Keepalives ride on a live transport; a write failure means the
    /// connection is gone and the session terminates with it.
    async fn send_keepalive(&mut self) {
        if let Err(send_err) = self.send(BgpMessage::KeepAlive).await {
            log::error!(
                "[{}][{}] Error sending keepalive to peer: {send_err:?}",
                self.peer_addr,
                self.state
            );
            self.terminate(TerminationReason::ConnectionFailed);
        }
    }

    /// Best-effort NOTIFICATION send on the way out of a session.
    async fn send_notification(&mut self, notif: BgpNotificationMessage) {
        if let Err(send_err) = self.send(BgpMessage::Notification(notif)).await {
            log::error!(
                "[{}][{}] Error sending notification message to peer: {send_err:?}",
                self.peer_addr,
                self.state
            );
        }
    }
}

impl<A: Display + Unpin, I: AsyncRead + AsyncWrite + Unpin> Stream for Session<A, I> {
    type Item = SessionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let keepalive_timer = &mut this.keepalive_timer;
        let hold_timer = &mut this.hold_timer;
        let inner = &mut this.inner;
        let stats = &mut this.stats;
        let expected_peer_as = this.config.peer_as;
        let x = async move {
            futures::select_biased! {
                _instance = async {
                    match keepalive_timer {
                        None => std::future::pending().await,
                        Some(interval) => interval.tick().await,
                    }
                }.fuse() => {
                    Some(SessionEvent::KeepAliveTimerExpires)
                }
                _instance = async {
                    match hold_timer {
                        None => std::future::pending().await,
                        Some(interval) => interval.tick().await,
                    }
                }.fuse() => {
                    Some(SessionEvent::HoldTimerExpires)
                }
                msg = inner.next().fuse() => {
                    match msg {
                        None => Some(SessionEvent::TcpConnectionFails),
                        Some(Err(err)) => Some(err.into()),
                        Some(Ok(msg)) => {
                            stats.messages_received += 1;
                            stats.last_received = Some(Utc::now());
                            match msg {
                                BgpMessage::Open(open) => {
                                    stats.open_received += 1;
                                    match expected_peer_as {
                                        Some(asn) if asn != open.my_as() => {
                                            Some(SessionEvent::BgpOpenMsgErr(
                                                OpenMessageErrorSubCode::BadPeerAs,
                                            ))
                                        }
                                        _ => Some(SessionEvent::BgpOpen(open)),
                                    }
                                }
                                BgpMessage::Update(update) => {
                                    stats.update_received += 1;
                                    Some(SessionEvent::UpdateMsg(update))
                                }
                                BgpMessage::Notification(notif) => {
                                    stats.notification_received += 1;
                                    // Version errors have a special event in the BGP FSM
                                    if notif.code() == BgpErrorCode::OpenMessageError
                                        && notif.sub_code()
                                            == OpenMessageErrorSubCode::UnsupportedVersionNumber
                                                as u8
                                    {
                                        Some(SessionEvent::NotifMsgVerErr)
                                    } else {
                                        Some(SessionEvent::NotifMsg(notif))
                                    }
                                }
                                BgpMessage::KeepAlive => {
                                    stats.keepalive_received += 1;
                                    Some(SessionEvent::KeepAliveMsg)
                                }
                            }
                        }
                    }
                }
            }
        };
        futures::pin_mut!(x);
        Pin::new(&mut x).poll(cx)
    }
}

/// Encapsulate initiating a connection to a peer
#[async_trait]
pub trait ActiveConnect<P, I: AsyncRead + AsyncWrite> {
    async fn connect(&mut self, peer_addr: P) -> io::Result<I>;
}

#[derive(Debug, Clone)]
pub struct TcpActiveConnect;

#[async_trait]
impl ActiveConnect<SocketAddr, TcpStream> for TcpActiveConnect {
    async fn connect(&mut self, peer_addr: SocketAddr) -> io::Result<TcpStream> {
        TcpStream::connect(peer_addr).await
    }
}

/// Dial the peer and hand back a session ready for [`Session::start`].
pub async fn connect_session<I, C>(
    connect: &mut C,
    peer_addr: SocketAddr,
    config: SessionConfig,
    rib: SharedRib,
) -> io::Result<Session<SocketAddr, I>>
where
    I: AsyncRead + AsyncWrite + Unpin,
    C: ActiveConnect<SocketAddr, I>,
{
    let stream = connect.connect(peer_addr).await?;
    let framed = Framed::new(stream, BgpCodec);
    Ok(Session::new(peer_addr, config, rib, framed))
}

/// Fresh single-session [`SharedRib`].
pub fn shared_rib() -> SharedRib {
    std::sync::Arc::new(tokio::sync::Mutex::new(Rib::new()))
}
