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

use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};
use tokio_test::io::Mock;
use tokio_util::codec::Framed;

use minibgp_pkt::{
    codec::BgpCodec,
    iana::OpenMessageErrorSubCode,
    notification::BgpNotificationMessage,
    open::BgpOpenMessage,
    update::BgpUpdateMessage,
    BgpMessage,
};

use crate::{
    events::SessionEvent,
    fsm::FsmState,
    session::{
        connect_session, shared_rib, ActiveConnect, Session, SessionConfig, SessionConfigBuilder,
        TerminationReason,
    },
    test::{BgpIoMockBuilder, MockActiveConnect, MockFailedActiveConnect},
};

const MY_AS: u16 = 65001;
const PEER_AS: u16 = 65002;
const HOLD_TIME: u16 = 180;
const MY_BGP_ID: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);
const PEER_BGP_ID: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 2);
const PEER_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 2)), 179);

fn my_open(hold_time: u16) -> BgpMessage {
    BgpMessage::Open(BgpOpenMessage::new(MY_AS, hold_time, MY_BGP_ID))
}

fn peer_open(hold_time: u16) -> BgpMessage {
    BgpMessage::Open(BgpOpenMessage::new(PEER_AS, hold_time, PEER_BGP_ID))
}

fn config() -> SessionConfig {
    SessionConfigBuilder::new(MY_AS, MY_BGP_ID)
        .peer_as(PEER_AS)
        .hold_timer_duration(HOLD_TIME)
        .build()
}

fn session(io: Mock, config: SessionConfig) -> Session<SocketAddr, Mock> {
    Session::new(PEER_ADDR, config, shared_rib(), Framed::new(io, BgpCodec))
}

#[test_log::test(tokio::test)]
async fn test_session_establishment() -> io::Result<()> {
    let io = BgpIoMockBuilder::new()
        .write(my_open(HOLD_TIME))
        .read(peer_open(HOLD_TIME))
        .write(BgpMessage::KeepAlive)
        .read(BgpMessage::KeepAlive)
        .build();
    let mut session = session(io, config());
    assert_eq!(session.state(), FsmState::Idle);

    session.start().await.unwrap();
    assert_eq!(session.state(), FsmState::OpenSent);

    let event = session.next().await.unwrap();
    assert!(matches!(event, SessionEvent::BgpOpen(_)));
    session.handle_event(event).await.unwrap();
    assert_eq!(session.state(), FsmState::OpenConfirm);
    assert_eq!(session.peer_as(), Some(PEER_AS));
    assert_eq!(session.peer_bgp_id(), Some(PEER_BGP_ID));
    assert_eq!(session.hold_timer_duration(), Duration::from_secs(180));
    assert_eq!(
        session.keepalive_timer_duration(),
        Duration::from_secs(180).div_f32(3.0)
    );

    let event = session.next().await.unwrap();
    assert_eq!(event, SessionEvent::KeepAliveMsg);
    session.handle_event(event).await.unwrap();
    assert_eq!(session.state(), FsmState::Established);
    assert_eq!(session.stats().open_sent(), 1);
    assert_eq!(session.stats().open_received(), 1);
    assert_eq!(session.stats().keepalive_sent(), 1);
    assert_eq!(session.stats().keepalive_received(), 1);
    assert!(session.stats().last_received().is_some());
    Ok(())
}

#[tokio::test]
async fn test_unsupported_version_terminates() -> io::Result<()> {
    let mut bad_open = peer_open(HOLD_TIME).to_bytes().unwrap().to_vec();
    // version octet right after the fixed header
    bad_open[19] = 0x03;
    let io = BgpIoMockBuilder::new()
        .write(my_open(HOLD_TIME))
        .read_u8(&bad_open)
        .write(BgpMessage::Notification(
            BgpNotificationMessage::open_message_error(
                OpenMessageErrorSubCode::UnsupportedVersionNumber,
                Bytes::new(),
            ),
        ))
        .build();
    let mut session = session(io, config());
    session.start().await.unwrap();

    let event = session.next().await.unwrap();
    assert_eq!(
        event,
        SessionEvent::BgpOpenMsgErr(OpenMessageErrorSubCode::UnsupportedVersionNumber)
    );
    session.handle_event(event).await.unwrap();
    assert_eq!(session.state(), FsmState::Idle);
    assert_eq!(
        session.termination().map(|t| t.reason()),
        Some(TerminationReason::OpenMessageError)
    );
    Ok(())
}

#[tokio::test]
async fn test_bad_peer_as_terminates() -> io::Result<()> {
    let io = BgpIoMockBuilder::new()
        .write(my_open(HOLD_TIME))
        .read(BgpMessage::Open(BgpOpenMessage::new(
            65010,
            HOLD_TIME,
            PEER_BGP_ID,
        )))
        .write(BgpMessage::Notification(
            BgpNotificationMessage::open_message_error(
                OpenMessageErrorSubCode::BadPeerAs,
                Bytes::new(),
            ),
        ))
        .build();
    let mut session = session(io, config());
    session.start().await.unwrap();

    let event = session.next().await.unwrap();
    assert_eq!(
        event,
        SessionEvent::BgpOpenMsgErr(OpenMessageErrorSubCode::BadPeerAs)
    );
    session.handle_event(event).await.unwrap();
    assert_eq!(session.state(), FsmState::Idle);
    assert_eq!(
        session.termination().map(|t| t.reason()),
        Some(TerminationReason::OpenMessageError)
    );
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_hold_timer_expires() -> io::Result<()> {
    // 1s negotiated hold time, keepalives every ~1/3s, peer never answers.
    // Two keepalive ticks fit before the hold timer fires.
    let io = BgpIoMockBuilder::new()
        .write(my_open(1))
        .read(peer_open(1))
        .write(BgpMessage::KeepAlive)
        .write(BgpMessage::KeepAlive)
        .write(BgpMessage::KeepAlive)
        .write(BgpMessage::Notification(
            BgpNotificationMessage::hold_timer_expired(),
        ))
        .build();
    let config = SessionConfigBuilder::new(MY_AS, MY_BGP_ID)
        .peer_as(PEER_AS)
        .hold_timer_duration(1)
        .build();
    let mut session = session(io, config);
    session.start().await.unwrap();

    let termination = session.run().await.unwrap();
    assert_eq!(session.state(), FsmState::Idle);
    assert_eq!(
        termination.map(|t| t.reason()),
        Some(TerminationReason::HoldTimerExpired)
    );
    assert_eq!(session.stats().keepalive_sent(), 3);
    assert_eq!(session.stats().notification_sent(), 1);
    Ok(())
}

#[tokio::test]
async fn test_updates_feed_rib() -> io::Result<()> {
    let announce = BgpMessage::Update(BgpUpdateMessage::new(
        vec![],
        Bytes::from_static(b"first"),
        vec!["10.0.0.0/8".parse().unwrap(), "192.168.10.0/24".parse().unwrap()],
    ));
    // withdraws one installed and one absent prefix, re-announces the other
    let rewrite = BgpMessage::Update(BgpUpdateMessage::new(
        vec!["10.0.0.0/8".parse().unwrap(), "172.16.0.0/12".parse().unwrap()],
        Bytes::from_static(b"second"),
        vec!["192.168.10.0/24".parse().unwrap()],
    ));
    // hold time zero disables both timers for the whole session
    let io = BgpIoMockBuilder::new()
        .write(my_open(0))
        .read(peer_open(0))
        .write(BgpMessage::KeepAlive)
        .read(BgpMessage::KeepAlive)
        .read(announce)
        .read(rewrite)
        .build();
    let config = SessionConfigBuilder::new(MY_AS, MY_BGP_ID)
        .peer_as(PEER_AS)
        .hold_timer_duration(0)
        .build();
    let mut session = session(io, config);
    session.start().await.unwrap();
    assert_eq!(session.hold_timer_duration(), Duration::from_secs(0));

    let termination = session.run().await.unwrap();
    assert_eq!(
        termination.map(|t| t.reason()),
        Some(TerminationReason::ConnectionFailed)
    );
    assert_eq!(session.stats().update_received(), 2);

    let rib = session.rib().lock().await;
    assert_eq!(rib.len(), 1);
    assert!(rib.get(&"10.0.0.0/8".parse().unwrap()).is_none());
    assert_eq!(
        rib.get(&"192.168.10.0/24".parse().unwrap())
            .map(|entry| entry.attributes().clone()),
        Some(Bytes::from_static(b"second"))
    );
    Ok(())
}

#[tokio::test]
async fn test_keepalive_write_failure_terminates() -> io::Result<()> {
    // the transport dies under the keepalive triggered by the peer's OPEN;
    // the session must record a termination instead of erroring out
    let io = BgpIoMockBuilder::new()
        .write(my_open(HOLD_TIME))
        .read(peer_open(HOLD_TIME))
        .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
        .build();
    let mut session = session(io, config());
    session.start().await.unwrap();

    let event = session.next().await.unwrap();
    assert!(matches!(event, SessionEvent::BgpOpen(_)));
    assert_eq!(session.handle_event(event).await.map(|_| ()), Ok(()));
    assert_eq!(session.state(), FsmState::Idle);
    assert_eq!(
        session.termination().map(|t| t.reason()),
        Some(TerminationReason::ConnectionFailed)
    );
    Ok(())
}

#[tokio::test]
async fn test_stats_record_creation_time() -> io::Result<()> {
    let before = Utc::now();
    let io = BgpIoMockBuilder::new().build();
    let session = session(io, config());
    assert!(session.stats().created() >= before);
    assert!(session.stats().created() <= Utc::now());
    Ok(())
}

#[tokio::test]
async fn test_terminate_is_idempotent() -> io::Result<()> {
    let io = BgpIoMockBuilder::new().write(my_open(HOLD_TIME)).build();
    let mut session = session(io, config());

    // terminating a session that never started is a no-op
    session.terminate(TerminationReason::AdminShutdown);
    assert!(session.termination().is_none());

    session.start().await.unwrap();
    session.terminate(TerminationReason::AdminShutdown);
    let first = session.termination().copied();
    assert_eq!(
        first.map(|t| t.reason()),
        Some(TerminationReason::AdminShutdown)
    );

    session.terminate(TerminationReason::HoldTimerExpired);
    assert_eq!(session.termination().copied(), first);
    assert_eq!(session.state(), FsmState::Idle);

    // events after termination are ignored
    let event = session.handle_event(SessionEvent::HoldTimerExpires).await;
    assert_eq!(event, Ok(SessionEvent::HoldTimerExpires));
    assert_eq!(session.termination().copied(), first);
    Ok(())
}

#[tokio::test]
async fn test_keepalive_in_open_sent_is_fsm_error() -> io::Result<()> {
    let io = BgpIoMockBuilder::new()
        .write(my_open(HOLD_TIME))
        .read(BgpMessage::KeepAlive)
        .write(BgpMessage::Notification(
            BgpNotificationMessage::finite_state_machine_error(),
        ))
        .build();
    let mut session = session(io, config());
    session.start().await.unwrap();

    let event = session.next().await.unwrap();
    assert_eq!(event, SessionEvent::KeepAliveMsg);
    session.handle_event(event).await.unwrap();
    assert_eq!(session.state(), FsmState::Idle);
    assert_eq!(
        session.termination().map(|t| t.reason()),
        Some(TerminationReason::FsmError)
    );
    Ok(())
}

#[tokio::test]
async fn test_connect_session_with_mock_connector() -> io::Result<()> {
    let mut io_builder = BgpIoMockBuilder::new();
    io_builder.write(my_open(HOLD_TIME));
    let mut connector = MockActiveConnect {
        peer_addr: PEER_ADDR,
        io_builder,
        connect_delay: Duration::from_secs(0),
    };
    let mut session = connect_session(&mut connector, PEER_ADDR, config(), shared_rib()).await?;
    session.start().await.unwrap();
    assert_eq!(session.state(), FsmState::OpenSent);
    Ok(())
}

#[tokio::test]
async fn test_failed_active_connect() {
    let mut connector = MockFailedActiveConnect {
        peer_addr: PEER_ADDR,
        connect_delay: Duration::from_secs(0),
    };
    let err = connector.connect(PEER_ADDR).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
}
