//! Reconnect schedule and lifecycle through a live session

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde_json::json;
use trivia_live_sync::transport::{ABNORMAL_CLOSE_CODE, MANUAL_CLOSE_CODE};
use trivia_live_sync::{ClientEvent, ConnectionState, SyncConfig};

use crate::common::*;

fn ms(values: &[u64]) -> Vec<Duration> {
    values.iter().map(|v| Duration::from_millis(*v)).collect()
}

fn record_events(session: &mut ScriptedSession) -> Rc<RefCell<Vec<ClientEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    session.client_mut().subscribe(move |event| sink.borrow_mut().push(event.clone()));
    seen
}

#[test]
fn test_three_abnormal_closes_double_the_delay() {
    let config = SyncConfig::default().with_reconnect(5, 1000, 30_000);
    let (mut session, conn, sched) = connected_session(config);

    session.handle(conn.closed(ABNORMAL_CLOSE_CODE));
    session.handle(sched.fire_next().expect("first reconnect scheduled"));
    session.handle(conn.closed(ABNORMAL_CLOSE_CODE));
    session.handle(sched.fire_next().expect("second reconnect scheduled"));
    session.handle(conn.closed(ABNORMAL_CLOSE_CODE));

    assert_eq!(sched.scheduled_delays(), ms(&[1000, 2000, 4000]));
    assert_eq!(session.client().state(), ConnectionState::Reconnecting);
}

#[test]
fn test_attempts_stop_at_maximum() {
    let config = SyncConfig::default().with_reconnect(3, 100, 250);
    let (mut session, conn, sched) = connected_session(config);
    let seen = record_events(&mut session);

    // keep failing for longer than the policy allows
    session.handle(conn.closed(ABNORMAL_CLOSE_CODE));
    for _ in 0..6 {
        match sched.fire_next() {
            Some(timer) => {
                session.handle(timer);
                session.handle(conn.error("connection refused"));
                session.handle(conn.closed(ABNORMAL_CLOSE_CODE));
            }
            None => break,
        }
    }

    assert_eq!(sched.scheduled_delays(), ms(&[100, 200, 250]));
    // initial connect plus one socket per reconnect attempt
    assert_eq!(conn.open_count(), 4);
    assert_eq!(session.client().state(), ConnectionState::Disconnected);
    assert!(seen
        .borrow()
        .iter()
        .any(|e| *e == ClientEvent::Failed { attempts: 3 }));

    // nothing more happens on its own
    assert!(sched.fire_next().is_none());
    assert_eq!(conn.open_count(), 4);
}

#[test]
fn test_successful_open_resets_schedule() {
    let config = SyncConfig::default().with_reconnect(5, 1000, 30_000);
    let (mut session, conn, sched) = connected_session(config);

    session.handle(conn.closed(ABNORMAL_CLOSE_CODE));
    session.handle(sched.fire_next().unwrap());
    session.handle(conn.closed(ABNORMAL_CLOSE_CODE));
    session.handle(sched.fire_next().unwrap());
    session.handle(conn.opened());
    session.handle(conn.closed(ABNORMAL_CLOSE_CODE));

    assert_eq!(sched.scheduled_delays(), ms(&[1000, 2000, 1000]));
}

#[test]
fn test_disconnect_while_reconnecting_is_final() {
    let (mut session, conn, sched) = connected_session(SyncConfig::default());
    session.handle(conn.closed(ABNORMAL_CLOSE_CODE));
    assert_eq!(session.client().state(), ConnectionState::Reconnecting);
    let timer = sched.pending()[0].0;

    session.disconnect();
    assert_eq!(session.client().state(), ConnectionState::Disconnected);
    assert_eq!(sched.cancelled(), vec![timer]);

    // a timer event that was already in flight is ignored
    session.handle(trivia_live_sync::LoopEvent::Timer(timer));
    assert_eq!(session.client().state(), ConnectionState::Disconnected);
    assert_eq!(conn.open_count(), 1);

    session.connect();
    assert_eq!(session.client().state(), ConnectionState::Connecting);
    assert_eq!(conn.open_count(), 2);
}

#[test]
fn test_manual_close_code_does_not_reconnect() {
    let (mut session, conn, sched) = connected_session(SyncConfig::default());
    let seen = record_events(&mut session);

    session.handle(conn.closed(MANUAL_CLOSE_CODE));
    assert_eq!(session.client().state(), ConnectionState::Disconnected);
    assert!(sched.pending().is_empty());
    assert_eq!(
        seen.borrow().as_slice(),
        &[ClientEvent::Close {
            code: MANUAL_CLOSE_CODE,
            reason: String::new()
        }]
    );
}

#[test]
fn test_connect_during_backoff_skips_the_wait() {
    let (mut session, conn, sched) = connected_session(SyncConfig::default());
    session.handle(conn.closed(ABNORMAL_CLOSE_CODE));
    let stale = sched.fire_next().unwrap();

    session.connect();
    assert_eq!(session.client().state(), ConnectionState::Connecting);
    assert_eq!(conn.open_count(), 2);

    session.handle(stale);
    assert_eq!(conn.open_count(), 2);
    session.handle(conn.opened());
    assert!(session.client().is_connected());
}

#[test]
fn test_send_only_while_connected() {
    let (mut session, conn, _) = connected_session(SyncConfig::default());
    assert!(session.client_mut().send("presence", json!({ "page": "questions" })));

    session.handle(conn.closed(ABNORMAL_CLOSE_CODE));
    assert!(!session.client_mut().send("presence", json!({ "page": "questions" })));

    session.disconnect();
    assert!(!session.client_mut().send("presence", json!({})));
    assert_eq!(conn.sent().len(), 1);
}

#[test]
fn test_lifecycle_event_order() {
    let config = SyncConfig::default().with_reconnect(5, 1000, 30_000);
    let (mut session, conn, sched) = connected_session(config);
    let seen = record_events(&mut session);

    session.handle(conn.closed(ABNORMAL_CLOSE_CODE));
    session.handle(sched.fire_next().unwrap());
    session.handle(conn.opened());

    assert_eq!(
        seen.borrow().as_slice(),
        &[
            ClientEvent::Close {
                code: ABNORMAL_CLOSE_CODE,
                reason: String::new()
            },
            ClientEvent::Reconnecting {
                attempt: 1,
                delay: Duration::from_millis(1000)
            },
            ClientEvent::Open,
        ]
    );
}

#[test]
fn test_connect_during_backoff_resets_attempts() {
    let config = SyncConfig::default().with_reconnect(3, 1000, 30_000);
    let (mut session, conn, sched) = connected_session(config);
    let seen = record_events(&mut session);

    // spend two attempts without ever opening
    session.handle(conn.closed(ABNORMAL_CLOSE_CODE));
    session.handle(sched.fire_next().unwrap());
    session.handle(conn.closed(ABNORMAL_CLOSE_CODE));
    assert_eq!(sched.scheduled_delays(), ms(&[1000, 2000]));

    session.connect();
    session.handle(conn.error("connection refused"));
    assert_eq!(sched.scheduled_delays(), ms(&[1000, 2000, 1000]));
    assert_eq!(session.client().state(), ConnectionState::Reconnecting);

    // the full budget is available again
    for _ in 0..2 {
        session.handle(sched.fire_next().unwrap());
        session.handle(conn.error("connection refused"));
    }
    assert_eq!(session.client().state(), ConnectionState::Reconnecting);
    assert!(!seen.borrow().iter().any(|e| matches!(e, ClientEvent::Failed { .. })));
    assert_eq!(sched.scheduled_delays(), ms(&[1000, 2000, 1000, 2000, 4000]));
}
