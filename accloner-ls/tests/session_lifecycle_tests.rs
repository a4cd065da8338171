//! Session lifecycle integration tests
//!
//! Exercises readiness gating, deferred listening, the single transmitter
//! slot, stop semantics, and observer registration over real TCP
//! connections on ephemeral ports.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use accloner_ls::config::Config;
use accloner_ls::SessionController;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::sleep;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_config(database_url: &str) -> Config {
    Config {
        bind: "127.0.0.1".to_string(),
        port: 0,
        database_url: database_url.to_string(),
        idle_timeout: None,
    }
}

fn memory_session() -> Arc<SessionController> {
    Arc::new(SessionController::new(test_config("sqlite::memory:")))
}

async fn start_session() -> (Arc<SessionController>, SocketAddr) {
    let controller = memory_session();
    controller.start_listening().await.unwrap();
    let addr = wait_for_listen_addr(&controller).await;
    (controller, addr)
}

async fn wait_for_listen_addr(controller: &SessionController) -> SocketAddr {
    for _ in 0..200 {
        if let Some(addr) = controller.listen_addr().await {
            return addr;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("listener did not come up");
}

async fn wait_for_transmitter(controller: &SessionController, connected: bool) {
    for _ in 0..200 {
        if controller.transmitter_peer().await.is_some() == connected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("transmitter slot never became connected={}", connected);
}

async fn wait_until(what: &str, check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// A rejected connection reads as closed without receiving any byte
async fn assert_connection_closed(mut stream: TcpStream) {
    let mut buf = [0u8; 1];
    match stream.read(&mut buf).await {
        Ok(0) => {}
        Ok(n) => panic!("expected closed connection, read {} bytes", n),
        Err(_) => {}
    }
}

// ============================================================================
// Readiness and deferred listening
// ============================================================================

#[tokio::test]
async fn test_listen_requested_before_ready_still_binds_once() {
    let controller = memory_session();

    let listening_log = Arc::new(Mutex::new(Vec::new()));
    {
        let log = Arc::clone(&listening_log);
        controller.on_listening(move |state| log.lock().unwrap().push(state));
    }

    // The store connection task has not necessarily finished yet; the
    // request must be honored either way, exactly once
    controller.start_listening().await.unwrap();

    wait_until("listener to come up", || {
        *listening_log.lock().unwrap() == [true]
    })
    .await;

    assert!(controller.is_ready());
    assert!(controller.is_listening().await);
    assert!(controller.listen_addr().await.is_some());
}

#[tokio::test]
async fn test_ready_callback_fires_once_on_transition() {
    let controller = memory_session();

    let fired = Arc::new(Mutex::new(0));
    {
        let fired = Arc::clone(&fired);
        controller.on_ready(false, move || *fired.lock().unwrap() += 1);
    }

    wait_until("ready transition", || controller.is_ready()).await;
    wait_until("ready callback", || *fired.lock().unwrap() == 1).await;

    // The ready list drains after firing; nothing fires it again
    sleep(Duration::from_millis(50)).await;
    assert_eq!(*fired.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_forced_ready_callback_runs_inline_when_already_ready() {
    let controller = memory_session();
    wait_until("ready transition", || controller.is_ready()).await;

    let fired = Arc::new(Mutex::new(0));
    let token = {
        let fired = Arc::clone(&fired);
        controller.on_ready(true, move || *fired.lock().unwrap() += 1)
    };

    assert!(token.is_none());
    assert_eq!(*fired.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_unforced_registration_after_ready_stays_dormant() {
    let controller = memory_session();
    wait_until("ready transition", || controller.is_ready()).await;

    let fired = Arc::new(Mutex::new(0));
    let token = {
        let fired = Arc::clone(&fired);
        controller.on_ready(false, move || *fired.lock().unwrap() += 1)
    };

    assert!(token.is_some());
    sleep(Duration::from_millis(50)).await;
    assert_eq!(*fired.lock().unwrap(), 0);
}

// ============================================================================
// Stop semantics
// ============================================================================

#[tokio::test]
async fn test_stop_notifies_even_when_nothing_was_open() {
    let controller = memory_session();

    let listening_log = Arc::new(Mutex::new(Vec::new()));
    {
        let log = Arc::clone(&listening_log);
        controller.on_listening(move |state| log.lock().unwrap().push(state));
    }

    controller.stop_listening().await;
    assert_eq!(*listening_log.lock().unwrap(), vec![false]);

    // Stopping twice notifies twice
    controller.stop_listening().await;
    assert_eq!(*listening_log.lock().unwrap(), vec![false, false]);
}

#[tokio::test]
async fn test_stop_closes_listener_and_transmitter() {
    let (controller, addr) = start_session().await;

    let listening_log = Arc::new(Mutex::new(Vec::new()));
    {
        let log = Arc::clone(&listening_log);
        controller.on_listening(move |state| log.lock().unwrap().push(state));
    }

    let transmitter = TcpStream::connect(addr).await.unwrap();
    wait_for_transmitter(&controller, true).await;

    controller.stop_listening().await;

    assert!(!controller.is_listening().await);
    assert_eq!(*listening_log.lock().unwrap(), vec![false]);

    // The admitted connection is shut down gracefully
    assert_connection_closed(transmitter).await;
    wait_for_transmitter(&controller, false).await;

    // And nobody is accepting anymore
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_listening_can_restart_after_stop() {
    let (controller, _first_addr) = start_session().await;

    controller.stop_listening().await;
    assert!(!controller.is_listening().await);

    controller.start_listening().await.unwrap();
    let second_addr = wait_for_listen_addr(&controller).await;

    let transmitter = TcpStream::connect(second_addr).await.unwrap();
    wait_for_transmitter(&controller, true).await;
    drop(transmitter);
}

// ============================================================================
// Single transmitter slot
// ============================================================================

#[tokio::test]
async fn test_second_connection_is_destroyed() {
    let (controller, addr) = start_session().await;

    let _first = TcpStream::connect(addr).await.unwrap();
    wait_for_transmitter(&controller, true).await;
    let first_peer = controller.transmitter_peer().await;

    let second = TcpStream::connect(addr).await.unwrap();
    assert_connection_closed(second).await;

    // The admitted transmitter keeps its slot
    assert_eq!(controller.transmitter_peer().await, first_peer);
}

#[tokio::test]
async fn test_slot_frees_after_disconnect() {
    let (controller, addr) = start_session().await;

    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = Arc::clone(&events);
        controller
            .on_transmitter(false, move |status| {
                events
                    .lock()
                    .unwrap()
                    .push((status.connected, status.peer.is_some()));
            })
            .await;
    }

    let first = TcpStream::connect(addr).await.unwrap();
    wait_for_transmitter(&controller, true).await;
    drop(first);
    wait_for_transmitter(&controller, false).await;

    // A replacement transmitter is admitted into the freed slot
    let _second = TcpStream::connect(addr).await.unwrap();
    wait_for_transmitter(&controller, true).await;

    wait_until("lifecycle events", || {
        *events.lock().unwrap() == [(true, true), (false, true), (true, true)]
    })
    .await;
}

#[tokio::test]
async fn test_immediate_transmitter_registration_sees_current_state() {
    let (controller, addr) = start_session().await;

    let _transmitter = TcpStream::connect(addr).await.unwrap();
    wait_for_transmitter(&controller, true).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        controller
            .on_transmitter(true, move |status| {
                seen.lock().unwrap().push(status.connected)
            })
            .await;
    }

    // Delivered inline at registration, before any further transition
    assert_eq!(*seen.lock().unwrap(), vec![true]);
}

#[tokio::test]
async fn test_idle_transmitter_is_disconnected() {
    let controller = Arc::new(SessionController::new(Config {
        idle_timeout: Some(Duration::from_millis(100)),
        ..test_config("sqlite::memory:")
    }));
    controller.start_listening().await.unwrap();
    let addr = wait_for_listen_addr(&controller).await;

    let idle = TcpStream::connect(addr).await.unwrap();
    wait_for_transmitter(&controller, true).await;

    // Never send a frame; the session hangs up on its own
    wait_for_transmitter(&controller, false).await;
    assert_connection_closed(idle).await;

    // The freed slot admits a fresh connection
    let _replacement = TcpStream::connect(addr).await.unwrap();
    wait_for_transmitter(&controller, true).await;
}

// ============================================================================
// Observer registry
// ============================================================================

#[tokio::test]
async fn test_unsubscribe_removes_exactly_the_token_holder() {
    let controller = memory_session();

    let first_log = Arc::new(Mutex::new(Vec::new()));
    let second_log = Arc::new(Mutex::new(Vec::new()));

    let first_token = {
        let log = Arc::clone(&first_log);
        controller.on_listening(move |state| log.lock().unwrap().push(state))
    };
    {
        let log = Arc::clone(&second_log);
        controller.on_listening(move |state| log.lock().unwrap().push(state));
    }

    assert!(controller.remove_listening(first_token));
    assert!(!controller.remove_listening(first_token));

    controller.start_listening().await.unwrap();
    wait_until("second observer", || {
        *second_log.lock().unwrap() == [true]
    })
    .await;

    assert!(first_log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_panicking_observer_does_not_break_the_session() {
    let (controller, _addr) = start_session().await;

    controller.on_listening(|_| panic!("listening observer blew up"));
    let survivor_log = Arc::new(Mutex::new(Vec::new()));
    {
        let log = Arc::clone(&survivor_log);
        controller.on_listening(move |state| log.lock().unwrap().push(state));
    }

    controller.stop_listening().await;
    assert_eq!(*survivor_log.lock().unwrap(), vec![false]);

    // The session still restarts and accepts afterwards
    controller.start_listening().await.unwrap();
    let restarted_addr = wait_for_listen_addr(&controller).await;
    let _transmitter = TcpStream::connect(restarted_addr).await.unwrap();
    wait_for_transmitter(&controller, true).await;
}
