//! Connection manager behaviour against a scripted driver, on a paused clock.

use std::time::Duration;

use cxse_server::store::{
    ConnectionManager, ConnectionState, DriverEvent, StoreError, StoreOptions,
};

mod common;
use common::{Attempt, ScriptedDriver, TEST_URI};

const RETRY_DELAY: Duration = Duration::from_secs(5);

fn options(server_selection_timeout: Duration) -> StoreOptions {
    StoreOptions {
        uri: TEST_URI.to_string(),
        app_name: "cxse-server-test".to_string(),
        max_pool_size: 10,
        server_selection_timeout,
        idle_timeout: Duration::from_secs(45),
    }
}

#[tokio::test(start_paused = true)]
async fn failed_attempts_are_retried_after_the_fixed_delay() {
    let driver = ScriptedDriver::new([Attempt::Fail, Attempt::Fail]);
    let manager = ConnectionManager::new(driver.clone(), options(Duration::from_secs(5)), RETRY_DELAY);
    let handle = manager.connect();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(driver.attempts(), 1);
    assert_eq!(handle.state(), ConnectionState::Errored);

    // Nothing happens before the delay has elapsed.
    tokio::time::sleep(Duration::from_millis(3_900)).await;
    assert_eq!(driver.attempts(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(driver.attempts(), 2);
    assert_eq!(handle.state(), ConnectionState::Errored);

    tokio::time::sleep(RETRY_DELAY).await;
    assert_eq!(driver.attempts(), 3);
    assert_eq!(handle.state(), ConnectionState::Connected);
    assert_eq!(handle.times_connected(), 1);

    manager.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn one_connection_per_successful_attempt() {
    let driver = ScriptedDriver::new([Attempt::Fail, Attempt::Succeed]);
    let manager = ConnectionManager::new(driver.clone(), options(Duration::from_secs(5)), RETRY_DELAY);

    let handle = manager.connect();
    // Repeated calls share the same loop and connection.
    let again = manager.connect();
    tokio::time::sleep(RETRY_DELAY * 3).await;
    let _ = manager.connect();
    tokio::time::sleep(RETRY_DELAY * 3).await;

    assert_eq!(driver.attempts(), 2);
    assert_eq!(handle.times_connected(), 1);
    assert_eq!(again.state(), ConnectionState::Connected);
    assert_eq!(driver.max_live_connections(), 1);
    assert!(handle.connection().is_ok());

    manager.close().await.unwrap();
    assert_eq!(driver.live_connections(), 0);
}

#[tokio::test(start_paused = true)]
async fn requests_fail_fast_until_connected() {
    let driver = ScriptedDriver::new([Attempt::Fail]);
    let manager = ConnectionManager::new(driver.clone(), options(Duration::from_secs(30)), RETRY_DELAY);
    let handle = manager.connect();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(matches!(handle.connection(), Err(StoreError::Unavailable)));

    // Waiting is bounded by server selection, which outlasts the retry here.
    let connection = handle.acquire().await.unwrap();
    connection.ping().await.unwrap();
    assert_eq!(driver.attempts(), 2);

    manager.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn acquire_gives_up_after_server_selection_timeout() {
    let driver = ScriptedDriver::new(vec![Attempt::Fail; 10]);
    let manager = ConnectionManager::new(driver.clone(), options(Duration::from_secs(2)), RETRY_DELAY);
    let handle = manager.connect();

    let started = tokio::time::Instant::now();
    assert!(matches!(handle.acquire().await, Err(StoreError::Unavailable)));
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < RETRY_DELAY);

    manager.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn driver_events_drive_state_without_new_attempts() {
    let driver = ScriptedDriver::new([Attempt::Succeed]);
    let manager = ConnectionManager::new(driver.clone(), options(Duration::from_secs(5)), RETRY_DELAY);
    let handle = manager.connect();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.state(), ConnectionState::Connected);

    driver.emit(DriverEvent::Error("heartbeat timed out".into()));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.state(), ConnectionState::Connected);

    driver.emit(DriverEvent::Disconnected);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert!(matches!(handle.connection(), Err(StoreError::Unavailable)));

    // Re-connection is left to the driver.
    tokio::time::sleep(RETRY_DELAY * 2).await;
    assert_eq!(driver.attempts(), 1);

    driver.emit(DriverEvent::Reconnected);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.state(), ConnectionState::Connected);
    assert!(handle.connection().is_ok());
    assert_eq!(driver.max_live_connections(), 1);

    manager.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn events_raised_while_connecting_are_discarded() {
    let driver = ScriptedDriver::new([Attempt::Succeed]);
    driver.raise_during_connect([
        DriverEvent::Error("heartbeat timed out".into()),
        DriverEvent::Disconnected,
        DriverEvent::Reconnected,
    ]);
    let manager = ConnectionManager::new(driver.clone(), options(Duration::from_secs(5)), RETRY_DELAY);
    let handle = manager.connect();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(handle.state(), ConnectionState::Connected);
    assert_eq!(handle.times_connected(), 1);

    // Later events are still observed.
    driver.emit(DriverEvent::Disconnected);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.state(), ConnectionState::Disconnected);

    manager.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn close_stops_the_retry_loop() {
    let driver = ScriptedDriver::new(vec![Attempt::Fail; 100]);
    let manager = ConnectionManager::new(driver.clone(), options(Duration::from_secs(5)), RETRY_DELAY);
    let handle = manager.connect();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(driver.attempts(), 1);

    manager.close().await.unwrap();
    assert_eq!(handle.state(), ConnectionState::Disconnected);

    tokio::time::sleep(RETRY_DELAY * 10).await;
    assert_eq!(driver.attempts(), 1);

    // A closed manager never starts again.
    let _ = manager.connect();
    tokio::time::sleep(RETRY_DELAY * 2).await;
    assert_eq!(driver.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn close_waits_for_the_connection_to_close() {
    let driver = ScriptedDriver::with_close_delay([Attempt::Succeed], Duration::from_secs(3));
    let manager = ConnectionManager::new(driver.clone(), options(Duration::from_secs(5)), RETRY_DELAY);
    let handle = manager.connect();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(driver.live_connections(), 1);

    let started = tokio::time::Instant::now();
    manager.close().await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(driver.closed());
    assert_eq!(driver.live_connections(), 0);
    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert!(matches!(handle.connection(), Err(StoreError::Unavailable)));
}
