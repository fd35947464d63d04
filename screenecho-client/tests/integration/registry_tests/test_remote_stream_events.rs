use std::sync::{Arc, Mutex};

use screenecho_core::ClientId;

use crate::integration::{create_test_service, init_tracing};
use crate::utils::{SIGNAL_TIMEOUT_MS, settle, wait_until};

#[tokio::test]
async fn test_new_remote_streams_reach_observers() {
    init_tracing();

    let (service, signaling, factory) = create_test_service("a");
    let b = ClientId::from("b");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    service.subscribe(move |event| {
        seen_clone
            .lock()
            .unwrap()
            .push((event.client_id.clone(), event.stream.id().to_owned()));
    });

    service.establish_connection_with_peer(b.clone());
    signaling.wait_for_descriptions(&b, 1, SIGNAL_TIMEOUT_MS).await;

    let connection = factory.connection("b").unwrap();
    connection.emit_remote_stream("screen");
    connection.emit_remote_stream("screen");
    connection.emit_remote_stream("camera");

    assert!(wait_until(SIGNAL_TIMEOUT_MS, || seen.lock().unwrap().len() == 2).await);
    settle().await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (b.clone(), "screen".to_owned()),
            (b.clone(), "camera".to_owned()),
        ]
    );
}

#[tokio::test]
async fn test_unsubscribed_observer_is_not_called() {
    init_tracing();

    let (service, signaling, factory) = create_test_service("a");
    let b = ClientId::from("b");

    let removed = Arc::new(Mutex::new(0));
    let kept = Arc::new(Mutex::new(0));
    let removed_clone = removed.clone();
    let kept_clone = kept.clone();
    let id = service.subscribe(move |_| *removed_clone.lock().unwrap() += 1);
    service.subscribe(move |_| *kept_clone.lock().unwrap() += 1);
    service.unsubscribe(id);

    service.establish_connection_with_peer(b.clone());
    signaling.wait_for_descriptions(&b, 1, SIGNAL_TIMEOUT_MS).await;
    factory.connection("b").unwrap().emit_remote_stream("screen");

    assert!(wait_until(SIGNAL_TIMEOUT_MS, || *kept.lock().unwrap() == 1).await);
    assert_eq!(*removed.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_streams_after_close_are_not_reported() {
    init_tracing();

    let (service, signaling, factory) = create_test_service("a");
    let b = ClientId::from("b");

    let count = Arc::new(Mutex::new(0));
    let count_clone = count.clone();
    service.subscribe(move |_| *count_clone.lock().unwrap() += 1);

    service.establish_connection_with_peer(b.clone());
    signaling.wait_for_descriptions(&b, 1, SIGNAL_TIMEOUT_MS).await;
    let connection = factory.connection("b").unwrap();

    service.close_peer(&b);
    connection.emit_remote_stream("late");
    settle().await;

    assert_eq!(*count.lock().unwrap(), 0);
}
