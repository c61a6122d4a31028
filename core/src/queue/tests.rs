use std::time::Duration;

use bytes::Bytes;
use tokio::time::timeout;

use super::*;

#[tokio::test]
async fn fifo_order_preserved() {
    let queue = MessageQueue::new();

    for payload in ["one", "two", "three"] {
        queue.enqueue(Bytes::from_static(payload.as_bytes())).await.unwrap();
    }
    assert_eq!(queue.len().await.unwrap(), 3);

    for expected in ["one", "two", "three"] {
        let ticket = queue.dequeue().await.unwrap();
        assert_eq!(ticket.await.unwrap(), expected.as_bytes());
    }
    assert_eq!(queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn requeue_prepends() {
    let queue = MessageQueue::new();

    for payload in ["a", "b", "c"] {
        queue.enqueue(Bytes::from_static(payload.as_bytes())).await.unwrap();
    }
    queue.requeue(Bytes::from_static(b"d")).await.unwrap();

    for expected in ["d", "a", "b"] {
        let ticket = queue.dequeue().await.unwrap();
        assert_eq!(ticket.await.unwrap(), expected.as_bytes());
    }

    let ticket = queue.dequeue().await.unwrap();
    assert_eq!(ticket.await.unwrap(), b"c".as_ref());
}

#[tokio::test]
async fn dequeue_waits_for_enqueue() {
    let queue = MessageQueue::new();

    let mut ticket = queue.dequeue().await.unwrap();
    assert!(
        timeout(Duration::from_millis(50), &mut ticket).await.is_err(),
        "empty queue must not fulfil a ticket"
    );

    queue.enqueue(Bytes::from_static(b"late")).await.unwrap();
    assert_eq!(ticket.await.unwrap(), b"late".as_ref());
}

#[tokio::test]
async fn closed_ticket_does_not_consume() {
    let queue = MessageQueue::new();

    let mut abandoned = queue.dequeue().await.unwrap();
    abandoned.close();
    assert!(abandoned.try_recv().is_err());

    queue.enqueue(Bytes::from_static(b"x")).await.unwrap();

    // The payload must survive the dead ticket and go to the next one.
    let ticket = queue.dequeue().await.unwrap();
    assert_eq!(ticket.await.unwrap(), b"x".as_ref());
    assert_eq!(queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn stop_unblocks_pending_consumers() {
    let queue = MessageQueue::new();

    let ticket = queue.dequeue().await.unwrap();
    queue.stop();

    assert!(ticket.await.is_err());
    assert!(queue.enqueue(Bytes::from_static(b"x")).await.is_err());
    assert!(queue.len().await.is_err());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let queue = MessageQueue::new();
    queue.stop();
    queue.stop();
}

#[tokio::test]
async fn concurrent_consumers_receive_each_payload_once() {
    const PAYLOADS: usize = 100;
    const CONSUMERS: usize = 4;

    let queue = MessageQueue::new();

    let mut consumers = Vec::new();
    for _ in 0..CONSUMERS {
        let queue = queue.clone();
        consumers.push(tokio::spawn(async move {
            let mut received = Vec::new();
            loop {
                let ticket = queue.dequeue().await.unwrap();
                match timeout(Duration::from_millis(500), ticket).await {
                    Ok(Ok(payload)) => received.push(payload),
                    _ => return received,
                }
            }
        }));
    }

    for i in 0..PAYLOADS {
        queue.enqueue(Bytes::from(i.to_string())).await.unwrap();
    }

    let mut received = Vec::new();
    for consumer in consumers {
        received.extend(consumer.await.unwrap());
    }

    let mut received: Vec<String> = received
        .iter()
        .map(|payload| String::from_utf8(payload.to_vec()).unwrap())
        .collect();
    received.sort();

    let mut expected: Vec<String> = (0..PAYLOADS).map(|i| i.to_string()).collect();
    expected.sort();

    assert_eq!(received, expected);
    assert_eq!(queue.len().await.unwrap(), 0);
}
