//! Minimal producer/consumer round trip against a local broker.
//!
//! Start a broker first: `relayq start`

use std::time::Duration;

use relayq_client::{Client, DEFAULT_ADDR};

#[tokio::main]
async fn main() -> relayq_client::Result<()> {
    let client = Client::new();
    client.connect(DEFAULT_ADDR).await?;

    client.put("demo", "hello from relayq").await?;
    println!("put one message on 'demo'");

    let message = client.get("demo", Duration::from_secs(5)).await?;
    println!("received: {}", String::from_utf8_lossy(&message));

    let info = client.info().await?;
    println!(
        "broker: {} connections, {} queues, {} messages",
        info.num_connections, info.num_queues, info.num_messages
    );

    client.disconnect().await
}
