//! Integration tests for loss recovery and abandonment.
//!
//! A loss plan on the in-memory network drops chosen fragments. Eager gap
//! detection must recover a lost predecessor without waiting for the
//! integrity sweep; a lost final fragment must wait for the sweep; an
//! unrecoverable object must be abandoned once three request rounds go
//! unanswered.

use std::time::Duration;

use log::Level;
use rmcast::records::SearchPayload;
use rmcast_testing::{LoggerHandle, MemoryNetwork, bulky_record, logger, small_record};
use rstest::rstest;

#[path = "common/transport_helpers.rs"]
mod transport_helpers;

use crate::transport_helpers::{INTERVAL, config, is_crawl, layout, receiving, small_cache};

const BEFORE_SWEEP: Duration = Duration::from_secs(4);

#[tokio::test(start_paused = true)]
async fn lost_predecessor_is_recovered_before_the_sweep() {
    let network = MemoryNetwork::new();
    network.set_loss_plan(|header, attempt| is_crawl(header) && header.index().get() == 1 && attempt == 1);
    let sender = receiving(&network, config("downloader"));
    let receiver = receiving(&network, config("barrel-receiver"));
    let payload = bulky_record("https://gap.example", 5_000, 21);
    let (object_id, last) = layout(&sender, 0, &payload);
    assert!(last.get() >= 2, "payload must span several fragments");

    sender.send(&payload).await.expect("send");

    assert_eq!(receiver.receive(BEFORE_SWEEP).await, Some(payload));
    assert_eq!(network.dropped(), 1);
    assert_eq!(network.attempts(&object_id, 1.into()), 2);
    assert_eq!(receiver.pending_objects(), 0);
}

#[tokio::test(start_paused = true)]
async fn lost_final_fragment_waits_for_the_sweep() {
    let network = MemoryNetwork::new();
    network.set_loss_plan(|header, attempt| is_crawl(header) && header.is_last() && attempt == 1);
    let sender = receiving(&network, config("downloader"));
    let receiver = receiving(&network, config("barrel-receiver"));
    let payload = bulky_record("https://tail.example", 5_000, 22);
    let (object_id, last) = layout(&sender, 0, &payload);

    sender.send(&payload).await.expect("send");

    assert_eq!(receiver.receive(BEFORE_SWEEP).await, None);
    assert_eq!(receiver.pending_objects(), 1);
    assert_eq!(receiver.receive(INTERVAL).await, Some(payload));
    assert_eq!(network.attempts(&object_id, last), 2);
    assert_eq!(receiver.pending_objects(), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn unrecoverable_object_is_abandoned_after_three_request_rounds(mut logger: LoggerHandle) {
    logger.clear();
    let network = MemoryNetwork::new();
    network.set_loss_plan(|header, _| is_crawl(header) && header.is_last());
    let sender = receiving(&network, config("downloader"));
    let receiver = receiving(&network, config("barrel-receiver"));
    let payload = bulky_record("https://lost.example", 3_000, 23);
    let (object_id, last) = layout(&sender, 0, &payload);

    sender.send(&payload).await.expect("send");

    assert_eq!(receiver.receive(BEFORE_SWEEP).await, None);
    assert_eq!(receiver.pending_objects(), 1);
    // Sweeps at 5s, 10s and 15s ask again; the sweep at 20s gives up.
    assert_eq!(receiver.receive(INTERVAL * 3).await, None);
    assert_eq!(receiver.pending_objects(), 1);
    assert_eq!(receiver.receive(INTERVAL).await, None);
    assert_eq!(receiver.pending_objects(), 0);
    assert_eq!(network.attempts(&object_id, last), 4);

    let message = logger
        .find(Level::Info, "object abandoned")
        .expect("abandonment logged");
    assert!(message.contains(&format!("object_id={object_id}")));

    network.clear_loss_plan();
    assert_eq!(receiver.receive(INTERVAL * 2).await, None);
}

#[tokio::test(start_paused = true)]
async fn evicted_objects_cannot_be_recovered() {
    let network = MemoryNetwork::new();
    let sender = receiving(
        &network,
        config("downloader").with_protocol(small_cache(1)),
    );
    let receiver = receiving(&network, config("barrel-receiver"));
    let evicted = bulky_record("https://old.example", 3_000, 24);
    let (evicted_id, evicted_last) = layout(&sender, 0, &evicted);
    let kept = small_record("https://new.example");
    let (kept_id, _) = layout(&sender, 1, &kept);
    let lost_id = evicted_id.clone();
    network.set_loss_plan(move |header, _| header.object_id() == &lost_id && header.is_last());

    sender.send(&evicted).await.expect("send evicted");
    sender.send(&kept).await.expect("send kept");

    assert_eq!(receiver.receive(BEFORE_SWEEP).await, Some(kept));
    assert!(!sender.retransmit_cache().contains(&evicted_id));
    assert!(sender.retransmit_cache().contains(&kept_id));

    assert_eq!(receiver.receive(INTERVAL * 4).await, None);
    assert_eq!(receiver.pending_objects(), 0);
    assert_eq!(network.attempts(&evicted_id, evicted_last), 1);
}
