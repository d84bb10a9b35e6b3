//! Producer/consumer stress test for the inbound queue.

use std::thread;
use std::time::Duration;

use pestle_protocol::RawPacket;
use pestle_transport::inbound_queue;
use rand::Rng;

const PACKETS: u32 = 20_000;

#[test]
fn test_concurrent_push_and_drain_loses_nothing() {
    let (tx, mut rx) = inbound_queue();

    let producer = thread::spawn(move || {
        let mut rng = rand::rng();
        for i in 0..PACKETS {
            tx.push(RawPacket::new(1, i.to_le_bytes().to_vec())).unwrap();
            if rng.random_range(0..1000) == 0 {
                thread::sleep(Duration::from_micros(rng.random_range(10..500)));
            }
        }
    });

    let mut seen = Vec::with_capacity(PACKETS as usize);
    while seen.len() < PACKETS as usize {
        let batch = rx.drain();
        if batch.is_empty() {
            thread::yield_now();
            continue;
        }
        for packet in batch {
            let bytes: [u8; 4] = packet.payload[..].try_into().unwrap();
            seen.push(u32::from_le_bytes(bytes));
        }
    }
    producer.join().unwrap();

    assert!(rx.drain().is_empty());
    let expected: Vec<u32> = (0..PACKETS).collect();
    assert_eq!(seen, expected);
}
