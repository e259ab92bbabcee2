//! Integration tests for the request/response link over the simulated bus.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bellctl::adapters::uart::{UartBus, UartReceiver};
use bellctl::config::REQUEST_TIMEOUT_MS;
use bellctl::error::LinkError;
use bellctl::link::packet::{
    BASE_ADDRESS, DATA_LEN, RETURN_ADDRESS, RX_BUFFER_LEN, TRAILER, encode_request,
};
use bellctl::link::{LinkInbox, PacketType, Poller};

use super::mock_hw::{TEST_TIMEOUT, sim_poller, uniform_record};

#[test]
fn request_wire_bytes() {
    let inbox = Arc::new(LinkInbox::new());
    let mut poller = Poller::with_timeout(UartBus::new(), inbox, TEST_TIMEOUT);

    assert_eq!(poller.send_request(BASE_ADDRESS + 2, PacketType::Data), Err(LinkError::Timeout));
    let sent = poller.transport_mut().take_sent();
    let mut expected = encode_request(12, PacketType::Data).to_vec();
    expected.extend_from_slice(&TRAILER);
    assert_eq!(sent, expected);
    assert_eq!(&sent[..4], b"BEEL");
}

#[test]
fn answering_device_returns_its_record() {
    let record = uniform_record(1, 6, 1234);
    let mut poller = sim_poller(|bus| bus.devices[3] = Some(record));
    assert_eq!(poller.send_request(BASE_ADDRESS + 3, PacketType::Data), Ok(record));
    assert_eq!(poller.inbox().counters().accepted, 1);
}

#[test]
fn silent_device_times_out_without_blocking_the_next() {
    let record = uniform_record(1, 5, 77);
    let mut poller = sim_poller(|bus| bus.devices[1] = Some(record));

    assert_eq!(poller.send_request(BASE_ADDRESS, PacketType::Data), Err(LinkError::Timeout));
    assert_eq!(poller.send_request(BASE_ADDRESS + 1, PacketType::Data), Ok(record));
    let c = poller.inbox().counters();
    assert_eq!(c.timeouts, 1);
    assert_eq!(c.accepted, 1);
}

#[test]
fn stale_response_is_not_returned_for_a_later_request() {
    let inbox = Arc::new(LinkInbox::new());
    let mut rx = UartReceiver::new(inbox.clone());
    let mut poller = Poller::with_timeout(UartBus::new(), inbox, TEST_TIMEOUT);

    // A reply that arrives while nobody is waiting.
    let mut line = uniform_record(1, 5, 5).encode(RETURN_ADDRESS).to_vec();
    line.extend_from_slice(&TRAILER);
    rx.feed(&line);

    assert_eq!(poller.send_request(BASE_ADDRESS, PacketType::Data), Err(LinkError::Timeout));
}

#[test]
fn receiver_rejects_bad_frames_and_recovers() {
    let inbox = Arc::new(LinkInbox::new());
    let mut rx = UartReceiver::new(inbox.clone());
    let record = uniform_record(1, 5, 100);

    // Addressed to a device, not to us.
    let mut line = record.encode(BASE_ADDRESS).to_vec();
    line.extend_from_slice(&TRAILER);
    // Truncated data frame.
    line.extend_from_slice(&record.encode(RETURN_ADDRESS)[..DATA_LEN - 10]);
    line.extend_from_slice(&TRAILER);
    // Runaway capture without a trailer.
    line.extend(std::iter::repeat_n(0x33, RX_BUFFER_LEN + 1));
    // Then a good frame.
    line.extend_from_slice(&record.encode(RETURN_ADDRESS));
    line.extend_from_slice(&TRAILER);
    rx.feed(&line);

    let c = inbox.counters();
    assert_eq!(c.bad_destination, 1);
    assert_eq!(c.malformed, 1);
    assert_eq!(c.overflow, 1);
    assert_eq!(c.accepted, 1);
}

#[test]
fn reply_from_receive_thread_wakes_blocked_request() {
    let inbox = Arc::new(LinkInbox::new());
    let mut poller = Poller::new(UartBus::new(), inbox.clone());
    let record = uniform_record(1, 9, 321);
    let timeout = Duration::from_millis(REQUEST_TIMEOUT_MS);

    let rx_inbox = inbox.clone();
    let rx_task = std::thread::spawn(move || {
        let mut rx = UartReceiver::new(rx_inbox);
        std::thread::sleep(Duration::from_millis(20));
        let mut line = record.encode(RETURN_ADDRESS).to_vec();
        line.extend_from_slice(&TRAILER);
        rx.feed(&line);
    });

    let started = Instant::now();
    assert_eq!(poller.send_request(BASE_ADDRESS, PacketType::Data), Ok(record));
    let elapsed = started.elapsed();
    rx_task.join().unwrap();
    assert!(elapsed >= Duration::from_millis(10), "returned before the reply: {:?}", elapsed);
    assert!(elapsed < timeout * 3 / 4, "reply did not wake the wait: {:?}", elapsed);
    assert_eq!(inbox.counters().timeouts, 0);

    // Nobody answers the next one.
    let started = Instant::now();
    assert_eq!(poller.send_request(BASE_ADDRESS + 1, PacketType::Data), Err(LinkError::Timeout));
    let elapsed = started.elapsed();
    assert!(elapsed >= timeout, "gave up early: {:?}", elapsed);
    assert!(elapsed < timeout * 5, "overslept: {:?}", elapsed);

    let c = inbox.counters();
    assert_eq!(c.timeouts, 1);
    assert_eq!(c.accepted, 1);
}
