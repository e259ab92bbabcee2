//! Integration tests for the pulse path: PulseQueue → PulseExecutor → output.

use std::sync::Arc;
use std::time::Duration;

use bellctl::adapters::hardware::{RmtPulseOutput, encode_pulse};
use bellctl::error::PulseError;
use bellctl::pins::SOLENOID_GPIO;
use bellctl::pulse::{ActuatorId, PULSE_QUEUE_DEPTH, PulseExecutor, PulseQueue};

use super::mock_hw::{RecordingOutput, TimedOutput};

#[test]
fn ninth_pulse_is_dropped_and_the_rest_run_in_order() {
    let queue = PulseQueue::new();
    for (i, &pin) in SOLENOID_GPIO.iter().take(PULSE_QUEUE_DEPTH).enumerate() {
        queue.enqueue(pin, (i + 1) as f32).unwrap();
    }
    assert_eq!(queue.enqueue(SOLENOID_GPIO[8], 9.0), Err(PulseError::QueueFull));
    assert_eq!(queue.accepted(), 8);
    assert_eq!(queue.dropped(), 1);

    let mut exec = PulseExecutor::new(RecordingOutput::default());
    assert_eq!(exec.drain_pending(&queue), PULSE_QUEUE_DEPTH);
    let expected: Vec<(u8, u32)> = SOLENOID_GPIO
        .iter()
        .take(PULSE_QUEUE_DEPTH)
        .enumerate()
        .map(|(i, &pin)| (pin, (i as u32 + 1) * 1000))
        .collect();
    assert_eq!(exec.output().pulses, expected);
    assert!(queue.is_empty());

    // Space is available again.
    queue.enqueue(SOLENOID_GPIO[8], 9.0).unwrap();
}

#[test]
fn rejected_requests_never_reach_the_queue() {
    let queue = PulseQueue::new();
    assert_eq!(queue.enqueue(2, 5.0), Err(PulseError::UnknownPin(2)));
    assert_eq!(queue.enqueue(SOLENOID_GPIO[0], f32::NAN), Err(PulseError::InvalidDuration));
    assert_eq!(queue.enqueue(SOLENOID_GPIO[0], 40_000.0), Err(PulseError::InvalidDuration));
    assert_eq!(queue.rejected(), 3);
    assert!(queue.is_empty());
}

#[test]
fn zero_width_and_failing_output_are_counted() {
    let queue = PulseQueue::new();
    let a = ActuatorId::new(1).unwrap();
    queue.fire(a, 0.0).unwrap();
    queue.fire(a, 2.0).unwrap();
    queue.fire(a, 3.0).unwrap();

    let mut out = RecordingOutput::default();
    out.fail_next = true;
    let mut exec = PulseExecutor::new(out);
    exec.drain_pending(&queue);

    assert_eq!(exec.output().pulses, vec![(SOLENOID_GPIO[1], 3000)]);
    assert_eq!(exec.failed(), 1);
}

#[test]
fn rmt_output_covers_long_pulses() {
    let queue = PulseQueue::new();
    queue.fire(ActuatorId::new(11).unwrap(), 100.0).unwrap();
    let mut exec = PulseExecutor::new(RmtPulseOutput::new());
    exec.drain_pending(&queue);
    assert_eq!(exec.output().emitted(), &[(SOLENOID_GPIO[11], 100_000)]);

    let high: u32 = encode_pulse(100_000)
        .iter()
        .map(|item| (item & 0x7FFF) + ((item >> 16) & 0x7FFF))
        .sum();
    assert_eq!(high, 100_000);
}

#[test]
fn executor_task_drains_shared_queue() {
    let queue = Arc::new(PulseQueue::new());
    let producer = queue.clone();
    let handle = std::thread::spawn(move || {
        for ms in [1.0, 2.0, 3.0] {
            producer.fire(ActuatorId::FIRST, ms).unwrap();
        }
    });
    handle.join().unwrap();

    let mut exec = PulseExecutor::new(RecordingOutput::default());
    assert_eq!(exec.drain_pending(&queue), 3);
    let widths: Vec<u32> = exec.output().pulses.iter().map(|p| p.1).collect();
    assert_eq!(widths, vec![1000, 2000, 3000]);
}

#[test]
fn executor_task_serialises_pulses_from_concurrent_producers() {
    let queue = Arc::new(PulseQueue::new());
    let output = TimedOutput::default();

    let task_queue = queue.clone();
    let task_output = output.clone();
    std::thread::spawn(move || {
        PulseExecutor::new(task_output).run(&task_queue);
    });

    // Keep the executor busy so the producers fill the queue behind it.
    queue.enqueue(SOLENOID_GPIO[0], 150.0).unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs(1);
    while output.started_count() == 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(output.started_count(), 1);

    let lanes: [[u8; 4]; 2] = [
        [SOLENOID_GPIO[1], SOLENOID_GPIO[2], SOLENOID_GPIO[3], SOLENOID_GPIO[4]],
        [SOLENOID_GPIO[5], SOLENOID_GPIO[6], SOLENOID_GPIO[7], SOLENOID_GPIO[8]],
    ];
    let producers: Vec<_> = lanes
        .iter()
        .map(|&pins| {
            let q = queue.clone();
            std::thread::spawn(move || {
                for pin in pins {
                    q.enqueue(pin, 2.0).unwrap();
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    // Executor is still inside the first pulse and the queue holds eight.
    assert_eq!(queue.len(), PULSE_QUEUE_DEPTH);
    assert_eq!(queue.enqueue(SOLENOID_GPIO[11], 2.0), Err(PulseError::QueueFull));
    assert_eq!(queue.dropped(), 1);

    let spans = output.wait_for(1 + PULSE_QUEUE_DEPTH, Duration::from_secs(2));
    assert_eq!(spans.len(), 1 + PULSE_QUEUE_DEPTH);
    assert_eq!(spans[0].gpio, SOLENOID_GPIO[0]);
    assert!(spans.iter().all(|s| s.gpio != SOLENOID_GPIO[11]));

    for pair in spans.windows(2) {
        assert!(pair[1].start >= pair[0].end, "pulses overlapped");
    }
    for pins in lanes {
        let order: Vec<u8> = spans.iter().map(|s| s.gpio).filter(|g| pins.contains(g)).collect();
        assert_eq!(order, pins.to_vec());
    }

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(output.spans().len(), 1 + PULSE_QUEUE_DEPTH);
    assert!(queue.is_empty());
}
