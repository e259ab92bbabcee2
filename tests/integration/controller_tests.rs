//! Integration tests for the poll cycle: SimBus → Controller → PulseQueue.
//!
//! The configuration store is the real [`NvsAdapter`] in its host
//! (in-memory) form.

use std::sync::Arc;

use bellctl::adapters::nvs::NvsAdapter;
use bellctl::app::commands::AppCommand;
use bellctl::app::events::AppEvent;
use bellctl::app::ports::ConfigPort;
use bellctl::app::service::{Controller, CycleReport};
use bellctl::config::{KEY_LOOP_ENABLED, KEY_TRIGGER_INTERVAL, PulseWidth, PulseWidths};
use bellctl::error::{Error, PulseError};
use bellctl::link::packet::{BASE_ADDRESS, TRAILER};
use bellctl::pins::SOLENOID_GPIO;
use bellctl::pulse::{ActuatorId, PulseQueue};
use bellctl::sensors::{DeviceStatus, PollState, SensorId};
use bellctl::trigger::{CellRef, RuleSet, TriggerRule};

use super::mock_hw::{FixedClock, RecordingSink, SimBus, sim_poller, single_cell_record, uniform_record};

fn controller(configure: impl FnOnce(&mut SimBus)) -> Controller<SimBus> {
    Controller::new(sim_poller(configure), Arc::new(PulseQueue::new()))
}

fn actuator(id: u8) -> ActuatorId {
    ActuatorId::new(id).unwrap()
}

fn armed(sensor: u8, index: usize, threshold: i16) -> TriggerRule {
    TriggerRule::Armed {
        cell: CellRef::new(SensorId::new(sensor).unwrap(), index).unwrap(),
        threshold,
    }
}

fn rules(list: &[TriggerRule]) -> RuleSet {
    let mut set = RuleSet::default();
    set.0[..list.len()].copy_from_slice(list);
    set
}

/// Store with actuator 2 armed on sensor 0 cell 5 below 50, 12.5 ms pulses
/// and a 1000 ms debounce.
fn armed_store() -> NvsAdapter {
    let nvs = NvsAdapter::default();
    nvs.set_trigger_rules(actuator(2), &rules(&[armed(0, 5, 50)])).unwrap();
    let mut widths = PulseWidths::default();
    widths.0[2] = PulseWidth { loop_ms: 3.0, triggered_ms: 12.5 };
    nvs.set_pulse_widths(&widths).unwrap();
    nvs.set_i32(KEY_TRIGGER_INTERVAL, 1000).unwrap();
    nvs
}

// ── Polling ───────────────────────────────────────────────────

#[test]
fn every_device_is_polled_in_address_order() {
    let mut ctl = controller(|bus| bus.devices = [Some(uniform_record(1, 5, 900)); 4]);
    let report = ctl.poll_cycle(&NvsAdapter::default(), &FixedClock::at(0), &mut RecordingSink::default());

    assert_eq!(report, CycleReport { updated: 4, timed_out: 0, fired: 0 });
    for (_, snap) in ctl.sensors().iter() {
        assert_eq!(snap.status, DeviceStatus::ACTIVE);
        assert_eq!(snap.poll_state, PollState::Updated);
        assert_eq!(snap.distance[63], 900);
    }
    assert_eq!(ctl.link_counters().accepted, 4);
    assert_eq!(ctl.cycle_count(), 1);
}

#[test]
fn silent_device_times_out_and_keeps_stale_cells() {
    let mut ctl = controller(|bus| bus.devices = [Some(uniform_record(1, 5, 300)); 4]);
    let config = NvsAdapter::default();
    let clock = FixedClock::at(0);
    let mut sink = RecordingSink::default();
    ctl.poll_cycle(&config, &clock, &mut sink);
    assert_eq!(ctl.sensors().get(SensorId::new(1).unwrap()).status, DeviceStatus::ACTIVE);

    // Device 1 goes quiet.
    ctl.poller_mut().transport_mut().devices[1] = None;
    let report = ctl.poll_cycle(&config, &clock, &mut sink);
    assert_eq!(report.updated, 3);
    assert_eq!(report.timed_out, 1);

    let snap = ctl.sensors().get(SensorId::new(1).unwrap());
    assert_eq!(snap.status, DeviceStatus::TIMEOUT);
    assert_eq!(snap.poll_state, PollState::TimedOut);
    assert_eq!(snap.distance[10], 300, "cells must stay stale, not be cleared");
    assert!(sink.events.contains(&AppEvent::SensorStatusChanged {
        sensor: SensorId::new(1).unwrap(),
        from: DeviceStatus::ACTIVE,
        to: DeviceStatus::TIMEOUT,
    }));
    assert_eq!(ctl.link_counters().timeouts, 1);
}

#[test]
fn timed_out_device_never_fires() {
    let config = armed_store();
    let mut ctl = controller(|_| {});

    let mut sink = RecordingSink::default();
    let report = ctl.poll_cycle(&config, &FixedClock::at(10_000), &mut sink);
    assert_eq!(report.fired, 0);
    assert!(ctl.pulses().is_empty());
}

#[test]
fn line_noise_is_counted_and_reply_still_accepted() {
    let mut ctl = controller(|bus| {
        bus.devices = [Some(uniform_record(1, 5, 700)); 4];
        let mut junk = b"JUNK".to_vec();
        junk.push(0xFF);
        junk.push(1);
        junk.extend_from_slice(&TRAILER);
        bus.noise = junk;
    });
    let report = ctl.poll_cycle(&NvsAdapter::default(), &FixedClock::at(0), &mut RecordingSink::default());
    assert_eq!(report.updated, 4);
    let counters = ctl.link_counters();
    assert_eq!(counters.bad_header, 4);
    assert_eq!(counters.accepted, 4);
}

// ── Triggering ────────────────────────────────────────────────

#[test]
fn trigger_fires_then_debounces() {
    let config = armed_store();
    let mut ctl = controller(|bus| bus.devices[0] = Some(single_cell_record(5, 5, 40)));
    let clock = FixedClock::at(10_000);
    let mut sink = RecordingSink::default();

    let report = ctl.poll_cycle(&config, &clock, &mut sink);
    assert_eq!(report.fired, 1);
    let req = ctl.pulses().try_next().unwrap();
    assert_eq!(req.pin, SOLENOID_GPIO[2]);
    assert_eq!(req.duration_ms, 12.5);
    assert!(sink
        .lines()
        .contains(&"Trigger solenoid 2 from sensor 0 cell 5 (40 < threshold 50)".to_string()));

    for t in [10_500, 11_000] {
        clock.set(t);
        assert_eq!(ctl.poll_cycle(&config, &clock, &mut sink).fired, 0, "t={t}");
    }
    assert_eq!(ctl.debounce().last_fired(actuator(2)), Some(10_000));

    clock.set(11_001);
    assert_eq!(ctl.poll_cycle(&config, &clock, &mut sink).fired, 1);
    assert_eq!(ctl.debounce().last_fired(actuator(2)), Some(11_001));
    assert_eq!(sink.trigger_count(), 2);
}

#[test]
fn distance_at_threshold_or_invalid_target_does_not_fire() {
    let config = armed_store();
    let clock = FixedClock::at(5_000);

    let mut at_threshold = controller(|bus| bus.devices[0] = Some(single_cell_record(5, 6, 50)));
    assert_eq!(at_threshold.poll_cycle(&config, &clock, &mut RecordingSink::default()).fired, 0);

    let mut invalid = controller(|bus| bus.devices[0] = Some(single_cell_record(5, 4, 10)));
    assert_eq!(invalid.poll_cycle(&config, &clock, &mut RecordingSink::default()).fired, 0);

    let mut inactive = controller(|bus| {
        let mut r = single_cell_record(5, 9, 10);
        r.status = 2;
        bus.devices[0] = Some(r);
    });
    assert_eq!(inactive.poll_cycle(&config, &clock, &mut RecordingSink::default()).fired, 0);
}

#[test]
fn first_matching_rule_wins() {
    let config = NvsAdapter::default();
    config
        .set_trigger_rules(
            actuator(0),
            &rules(&[TriggerRule::Disabled, armed(1, 7, 100), armed(1, 8, 100)]),
        )
        .unwrap();
    let mut ctl = controller(|bus| {
        let mut r = uniform_record(1, 5, 20);
        r.distance[7] = 30;
        r.distance[8] = 10;
        bus.devices[1] = Some(r);
    });
    let mut sink = RecordingSink::default();
    assert_eq!(ctl.poll_cycle(&config, &FixedClock::at(2_000), &mut sink).fired, 1);
    assert!(matches!(
        sink.events.last(),
        Some(AppEvent::TriggerFired { cell: 7, distance: 30, .. })
    ));
}

#[test]
fn disabled_wire_rule_is_skipped() {
    let config = NvsAdapter::default();
    let set = RuleSet::parse("-1,0, 105,50, -1,0, -1,0, -1,0, -1,0, -1,0, -1,0").unwrap();
    config.set_trigger_rules(actuator(4), &set).unwrap();
    let mut ctl = controller(|bus| bus.devices[1] = Some(single_cell_record(5, 9, 49)));
    let mut sink = RecordingSink::default();
    assert_eq!(ctl.poll_cycle(&config, &FixedClock::at(2_000), &mut sink).fired, 1);
    assert!(matches!(
        sink.events.last(),
        Some(AppEvent::TriggerFired { cell: 5, threshold: 50, .. })
    ));
}

#[test]
fn several_actuators_fire_in_one_cycle() {
    let config = NvsAdapter::default();
    for id in [3, 7, 11] {
        config.set_trigger_rules(actuator(id), &rules(&[armed(2, 0, 100)])).unwrap();
    }
    let mut ctl = controller(|bus| bus.devices[2] = Some(uniform_record(1, 5, 1)));
    let report = ctl.poll_cycle(&config, &FixedClock::at(2_000), &mut RecordingSink::default());
    assert_eq!(report.fired, 3);
    let pins: Vec<u8> = std::iter::from_fn(|| ctl.pulses().try_next()).map(|r| r.pin).collect();
    assert_eq!(pins, vec![SOLENOID_GPIO[3], SOLENOID_GPIO[7], SOLENOID_GPIO[11]]);
}

#[test]
fn config_change_applies_on_next_cycle() {
    let config = NvsAdapter::default();
    let mut ctl = controller(|bus| bus.devices[0] = Some(single_cell_record(0, 5, 10)));
    let clock = FixedClock::at(2_000);
    assert_eq!(ctl.poll_cycle(&config, &clock, &mut RecordingSink::default()).fired, 0);

    config.set_trigger_rules(actuator(1), &rules(&[armed(0, 0, 11)])).unwrap();
    assert_eq!(ctl.poll_cycle(&config, &clock, &mut RecordingSink::default()).fired, 1);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn manual_fire_queues_pulse_and_emits_event() {
    let mut ctl = controller(|_| {});
    let config = NvsAdapter::default();
    let mut sink = RecordingSink::default();

    ctl.handle_command(AppCommand::Fire { actuator: 6, ms: 4.0 }, &config, &mut sink).unwrap();
    let req = ctl.pulses().try_next().unwrap();
    assert_eq!(req.pin, SOLENOID_GPIO[6]);
    assert_eq!(sink.lines(), vec!["Manual fire solenoid 6 for 4.00ms".to_string()]);

    assert_eq!(
        ctl.handle_command(AppCommand::Fire { actuator: 12, ms: 4.0 }, &config, &mut sink),
        Err(Error::Pulse(PulseError::UnknownActuator(12)))
    );
    assert_eq!(
        ctl.handle_command(AppCommand::Fire { actuator: 0, ms: -1.0 }, &config, &mut sink),
        Err(Error::Pulse(PulseError::InvalidDuration))
    );
    assert!(ctl.pulses().is_empty());
}

#[test]
fn invalid_scalar_leaves_store_untouched() {
    let mut ctl = controller(|_| {});
    let config = NvsAdapter::default();
    let mut sink = RecordingSink::default();
    let key = heapless::String::try_from(KEY_LOOP_ENABLED).unwrap();

    ctl.handle_command(AppCommand::SetScalar { key: key.clone(), value: 1 }, &config, &mut sink)
        .unwrap();
    assert!(ctl
        .handle_command(AppCommand::SetScalar { key, value: 7 }, &config, &mut sink)
        .is_err());
    assert_eq!(config.get_i32(KEY_LOOP_ENABLED), Some(1));
    assert_eq!(sink.events.len(), 1);
}

#[test]
fn replace_tables_through_commands() {
    let mut ctl = controller(|_| {});
    let config = NvsAdapter::default();
    let mut sink = RecordingSink::default();

    let widths = PulseWidths::parse(&"2,9,".repeat(12)).unwrap();
    ctl.handle_command(AppCommand::ReplacePulseWidths(widths), &config, &mut sink).unwrap();
    assert_eq!(config.pulse_widths(), widths);

    let mut bad = widths;
    bad.0[0].triggered_ms = f32::NAN;
    assert!(ctl.handle_command(AppCommand::ReplacePulseWidths(bad), &config, &mut sink).is_err());
    assert_eq!(config.pulse_widths(), widths);

    let set = rules(&[armed(3, 63, 5)]);
    ctl.handle_command(AppCommand::ReplaceTriggers { actuator: 9, rules: set }, &config, &mut sink)
        .unwrap();
    assert_eq!(config.trigger_rules(actuator(9)), set);
    assert_eq!(sink.events.len(), 2);
}

#[test]
fn request_addresses_cover_the_bus() {
    let mut ctl = controller(|_| {});
    ctl.poll_cycle(&NvsAdapter::default(), &FixedClock::at(0), &mut RecordingSink::default());
    let polled = &ctl.poller_mut().transport_mut().polled;
    assert_eq!(polled, &vec![BASE_ADDRESS, BASE_ADDRESS + 1, BASE_ADDRESS + 2, BASE_ADDRESS + 3]);
}
