//! Snapshot tests for update error messages, traces and progress

use core::fmt::Display;

use fwkit_firmware::Firmware;
use fwkit_update::prelude::*;
use insta::assert_snapshot;

fn message<T, E: Display>(result: Result<T, E>) -> String {
    result.err().map(|e| e.to_string()).unwrap_or_default()
}

fn trace(outcome: &UpdateOutcome) -> String {
    outcome
        .trace
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn device() -> MockBackend {
    MockBackend::new(
        "mock0",
        DeviceInfo::new(16)
            .with_erase_address(0x0800_0000)
            .with_transfer_size(8),
    )
}

fn run(dev: &mut MockBackend, len: usize, config: &UpdateConfig) -> UpdateOutcome {
    let fw = Firmware::from_bytes(vec![0xA5; len]);
    UpdatePlan::new(dev, &fw, config).execute(&mut NullProgress)
}

#[test]
fn snapshot_success_trace() {
    let outcome = run(&mut device(), 8, &UpdateConfig::default());
    assert_snapshot!(trace(&outcome), @"idle -> detaching -> erasing -> writing -> verifying -> attaching -> reloading -> done");
}

#[test]
fn snapshot_write_failure_trace() {
    let mut dev = device().with_phase_failure(UpdatePhase::Writing, DeviceError::io("mock0", "nak"));
    let outcome = run(&mut dev, 8, &UpdateConfig::default());
    assert_snapshot!(trace(&outcome), @"idle -> detaching -> erasing -> writing -> failed");
    assert_snapshot!(message(outcome.into_result()), @"Device error: I/O error on device mock0: nak");
}

#[test]
fn snapshot_firmware_too_large() {
    let outcome = run(&mut device(), 32, &UpdateConfig::default());
    assert_snapshot!(message(outcome.into_result()), @"Firmware of 32 bytes at 0x8000000 exceeds device capacity of 16 bytes");
}

#[test]
fn snapshot_retries_exhausted() {
    let mut dev = device().with_transient_write_failures(3);
    let config = UpdateConfig {
        retry: RetryPolicy {
            attempts: 3,
            delay_ms: 0,
        },
        ..Default::default()
    };
    let outcome = run(&mut dev, 8, &config);
    assert_snapshot!(message(outcome.into_result()), @"write failed after 2 retries: I/O error on device mock0: transient write stall");
}

#[test]
fn snapshot_verify_mismatch() {
    let mut dev = device().with_corrupt_readback();
    let outcome = run(&mut dev, 8, &UpdateConfig::default());
    assert_snapshot!(message(outcome.into_result()), @"Verification failed at 0x8000000: 8 bytes differ from the written chunk");
}

#[test]
fn snapshot_user_action_timeout() {
    let mut dev = MockBackend::new("mock0", DeviceInfo::new(16).with_user_unlock()).with_unlock_after(u32::MAX);
    let config = UpdateConfig {
        user_action: UserActionPolicy {
            timeout_ms: 2,
            poll_interval_ms: 1,
        },
        ..Default::default()
    };
    let outcome = run(&mut dev, 8, &config);
    assert_snapshot!(message(outcome.into_result()), @"Device mock0 needs user action: not unlocked within 2ms");
}

#[test]
fn snapshot_busy() -> Result<(), UpdateError> {
    let locker = DeviceLocker::new();
    let _held = locker.try_lock("mock0")?;
    assert_snapshot!(message(locker.try_lock("mock0")), @"Update already in progress for device: mock0");
    Ok(())
}

#[test]
fn snapshot_invalid_weights() {
    let config = UpdateConfig {
        weights: PhaseWeights {
            write: 40,
            ..Default::default()
        },
        ..Default::default()
    };
    let outcome = run(&mut device(), 8, &config);
    assert_snapshot!(message(outcome.into_result()), @"Invalid configuration: Constraint violation: phase weights must sum to 100, got 88");
}

#[test]
fn snapshot_progress() {
    let mut dev = device();
    let fw = Firmware::from_bytes(vec![0xA5; 8]);
    let config = UpdateConfig::default();
    let mut progress = RecordingProgress::new();
    let outcome = UpdatePlan::new(&mut dev, &fw, &config).execute(&mut progress);
    assert!(outcome.is_success());

    let lines: Vec<String> = progress
        .updates()
        .iter()
        .map(|u| format!("{} {}% {}%", u.phase, u.phase_percent, u.overall_percent))
        .collect();
    assert_snapshot!(lines.join("\n"), @r"
    detaching 0% 0%
    detaching 100% 2%
    erasing 0% 2%
    erasing 50% 12%
    erasing 100% 22%
    writing 0% 22%
    writing 100% 74%
    verifying 0% 74%
    verifying 100% 96%
    attaching 0% 96%
    attaching 100% 98%
    reloading 0% 98%
    reloading 100% 100%
    done 100% 100%
    ");
}
