//! Integration tests for update plans, locking and the async runner

use std::sync::Arc;

use bytes::Bytes;
use fwkit_firmware::Firmware;
use fwkit_test_helpers::prelude::*;
use fwkit_update::prelude::*;

const FLASH_BASE: u64 = 0x0800_0000;

fn device() -> MockBackend {
    MockBackend::new(
        "mock0",
        DeviceInfo::new(64)
            .with_erase_address(FLASH_BASE)
            .with_transfer_size(16),
    )
}

fn image(len: usize) -> Firmware {
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8 + 1).collect();
    Firmware::from_bytes(data)
}

fn run(dev: &mut MockBackend, fw: &Firmware, config: &UpdateConfig) -> UpdateOutcome {
    UpdatePlan::new(dev, fw, config).execute(&mut NullProgress)
}

fn retrying(attempts: u32) -> UpdateConfig {
    UpdateConfig {
        retry: RetryPolicy {
            attempts,
            delay_ms: 0,
        },
        ..Default::default()
    }
}

mod plan_tests {
    use super::*;

    #[test]
    fn test_successful_update_writes_and_verifies() -> TestResult {
        let mut dev = device();
        let fw = image(40);
        let outcome = run(&mut dev, &fw, &UpdateConfig::default());

        outcome.clone().into_result()?;
        assert_eq!(outcome.trace, UpdatePhase::SEQUENCE);
        assert_eq!(outcome.phase_reached, UpdatePhase::Done);
        assert_eq!(outcome.device_state, DeviceState::Safe);
        assert_eq!(outcome.bytes_written, 40);
        assert_eq!(dev.flash().get(..40), Some(fw.bytes().as_ref()));
        assert!(!dev.is_detached());
        Ok(())
    }

    #[test]
    fn test_erase_blank_fills_the_whole_range() {
        let mut dev = device();
        let outcome = run(&mut dev, &image(10), &UpdateConfig::default());
        assert!(outcome.is_success());
        assert_eq!(dev.count(MockOp::Erase), 4);
        assert!(dev.flash().iter().skip(10).all(|b| *b == 0xFF));
    }

    #[test]
    fn test_lifecycle_call_order() {
        let mut dev = device();
        let outcome = run(&mut dev, &image(16), &UpdateConfig::default());
        assert!(outcome.is_success());
        let mut calls = dev.calls().to_vec();
        calls.dedup();
        assert_eq!(
            calls,
            vec![
                MockOp::Detach,
                MockOp::Erase,
                MockOp::Write,
                MockOp::Read,
                MockOp::Attach,
                MockOp::Reload,
            ]
        );
    }

    #[test]
    fn test_chunks_respect_page_and_chunk_size() {
        let mut dev = MockBackend::new(
            "mock0",
            DeviceInfo::new(64)
                .with_erase_address(FLASH_BASE)
                .with_page_size(16),
        );
        let fw = image(40).with_address(FLASH_BASE + 8);
        let config = UpdateConfig {
            max_chunk_size: Some(32),
            ..Default::default()
        };
        let outcome = run(&mut dev, &fw, &config);
        assert!(outcome.is_success());
        // 8 bytes to the first page edge, then 16, then 16
        assert_eq!(dev.count(MockOp::Write), 3);
        assert_eq!(dev.flash().get(8..48), Some(fw.bytes().as_ref()));
        assert_eq!(dev.flash().get(..8), Some(&[0xFF; 8][..]));
    }

    #[test]
    fn test_firmware_too_large_leaves_device_untouched() {
        let mut dev = device();
        let outcome = run(&mut dev, &image(65), &UpdateConfig::default());
        assert_eq!(
            outcome.result,
            Err(UpdateError::FirmwareTooLarge {
                address: FLASH_BASE,
                size: 65,
                max: 64,
            })
        );
        assert_eq!(outcome.trace, vec![UpdatePhase::Idle, UpdatePhase::Failed]);
        assert_eq!(outcome.device_state, DeviceState::Safe);
        assert!(dev.calls().is_empty());
    }

    #[test]
    fn test_firmware_outside_flash_range_rejected() {
        let mut dev = device();
        let fw = image(8).with_address(FLASH_BASE - 4);
        let outcome = run(&mut dev, &fw, &UpdateConfig::default());
        assert_eq!(
            outcome.result,
            Err(UpdateError::AddressOutOfRange {
                address: FLASH_BASE - 4,
                start: FLASH_BASE,
                end: FLASH_BASE + 64,
            })
        );
        assert_eq!(outcome.device_state, DeviceState::Safe);

        let fw = image(8).with_address(FLASH_BASE + 100);
        let outcome = run(&mut dev, &fw, &UpdateConfig::default());
        assert!(matches!(
            outcome.result,
            Err(UpdateError::AddressOutOfRange { .. })
        ));
        assert!(dev.calls().is_empty());

        // inside the window but running past its end
        let fw = image(8).with_address(FLASH_BASE + 60);
        let outcome = run(&mut dev, &fw, &UpdateConfig::default());
        assert!(matches!(
            outcome.result,
            Err(UpdateError::FirmwareTooLarge { .. })
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected_in_idle() {
        let mut dev = device();
        let config = UpdateConfig {
            max_chunk_size: Some(0),
            ..Default::default()
        };
        let outcome = run(&mut dev, &image(8), &config);
        assert!(matches!(outcome.result, Err(UpdateError::Validation(_))));
        assert_eq!(outcome.phase_reached, UpdatePhase::Idle);
    }

    #[test]
    fn test_detach_failure_is_safe() {
        let mut dev = device().with_phase_failure(
            UpdatePhase::Detaching,
            DeviceError::disconnected("mock0"),
        );
        let outcome = run(&mut dev, &image(8), &UpdateConfig::default());
        assert_eq!(
            outcome.result,
            Err(UpdateError::Device(DeviceError::disconnected("mock0")))
        );
        assert_eq!(outcome.phase_reached, UpdatePhase::Detaching);
        assert_eq!(outcome.final_phase(), UpdatePhase::Failed);
        assert_eq!(outcome.device_state, DeviceState::Safe);
        assert!(outcome.device_lost());
        assert_eq!(dev.count(MockOp::Erase), 0);
    }

    #[test]
    fn test_write_failure_is_unsafe_and_stops() {
        let mut dev =
            device().with_phase_failure(UpdatePhase::Writing, DeviceError::io("mock0", "nak"));
        let outcome = run(&mut dev, &image(40), &UpdateConfig::default());
        assert_eq!(outcome.phase_reached, UpdatePhase::Writing);
        assert_eq!(outcome.device_state, DeviceState::Unsafe);
        assert!(!outcome.device_lost());
        assert_eq!(dev.count(MockOp::Write), 1);
        assert_eq!(dev.count(MockOp::Read), 0);
        assert_eq!(
            outcome.trace,
            vec![
                UpdatePhase::Idle,
                UpdatePhase::Detaching,
                UpdatePhase::Erasing,
                UpdatePhase::Writing,
                UpdatePhase::Failed,
            ]
        );
    }

    #[test]
    fn test_erase_failure_is_safe() {
        let mut dev = device().with_failure_at(MockOp::Erase, 0, DeviceError::timeout("mock0", 100));
        let outcome = run(&mut dev, &image(8), &UpdateConfig::default());
        assert_eq!(outcome.phase_reached, UpdatePhase::Erasing);
        assert_eq!(outcome.device_state, DeviceState::Safe);
        assert_eq!(
            outcome.trace,
            vec![
                UpdatePhase::Idle,
                UpdatePhase::Detaching,
                UpdatePhase::Erasing,
                UpdatePhase::Failed,
            ]
        );
        assert_eq!(dev.count(MockOp::Write), 0);
    }

    #[test]
    fn test_transient_failures_retried() -> TestResult {
        let mut dev = device().with_transient_write_failures(2);
        let outcome = run(&mut dev, &image(40), &retrying(3));
        outcome.into_result()?;
        assert_eq!(dev.count(MockOp::Recover), 2);
        assert_eq!(dev.count(MockOp::Write), 5);
        Ok(())
    }

    #[test]
    fn test_default_policy_does_not_retry() {
        let mut dev = device().with_transient_write_failures(1);
        let outcome = run(&mut dev, &image(8), &UpdateConfig::default());
        assert!(matches!(
            outcome.result,
            Err(UpdateError::Device(DeviceError::Io { .. }))
        ));
        assert_eq!(dev.count(MockOp::Recover), 0);
    }

    #[test]
    fn test_retries_exhausted() {
        let mut dev = device().with_transient_write_failures(5);
        let outcome = run(&mut dev, &image(8), &retrying(2));
        assert!(matches!(
            outcome.result,
            Err(UpdateError::RetriesExhausted { retries: 1, .. })
        ));
        assert_eq!(dev.count(MockOp::Write), 2);
    }

    #[test]
    fn test_failed_recovery_aborts() {
        let mut dev = device()
            .with_transient_write_failures(1)
            .with_failure(MockOp::Recover, DeviceError::disconnected("mock0"));
        let outcome = run(&mut dev, &image(8), &retrying(3));
        assert!(matches!(
            outcome.result,
            Err(UpdateError::RecoveryFailed { .. })
        ));
    }

    #[test]
    fn test_verify_mismatch_is_fatal() {
        let mut dev = device().with_corrupt_readback();
        let outcome = run(&mut dev, &image(40), &retrying(3));
        assert_eq!(
            outcome.result,
            Err(UpdateError::VerifyMismatch {
                address: FLASH_BASE,
                len: 16,
            })
        );
        assert_eq!(outcome.phase_reached, UpdatePhase::Verifying);
        assert_eq!(outcome.device_state, DeviceState::Unsafe);
        assert_eq!(dev.count(MockOp::Read), 1);
    }

    #[test]
    fn test_verify_disabled_skips_readback() {
        let mut dev = device().with_corrupt_readback();
        let config = UpdateConfig {
            verify: false,
            ..Default::default()
        };
        let outcome = run(&mut dev, &image(40), &config);
        assert!(outcome.is_success());
        assert!(outcome.trace.contains(&UpdatePhase::Verifying));
        assert_eq!(dev.count(MockOp::Read), 0);
    }

    #[test]
    fn test_empty_firmware_still_erases() {
        let mut dev = device();
        let outcome = run(&mut dev, &Firmware::from_bytes(Bytes::new()), &UpdateConfig::default());
        assert!(outcome.is_success());
        assert_eq!(dev.count(MockOp::Write), 0);
        assert!(dev.flash().iter().all(|b| *b == 0xFF));
    }
}

mod unlock_tests {
    use super::*;

    fn unlock_config(timeout_ms: u64) -> UpdateConfig {
        UpdateConfig {
            user_action: UserActionPolicy {
                timeout_ms,
                poll_interval_ms: 1,
            },
            ..Default::default()
        }
    }

    fn locked_device(polls: u32) -> MockBackend {
        MockBackend::new("mock0", DeviceInfo::new(16).with_user_unlock()).with_unlock_after(polls)
    }

    #[test]
    fn test_waits_for_unlock() {
        let mut dev = locked_device(2);
        let outcome = run(&mut dev, &image(8), &unlock_config(5_000));
        assert!(outcome.is_success());
        assert_eq!(dev.count(MockOp::Unlock), 3);
    }

    #[test]
    fn test_unlock_timeout_needs_user_action() {
        let mut dev = locked_device(u32::MAX);
        let outcome = run(&mut dev, &image(8), &unlock_config(5));
        assert_eq!(
            outcome.result,
            Err(UpdateError::UserActionTimeout {
                device: "mock0".into(),
                timeout_ms: 5,
            })
        );
        assert_eq!(outcome.phase_reached, UpdatePhase::Detaching);
        assert_eq!(outcome.device_state, DeviceState::Safe);
    }

    #[test]
    fn test_unlock_not_polled_when_not_needed() {
        let mut dev = device();
        assert!(run(&mut dev, &image(8), &UpdateConfig::default()).is_success());
        assert_eq!(dev.count(MockOp::Unlock), 0);
    }
}

mod cancel_tests {
    use super::*;

    /// Requests cancellation from inside the first write.
    struct CancelOnWrite {
        inner: MockBackend,
        token: CancelToken,
    }

    impl DeviceBackend for CancelOnWrite {
        fn id(&self) -> &str {
            self.inner.id()
        }
        fn info(&self) -> DeviceInfo {
            self.inner.info()
        }
        fn detach(&mut self) -> Result<(), DeviceError> {
            self.inner.detach()
        }
        fn erase(&mut self, address: u64, len: usize, fill: u8) -> Result<(), DeviceError> {
            self.inner.erase(address, len, fill)
        }
        fn write(&mut self, address: u64, data: &[u8]) -> Result<(), DeviceError> {
            self.token.cancel();
            self.inner.write(address, data)
        }
        fn read(&mut self, address: u64, len: usize) -> Result<Bytes, DeviceError> {
            self.inner.read(address, len)
        }
        fn attach(&mut self) -> Result<(), DeviceError> {
            self.inner.attach()
        }
        fn reload(&mut self) -> Result<(), DeviceError> {
            self.inner.reload()
        }
    }

    #[test]
    fn test_cancel_before_start() {
        let mut dev = device();
        let token = CancelToken::new();
        token.cancel();
        let fw = image(8);
        let config = UpdateConfig::default();
        let outcome = UpdatePlan::new(&mut dev, &fw, &config)
            .with_cancel(token)
            .execute(&mut NullProgress);
        assert_eq!(outcome.result, Err(UpdateError::Cancelled));
        assert_eq!(outcome.trace, vec![UpdatePhase::Idle, UpdatePhase::Failed]);
        assert!(dev.calls().is_empty());
    }

    #[test]
    fn test_cancel_waits_for_current_chunk() {
        let token = CancelToken::new();
        let mut dev = CancelOnWrite {
            inner: device(),
            token: token.clone(),
        };
        let fw = image(40);
        let config = UpdateConfig::default();
        let outcome = UpdatePlan::new(&mut dev, &fw, &config)
            .with_cancel(token)
            .execute(&mut NullProgress);
        assert_eq!(outcome.result, Err(UpdateError::Cancelled));
        assert_eq!(outcome.phase_reached, UpdatePhase::Writing);
        assert_eq!(outcome.bytes_written, 16);
        assert_eq!(dev.inner.count(MockOp::Write), 1);
        assert_eq!(dev.inner.flash().get(..16), fw.bytes().get(..16));
    }
}

mod progress_tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic_and_completes() {
        let mut dev = device();
        let fw = image(40);
        let config = UpdateConfig::default();
        let mut progress = RecordingProgress::new();
        let outcome = UpdatePlan::new(&mut dev, &fw, &config).execute(&mut progress);
        assert!(outcome.is_success());

        let overall: Vec<u8> = progress.updates().iter().map(|u| u.overall_percent).collect();
        assert!(overall.windows(2).all(|w| w.first() <= w.last()));
        assert_eq!(progress.last_overall(), 100);
        assert!(progress.updates().iter().all(|u| u.phase_percent <= 100));
    }

    #[test]
    fn test_write_progress_counts_bytes() {
        let mut dev = device();
        let fw = image(40);
        let config = UpdateConfig::default();
        let mut progress = RecordingProgress::new();
        let outcome = UpdatePlan::new(&mut dev, &fw, &config).execute(&mut progress);
        assert!(outcome.is_success());

        let written: Vec<u64> = progress
            .updates()
            .iter()
            .filter(|u| u.phase == UpdatePhase::Writing && u.bytes_total == 40)
            .map(|u| u.bytes_done)
            .collect();
        assert_eq!(written, vec![16, 32, 40]);
    }

    #[test]
    fn test_failed_plan_progress_stops() {
        let mut dev =
            device().with_phase_failure(UpdatePhase::Writing, DeviceError::io("mock0", "nak"));
        let fw = image(40);
        let config = UpdateConfig::default();
        let mut progress = RecordingProgress::new();
        let outcome = UpdatePlan::new(&mut dev, &fw, &config).execute(&mut progress);
        assert!(!outcome.is_success());
        assert!(progress.last_overall() < 100);
        assert_eq!(progress.updates().last().map(|u| u.phase), Some(UpdatePhase::Writing));
    }
}

mod logging_tests {
    use super::*;

    #[test]
    #[tracing_test::traced_test]
    fn test_retry_is_logged() {
        let mut dev = device().with_transient_write_failures(1);
        let outcome = run(&mut dev, &image(8), &retrying(2));
        assert!(outcome.is_success());
        assert!(logs_contain("operation failed, retrying"));
        assert!(logs_contain("device update complete"));
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_failure_is_logged() {
        let mut dev = device().with_corrupt_readback();
        let outcome = run(&mut dev, &image(8), &UpdateConfig::default());
        assert!(!outcome.is_success());
        assert!(logs_contain("device update failed"));
        assert!(logs_contain("update phase transition to failed"));
    }
}

mod runner_tests {
    use super::*;

    fn runner() -> Result<AsyncUpdateRunner, Box<dyn std::error::Error>> {
        Ok(AsyncUpdateRunner::new(UpdateConfig::default())?)
    }

    #[tokio::test]
    async fn test_run_returns_backend() -> TestResult {
        let runner = runner()?;
        let fw = Arc::new(image(24));
        let (outcome, dev) =
            must_async(runner.run(device(), Arc::clone(&fw), Box::new(NullProgress), CancelToken::new())).await;
        assert!(outcome.is_success());
        assert_eq!(dev.flash().get(..24), Some(fw.bytes().as_ref()));
        assert_eq!(runner.locker().active(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_held_device_is_busy() -> TestResult {
        let runner = runner()?;
        let _held = runner.locker().try_lock("mock0")?;
        let (outcome, dev) = runner
            .run(device(), Arc::new(image(8)), Box::new(NullProgress), CancelToken::new())
            .await?;
        assert_eq!(outcome.result, Err(UpdateError::Busy("mock0".into())));
        assert_eq!(outcome.trace, vec![UpdatePhase::Idle, UpdatePhase::Failed]);
        assert!(dev.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_proxied_device_locks_its_host() -> TestResult {
        let runner = runner()?;
        runner.register_device("host");
        runner.register_proxied("mock0", "host")?;
        let _held = runner.locker().try_lock("host")?;
        let (outcome, _dev) = runner
            .run(device(), Arc::new(image(8)), Box::new(NullProgress), CancelToken::new())
            .await?;
        assert_eq!(outcome.result, Err(UpdateError::Busy("host".into())));
        Ok(())
    }

    #[tokio::test]
    async fn test_independent_devices_run_concurrently() -> TestResult {
        let runner = runner()?;
        let fw = Arc::new(image(32));
        let a = MockBackend::new("a", DeviceInfo::new(64));
        let b = MockBackend::new("b", DeviceInfo::new(64));
        let (ra, rb) = tokio::join!(
            runner.run(a, Arc::clone(&fw), Box::new(NullProgress), CancelToken::new()),
            runner.run(b, Arc::clone(&fw), Box::new(NullProgress), CancelToken::new()),
        );
        assert!(ra?.0.is_success());
        assert!(rb?.0.is_success());
        Ok(())
    }

    #[tokio::test]
    async fn test_channel_progress_reaches_receiver() -> TestResult {
        let runner = runner()?;
        let (sink, rx) = ChannelProgress::bounded(256);
        let (outcome, _dev) = runner
            .run(device(), Arc::new(image(8)), Box::new(sink), CancelToken::new())
            .await?;
        assert!(outcome.is_success());
        let last = rx.try_iter().last().map(|u| u.overall_percent);
        assert_eq!(last, Some(100));
        Ok(())
    }

    #[tokio::test]
    async fn test_run_checked_adds_context() -> TestResult {
        let runner = runner()?;
        let dev = device().with_phase_failure(UpdatePhase::Writing, DeviceError::io("mock0", "nak"));
        let err = runner
            .run_checked(dev, Arc::new(image(8)), Box::new(NullProgress), CancelToken::new())
            .await
            .err();
        assert_eq!(
            err.as_ref().map(|e| e.to_string()).as_deref(),
            Some("update of device mock0 failed while writing")
        );
        assert_eq!(
            err.map(|e| e.root_cause().to_string()).as_deref(),
            Some("I/O error on device mock0: nak")
        );
        Ok(())
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = UpdateConfig {
            retry: RetryPolicy {
                attempts: 0,
                delay_ms: 0,
            },
            ..Default::default()
        };
        assert!(AsyncUpdateRunner::new(config).is_err());
    }
}
