//! Driver lifecycle integration tests
//!
//! Exercises init/begin/stop/shutdown against a recording platform, including
//! every injected acquisition failure and the resource accounting after it.

mod helpers;

use helpers::*;
use mvoc_out::{DriverState, Error, ErrorCode, MixBuffer, NextDivision};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

/// Source filling each division with the next byte tag
fn tagging_source(start: u8) -> impl FnMut(NextDivision<'_>) + Send + 'static {
    let tag = AtomicU8::new(start);
    move |mut next: NextDivision<'_>| {
        let value = tag.fetch_add(1, Ordering::SeqCst) + 1;
        next.fill(value);
    }
}

fn buffer_with_first_division(byte: u8) -> MixBuffer {
    let mut buffer = MixBuffer::new(TEST_SUBMISSION_BYTES, 4).unwrap();
    buffer.division_mut(0).unwrap().fill(byte);
    buffer
}

#[test]
fn test_playback_calls_before_init_report_not_initialized() {
    let platform = RecordingPlatform::new();
    let mut driver = driver_on(&platform);

    assert!(matches!(driver.lock(), Err(Error::NotInitialized)));
    assert!(matches!(driver.try_lock(), Err(Error::NotInitialized)));
    let result = driver.begin_playback(buffer_with_first_division(0), tagging_source(0));
    assert!(matches!(result, Err(Error::NotInitialized)));

    assert_eq!(driver.last_error(), ErrorCode::NotInitialized);
    assert!(driver.stop_playback().is_none());
    assert_eq!(platform.log().reserves(), 0);
}

#[test]
fn test_init_writes_back_native_format() {
    let platform = RecordingPlatform::new();
    let mut driver = driver_on(&platform);

    let (mut rate, mut channels) = (48_000, 6);
    driver.init(&mut rate, &mut channels).unwrap();

    assert_eq!((rate, channels), (44_100, 2));
    assert_eq!(driver.state(), DriverState::Initialized);
    assert_eq!(platform.log().reserves(), 1);
    assert_eq!(driver.last_error(), ErrorCode::Ok);
}

#[test]
fn test_channel_reserve_failure() {
    let platform = RecordingPlatform::new();
    platform.set_faults(FaultPlan {
        fail_reserve: true,
        ..FaultPlan::default()
    });
    let mut driver = driver_on(&platform);

    let (mut rate, mut channels) = (44_100, 2);
    let result = driver.init(&mut rate, &mut channels);

    assert!(matches!(result, Err(Error::ChannelReserve(_))));
    assert_eq!(driver.state(), DriverState::Uninitialized);
    assert_eq!(driver.last_error(), ErrorCode::ChannelReserveFailed);
    assert_eq!(
        driver.error_string(driver.last_error()),
        "Output driver: channel reserve failed."
    );
    assert_eq!(platform.log().reserves(), 0);
}

#[test]
fn test_guard_failure_releases_channel() {
    let platform = RecordingPlatform::new();
    platform.set_faults(FaultPlan {
        fail_guard: true,
        ..FaultPlan::default()
    });
    let mut driver = driver_on(&platform);

    let (mut rate, mut channels) = (44_100, 2);
    let result = driver.init(&mut rate, &mut channels);

    assert!(matches!(result, Err(Error::SemaphoreCreate(_))));
    assert_eq!(driver.state(), DriverState::Uninitialized);
    assert_eq!(driver.last_error(), ErrorCode::SemaphoreCreateFailed);
    assert_eq!(platform.log().reserves(), 1);
    assert_eq!(platform.log().releases(), 1);

    // A later init succeeds once the fault clears
    platform.clear_faults();
    driver.init(&mut rate, &mut channels).unwrap();
    assert_eq!(driver.state(), DriverState::Initialized);
}

#[test]
fn test_thread_create_failure_leaves_driver_initialized() {
    let platform = RecordingPlatform::new();
    let mut driver = initialized_driver(&platform);
    platform.set_faults(FaultPlan {
        fail_spawn: true,
        ..FaultPlan::default()
    });

    let result = driver.begin_playback(buffer_with_first_division(0), tagging_source(0));

    assert!(matches!(result, Err(Error::ThreadCreate(_))));
    assert_eq!(driver.state(), DriverState::Initialized);
    assert_eq!(driver.last_error(), ErrorCode::ThreadCreateFailed);
    assert!(!driver.lock().unwrap().is_configured());

    platform.clear_faults();
    driver
        .begin_playback(buffer_with_first_division(0), tagging_source(0))
        .unwrap();
    assert_eq!(driver.state(), DriverState::Playing);
}

#[test]
fn test_thread_start_failure_leaves_driver_initialized() {
    let platform = RecordingPlatform::new();
    platform.set_faults(FaultPlan {
        fail_enter_pump: true,
        ..FaultPlan::default()
    });
    let mut driver = initialized_driver(&platform);

    let result = driver.begin_playback(buffer_with_first_division(0), tagging_source(0));

    assert!(matches!(result, Err(Error::ThreadStart(_))));
    assert_eq!(driver.state(), DriverState::Initialized);
    assert_eq!(driver.last_error(), ErrorCode::ThreadStartFailed);
    assert_eq!(
        driver.error_string(ErrorCode::GenericError),
        "Output driver: failed starting mix thread."
    );
    assert!(!driver.lock().unwrap().is_configured());
    assert_eq!(platform.log().submitted(), 0);

    // The injected failure fires once per channel
    driver
        .begin_playback(buffer_with_first_division(0), tagging_source(0))
        .unwrap();
    assert!(wait_until(WAIT, || platform.log().submitted() > 0));
}

#[test]
fn test_submissions_follow_division_order() {
    let platform = RecordingPlatform::with_capture(8);
    let mut driver = initialized_driver(&platform);
    driver.set_volume(0x4000, 0x2000);

    driver
        .begin_playback(buffer_with_first_division(0x10), tagging_source(0x10))
        .unwrap();
    assert!(wait_until(WAIT, || platform.log().captured().len() == 8));
    driver.stop_playback().unwrap();

    let captured = platform.log().captured();
    for (n, submission) in captured.iter().enumerate() {
        let expected = uniform_sample(0x10 + n as u8);
        assert!(
            submission.samples.iter().all(|&s| s == expected),
            "submission {} out of order",
            n
        );
        assert_eq!(submission.volume.left, 0x4000);
        assert_eq!(submission.volume.right, 0x2000);
    }
}

#[test]
fn test_each_begin_restarts_at_division_zero() {
    let platform = RecordingPlatform::new();
    let mut driver = initialized_driver(&platform);

    for _ in 0..2 {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let source = {
            let seen = Arc::clone(&seen);
            move |next: NextDivision<'_>| seen.lock().unwrap().push(next.index())
        };
        driver
            .begin_playback(MixBuffer::new(TEST_SUBMISSION_BYTES, 4).unwrap(), source)
            .unwrap();
        assert!(wait_until(WAIT, || seen.lock().unwrap().len() >= 3));

        let buffer = driver.stop_playback().unwrap();
        assert_eq!(buffer.division_count(), 4);
        assert_eq!(&seen.lock().unwrap()[..3], &[1, 2, 3]);
        assert!(driver.lock().unwrap().cursor().is_none());
    }
}

#[test]
fn test_begin_while_playing_replaces_buffer() {
    let platform = RecordingPlatform::new();
    let mut driver = initialized_driver(&platform);

    driver
        .begin_playback(MixBuffer::new(TEST_SUBMISSION_BYTES, 4).unwrap(), tagging_source(0))
        .unwrap();
    driver
        .begin_playback(MixBuffer::new(TEST_SUBMISSION_BYTES, 2).unwrap(), tagging_source(0))
        .unwrap();

    assert_eq!(driver.state(), DriverState::Playing);
    let buffer = driver.stop_playback().unwrap();
    assert_eq!(buffer.division_count(), 2);
}

#[test]
fn test_lock_writes_reach_hardware() {
    let platform = RecordingPlatform::with_capture(256);
    let mut driver = initialized_driver(&platform);

    // The source never touches division 0, so the next wrap plays what we wrote
    driver
        .begin_playback(MixBuffer::new(TEST_SUBMISSION_BYTES, 4).unwrap(), |_: NextDivision<'_>| {})
        .unwrap();
    {
        let mut guard = driver.lock().unwrap();
        guard.division_mut(0).unwrap().fill(0x5a);
    }
    assert!(wait_until(WAIT, || platform
        .log()
        .captured()
        .iter()
        .any(|s| s.samples[0] == uniform_sample(0x5a))));
    driver.stop_playback();
}

#[test]
fn test_shutdown_is_idempotent_and_releases_once() {
    let platform = RecordingPlatform::new();
    let mut driver = initialized_driver(&platform);
    driver
        .begin_playback(buffer_with_first_division(0), tagging_source(0))
        .unwrap();

    driver.shutdown();
    driver.shutdown();

    assert_eq!(driver.state(), DriverState::Uninitialized);
    assert_eq!(platform.log().reserves(), 1);
    assert_eq!(platform.log().releases(), 1);
    assert!(matches!(driver.lock(), Err(Error::NotInitialized)));
}

#[test]
fn test_reinit_shuts_down_first() {
    let platform = RecordingPlatform::new();
    let mut driver = initialized_driver(&platform);
    driver
        .begin_playback(buffer_with_first_division(0), tagging_source(0))
        .unwrap();

    let (mut rate, mut channels) = (44_100, 2);
    driver.init(&mut rate, &mut channels).unwrap();

    assert_eq!(driver.state(), DriverState::Initialized);
    assert_eq!(platform.log().reserves(), 2);
    assert_eq!(platform.log().releases(), 1);
}

#[test]
fn test_drop_shuts_down() {
    let platform = RecordingPlatform::new();
    {
        let mut driver = initialized_driver(&platform);
        driver
            .begin_playback(buffer_with_first_division(0), tagging_source(0))
            .unwrap();
        assert!(wait_until(WAIT, || platform.log().submitted() > 0));
    }
    assert_eq!(platform.log().releases(), 1);

    // No pump left running after drop
    let submitted = platform.log().submitted();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(platform.log().submitted(), submitted);
}

#[test]
fn test_stop_blocks_until_pump_exits() {
    let platform = RecordingPlatform::new();
    let mut driver = initialized_driver(&platform);
    driver
        .begin_playback(buffer_with_first_division(0), tagging_source(0))
        .unwrap();
    assert!(wait_until(WAIT, || driver.submissions() >= 2));

    driver.stop_playback().unwrap();
    let submitted = platform.log().submitted();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(platform.log().submitted(), submitted);
    assert_eq!(driver.submissions(), 0);
}
