//! Handles shared between threads
//!
//! A handle's default timeout can only change through `&mut`, so threads
//! sharing one handle serialise through a mutex. Per-call overrides need
//! only `&` and leave the default alone.
//!
//! Run with: `cargo test -p usb --test concurrency_tests`

use common::test_utils::{HostCall, StubDevice, StubHost};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use usb::Context;

fn context() -> Context<StubHost> {
    Context::new(StubHost::new().with_device(StubDevice::new(0x1234, 0x5678)))
}

fn write_timeouts(context: &Context<StubHost>) -> Vec<Duration> {
    context
        .host()
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            HostCall::WriteBulk { timeout, .. } => Some(timeout),
            _ => None,
        })
        .collect()
}

#[test]
fn test_shared_handle_with_overrides() {
    let context = context();
    let mut handle = context.open_device_with_vid_pid(0x1234, 0x5678).unwrap();
    handle.set_timeout(Duration::from_millis(100));

    thread::scope(|s| {
        for i in 1..=4u64 {
            let handle = &handle;
            s.spawn(move || {
                handle
                    .bulk_write_timeout(0x02, &[i as u8], Duration::from_millis(i * 1000))
                    .unwrap();
            });
        }
    });

    assert_eq!(handle.timeout(), Duration::from_millis(100));
    let mut timeouts = write_timeouts(&context);
    timeouts.sort();
    assert_eq!(
        timeouts,
        (1..=4u64).map(Duration::from_secs).collect::<Vec<_>>()
    );
}

#[test]
fn test_mutex_serialises_timeout_changes() {
    let context = context();
    let handle = Mutex::new(context.open_device_with_vid_pid(0x1234, 0x5678).unwrap());

    thread::scope(|s| {
        for i in 1..=8u64 {
            let handle = &handle;
            s.spawn(move || {
                let mut guard = handle.lock().unwrap();
                guard.set_timeout(Duration::from_millis(i));
                guard.bulk_write(0x02, &[0]).unwrap();
                // Nobody else can change the timeout while we hold the lock
                assert_eq!(guard.timeout(), Duration::from_millis(i));
            });
        }
    });

    let mut timeouts = write_timeouts(&context);
    timeouts.sort();
    assert_eq!(
        timeouts,
        (1..=8u64).map(Duration::from_millis).collect::<Vec<_>>()
    );

    handle.into_inner().unwrap().close();
    assert!(context.host().open_handles().is_empty());
}
