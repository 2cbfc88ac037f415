//! Integration tests for endpoint streams
//!
//! Run with: `cargo test -p usb --test stream_tests`

use common::HostError;
use common::test_utils::{HostCall, StubDevice, StubHost};
use std::io::{self, Read, Write};
use std::time::Duration;
use usb::{CapabilityError, Context, Error, StreamCaps};

fn context() -> Context<StubHost> {
    Context::new(StubHost::new().with_device(StubDevice::new(0x1234, 0x5678)))
}

fn transfer_count(context: &Context<StubHost>) -> usize {
    context
        .host()
        .calls()
        .iter()
        .filter(|c| {
            matches!(
                c,
                HostCall::ReadBulk { .. }
                    | HostCall::WriteBulk { .. }
                    | HostCall::ReadInterrupt { .. }
                    | HostCall::WriteInterrupt { .. }
            )
        })
        .count()
}

mod bulk_streams {
    use super::*;

    #[test]
    fn test_write_only_stream_refuses_read() {
        let context = context();
        let handle = context.open_device_with_vid_pid(0x1234, 0x5678).unwrap();
        let writer = handle.bulk_writer(0x02);
        assert_eq!(writer.caps(), StreamCaps::WRITE);

        let mut buf = [0u8; 8];
        let err = writer.recv(&mut buf).unwrap_err();
        assert!(matches!(err, Error::Capability(CapabilityError::CannotRead)));
        assert_eq!(err.to_string(), "Stream error: bulk transfer: cannot read");
        assert_eq!(transfer_count(&context), 0);
    }

    #[test]
    fn test_read_only_stream_refuses_write() {
        let context = context();
        let handle = context.open_device_with_vid_pid(0x1234, 0x5678).unwrap();
        let mut reader = handle.bulk_reader(0x81);

        let err = reader.write(b"data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert_eq!(transfer_count(&context), 0);
    }

    #[test]
    fn test_duplex_stream_uses_both_endpoints() {
        let context = context();
        let handle = context.open_device_with_vid_pid(0x1234, 0x5678).unwrap();
        context.host().set_bulk_result(b"pong", 0);

        let mut stream = handle.bulk_stream(0x01, 0x02);
        stream.write_all(b"ping").unwrap();
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).unwrap();
        stream.flush().unwrap();

        assert_eq!(&buf[..n], b"pong");
        let calls = context.host().calls();
        assert!(calls.iter().any(|c| matches!(
            c,
            HostCall::WriteBulk { endpoint: 0x02, data, .. } if data == b"ping"
        )));
        assert!(calls
            .iter()
            .any(|c| matches!(c, HostCall::ReadBulk { endpoint: 0x81, .. })));
    }

    #[test]
    fn test_stream_timeout_is_independent() {
        let context = context();
        let mut handle = context.open_device_with_vid_pid(0x1234, 0x5678).unwrap();
        handle.set_timeout(Duration::from_millis(200));

        {
            let mut stream = handle.bulk_writer(0x02);
            assert_eq!(stream.timeout(), Duration::from_millis(200));
            stream.set_timeout(Duration::from_secs(5));
            stream.send(&[1]).unwrap();
        }
        assert_eq!(handle.timeout(), Duration::from_millis(200));

        let sent_with = context.host().calls().into_iter().find_map(|c| match c {
            HostCall::WriteBulk { timeout, .. } => Some(timeout),
            _ => None,
        });
        assert_eq!(sent_with, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_host_errors_become_io_errors() {
        let context = context();
        let handle = context.open_device_with_vid_pid(0x1234, 0x5678).unwrap();
        context.host().set_bulk_result(&[], HostError::Timeout.code());

        let mut reader = handle.bulk_reader(0x81);
        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}

mod interrupt_streams {
    use super::*;

    #[test]
    fn test_both_directions_on_one_endpoint() {
        let context = context();
        let handle = context.open_device_with_vid_pid(0x1234, 0x5678).unwrap();
        context.host().set_interrupt_result(&[0x01, 0x02], 0);

        let mut stream = handle.interrupt_stream(0x83);
        assert_eq!(stream.endpoint(), 0x83);

        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(stream.write(&[0xFF]).unwrap(), 1);

        let calls = context.host().calls();
        assert!(calls
            .iter()
            .any(|c| matches!(c, HostCall::ReadInterrupt { endpoint: 0x83, .. })));
        assert!(calls
            .iter()
            .any(|c| matches!(c, HostCall::WriteInterrupt { endpoint: 0x03, .. })));
    }

    #[test]
    fn test_timeout_copied_from_handle() {
        let context = context();
        let mut handle = context.open_device_with_vid_pid(0x1234, 0x5678).unwrap();
        handle.set_timeout(Duration::from_millis(50));

        let mut stream = handle.interrupt_stream(1);
        assert_eq!(stream.timeout(), Duration::from_millis(50));
        stream.set_timeout(Duration::ZERO);
        assert_eq!(stream.timeout(), Duration::ZERO);
    }

    #[test]
    fn test_interrupted_write_all_fails_once() {
        let context = context();
        let handle = context.open_device_with_vid_pid(0x1234, 0x5678).unwrap();
        context
            .host()
            .set_interrupt_result(&[], HostError::Interrupted.code());

        let mut stream = handle.interrupt_stream(1);
        let err = stream.write_all(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        let source = err.into_inner().unwrap().downcast::<Error>().unwrap();
        assert_eq!(source.host_error(), Some(HostError::Interrupted));
        assert_eq!(transfer_count(&context), 1);
    }

    #[test]
    fn test_interrupted_read_exact_fails_once() {
        let context = context();
        let handle = context.open_device_with_vid_pid(0x1234, 0x5678).unwrap();
        context
            .host()
            .set_interrupt_result(&[], HostError::Interrupted.code());

        let mut stream = handle.interrupt_stream(1);
        let mut buf = [0u8; 4];
        let err = stream.read_exact(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(transfer_count(&context), 1);
    }
}
