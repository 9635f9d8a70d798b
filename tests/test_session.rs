// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod common;

use common::{config, screen, FakeCamera, FakeDisplay};
use edgefirst_camera_lcd::{
    buffer::BufferState,
    fbdev::Framebuffer,
    session::{CaptureSession, StreamState},
    v4l2::{FourCC, V4l2Device, YUYV},
    Error,
};
use std::error::Error as _;

fn session() -> (CaptureSession<FakeCamera, FakeDisplay>, FakeCamera, FakeDisplay) {
    let camera = FakeCamera::default();
    let display = FakeDisplay::default();
    let session = CaptureSession::new(camera.clone(), display.clone());
    (session, camera, display)
}

#[test]
fn test_setup() -> Result<(), Box<dyn std::error::Error>> {
    let (mut session, camera, display) = session();
    session.setup(&config())?;

    assert_eq!(session.state(), StreamState::Streaming);
    assert_eq!(session.capabilities().map(|c| c.card.as_str()), Some("Fake Camera"));

    let format = session.format().copied().ok_or("no format")?;
    assert_eq!((format.width, format.height, format.fourcc), (640, 480, YUYV));
    assert_eq!(format.bytes_per_line, 1280);

    let pool = session.pool();
    assert_eq!(pool.size(), 4);
    assert_eq!(pool.mapped(), 4);
    for index in 0..4 {
        assert_eq!(pool.state(index), Some(BufferState::Queued));
    }
    assert_eq!(pool.dequeued(), None);

    let state = camera.state();
    assert_eq!(state.requested, 4);
    assert_eq!(state.maps, 4);
    assert_eq!(state.stream_on_calls, 1);
    assert_eq!(state.queue.len(), 4);
    drop(state);

    // startup clear covers the whole surface, not only the frame area
    let surface = session.surface().ok_or("no surface")?;
    assert_eq!(surface.stride(), 1600);
    assert_eq!(surface.as_slice().len(), 1600 * 480);
    assert!(surface.as_slice().iter().all(|&b| b == 0));
    assert_eq!(display.state().maps, 1);

    Ok(())
}

#[test]
fn test_teardown_on_drop() -> Result<(), Box<dyn std::error::Error>> {
    let (mut session, camera, display) = session();
    session.setup(&config())?;
    drop(session);

    let state = camera.state();
    assert_eq!(state.stream_off_calls, 1);
    assert!(!state.streaming);
    assert_eq!(state.unmaps, state.maps);
    assert_eq!(display.state().unmaps, 1);
    Ok(())
}

#[test]
fn test_stop_streaming_once() -> Result<(), Box<dyn std::error::Error>> {
    let (mut session, camera, _display) = session();
    session.setup(&config())?;

    session.stop_streaming()?;
    session.stop_streaming()?;
    assert_eq!(session.state(), StreamState::Stopped);
    assert_eq!(session.pool().state(0), Some(BufferState::Idle));
    assert!(session.start_streaming().is_err());

    drop(session);
    assert_eq!(camera.state().stream_off_calls, 1);
    Ok(())
}

#[test]
fn test_missing_capture_capability() {
    let (mut session, camera, _display) = session();
    camera.state().capabilities = 0x0000_0002;

    let err = session.setup(&config()).unwrap_err();
    assert!(matches!(err, Error::Capability { .. }), "{err}");
    assert_eq!(err.exit_code(), 3);
    assert!(session.format().is_none());
}

#[test]
fn test_unsupported_format() {
    let (mut session, camera, _display) = session();
    camera.state().formats = vec![FourCC(*b"MJPG"), FourCC(*b"NV12")];

    let err = session.setup(&config()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(f) if f == YUYV), "{err}");
    assert_eq!(err.exit_code(), 4);
    assert!(camera.state().format.is_none());
}

#[test]
fn test_driver_adjusts_size() -> Result<(), Box<dyn std::error::Error>> {
    let (mut session, camera, _display) = session();
    camera.state().forced_size = Some((320, 240));

    session.setup(&config())?;
    let format = session.format().copied().ok_or("no format")?;
    assert_eq!((format.width, format.height), (320, 240));
    assert_eq!(format.bytes_per_line, 640);
    Ok(())
}

#[test]
fn test_driver_empty_frame() {
    for size in [(0, 0), (640, 0), (0, 480)] {
        let (mut session, camera, display) = session();
        camera.state().forced_size = Some(size);

        let err = session.setup(&config()).unwrap_err();
        assert!(matches!(err, Error::FrameSize { .. }), "{err}");
        assert_eq!(err.exit_code(), 4);
        assert!(session.format().is_none());
        assert_eq!(display.state().maps, 0);
        assert_eq!(camera.state().requested, 0);
    }
}

#[test]
fn test_driver_odd_width() {
    let (mut session, camera, _display) = session();
    camera.state().forced_size = Some((641, 480));

    let err = session.setup(&config()).unwrap_err();
    assert!(
        matches!(
            err,
            Error::FrameSize {
                width: 641,
                height: 480
            }
        ),
        "{err}"
    );
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn test_display_too_small() {
    let (mut session, camera, display) = session();
    display.state().info = screen(480, 272, 16);

    let err = session.setup(&config()).unwrap_err();
    assert!(
        matches!(
            err,
            Error::DisplayGeometry {
                display_width: 480,
                display_height: 272,
                frame_width: 640,
                frame_height: 480,
            }
        ),
        "{err}"
    );
    assert_eq!(err.exit_code(), 4);
    assert_eq!(display.state().maps, 0);
    assert_eq!(camera.state().maps, 0);
}

#[test]
fn test_display_not_rgb565() {
    let (mut session, _camera, display) = session();
    display.state().info = screen(800, 480, 32);

    let err = session.setup(&config()).unwrap_err();
    assert!(matches!(err, Error::DisplayFormat { bits_per_pixel: 32 }), "{err}");
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn test_short_allocation() {
    let (mut session, camera, display) = session();
    camera.state().grant = Some(2);

    let err = session.setup(&config()).unwrap_err();
    assert!(
        matches!(
            err,
            Error::BufferAllocation {
                requested: 4,
                granted: 2
            }
        ),
        "{err}"
    );
    assert_eq!(err.exit_code(), 5);
    assert_eq!(camera.state().maps, 0);
    // the grant is handed back
    assert_eq!(camera.state().requested, 0);

    // the display mapped in an earlier stage is released with the session
    drop(session);
    assert_eq!(display.state().unmaps, 1);
}

#[test]
fn test_map_failure_rolls_back() {
    let (mut session, camera, display) = session();
    camera.state().fail_map_at = Some(2);

    let err = session.setup(&config()).unwrap_err();
    assert!(matches!(err, Error::Map { index: 2, .. }), "{err}");
    assert_eq!(err.exit_code(), 6);
    assert!(err.source().is_some());

    {
        let state = camera.state();
        assert_eq!(state.maps, 2);
        assert_eq!(state.unmaps, 2);
        assert_eq!(state.stream_on_calls, 0);
        // the allocation is handed back as well
        assert_eq!(state.requested, 0);
    }
    assert_eq!(session.pool().mapped(), 0);
    assert_eq!(session.state(), StreamState::Idle);

    drop(session);
    assert_eq!(camera.state().stream_off_calls, 0);
    assert_eq!(camera.state().unmaps, 2);
    assert_eq!(display.state().unmaps, 1);
}

#[test]
fn test_queue_failure_rolls_back() {
    let (mut session, camera, display) = session();
    camera.state().fail_queue_at = Some(2);

    let err = session.setup(&config()).unwrap_err();
    assert!(matches!(err, Error::Queue { index: 2, .. }), "{err}");
    assert_eq!(err.exit_code(), 7);
    assert_eq!(session.state(), StreamState::Idle);
    assert_eq!(session.pool().state(1), Some(BufferState::Queued));
    assert_eq!(session.pool().state(2), Some(BufferState::Idle));
    assert_eq!(camera.state().stream_on_calls, 0);

    // buffers already queued are reclaimed with a stream off
    drop(session);
    let state = camera.state();
    assert_eq!(state.stream_off_calls, 1);
    assert!(state.queue.is_empty());
    assert_eq!(state.maps, 4);
    assert_eq!(state.unmaps, 4);
    assert_eq!(display.state().unmaps, 1);
}

#[test]
fn test_stream_on_failure_rolls_back() {
    let (mut session, camera, display) = session();
    camera.state().fail_stream_on = true;

    let err = session.setup(&config()).unwrap_err();
    assert!(matches!(err, Error::StreamControl(_)), "{err}");
    assert_eq!(err.exit_code(), 7);
    assert!(err.source().is_some());
    assert_eq!(session.state(), StreamState::Idle);
    assert_eq!(camera.state().stream_on_calls, 1);
    assert_eq!(camera.state().queue.len(), 4);

    drop(session);
    let state = camera.state();
    assert_eq!(state.stream_off_calls, 1);
    assert!(state.queue.is_empty());
    assert_eq!(state.unmaps, 4);
    assert_eq!(display.state().unmaps, 1);
}

#[test]
fn test_open_missing_device() {
    let err = CaptureSession::<V4l2Device, Framebuffer>::open(
        "/dev/this-video-does-not-exist",
        "/dev/fb0",
    )
    .err()
    .expect("open should fail");
    assert!(matches!(err, Error::DeviceOpen { .. }), "{err}");
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("/dev/this-video-does-not-exist"));
}
