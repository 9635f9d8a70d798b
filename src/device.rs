// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Device interfaces used by the capture session.
//!
//! [`CaptureDevice`] and [`DisplayDevice`] describe exactly the kernel
//! operations the pipeline relies on. The production implementations live in
//! [`crate::v4l2`] and [`crate::fbdev`]; anything else implementing the traits
//! (an in-memory device in tests, for example) can drive the same session.

use crate::v4l2::FourCC;
use std::{
    io,
    ptr::NonNull,
    slice::{from_raw_parts, from_raw_parts_mut},
    time::Duration,
};

/// The device supports the single-planar video capture interface.
pub const CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;

/// The device supports the streaming I/O method.
pub const CAP_STREAMING: u32 = 0x0400_0000;

/// Identification and capability flags reported by a capture device.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub driver: String,
    pub card: String,
    pub bus_info: String,
    pub version: u32,
    pub capabilities: u32,
}

impl Capabilities {
    pub fn can_capture(&self) -> bool {
        self.capabilities & CAP_VIDEO_CAPTURE != 0
    }

    pub fn can_stream(&self) -> bool {
        self.capabilities & CAP_STREAMING != 0
    }
}

/// Capture format as reported back by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Format {
    pub width: u32,
    pub height: u32,
    pub fourcc: FourCC,
    /// Length of one image row in bytes, including any driver padding.
    pub bytes_per_line: u32,
    /// Total image size in bytes.
    pub size_image: u32,
}

/// Location of a driver-allocated buffer in the device's mmap space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferInfo {
    pub index: u32,
    pub offset: u32,
    pub length: u32,
}

/// A filled buffer handed back by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dequeued {
    pub index: u32,
    pub bytes_used: u32,
    pub sequence: u32,
}

/// Result of waiting on the capture handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// A filled buffer can be dequeued without blocking.
    Ready,
    /// The timeout elapsed without a frame.
    TimedOut,
    /// The wait was interrupted by a signal before anything happened.
    Interrupted,
}

/// Geometry of the display surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenInfo {
    /// Visible width in pixels.
    pub width: u32,
    /// Visible height in pixels.
    pub height: u32,
    pub bits_per_pixel: u32,
    /// Length of one display row in bytes.
    pub line_length: u32,
    /// Size of the display memory in bytes.
    pub memory_length: u32,
}

impl ScreenInfo {
    pub fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel as usize / 8
    }

    /// Number of bytes covering every visible row.
    pub fn visible_length(&self) -> usize {
        self.line_length as usize * self.height as usize
    }
}

/// A region of device memory mapped into the process.
///
/// The memory belongs to the device. It is never freed by the process, only
/// handed back through [`CaptureDevice::unmap`] or [`DisplayDevice::unmap`].
#[derive(Debug)]
pub struct MappedMemory {
    ptr: NonNull<u8>,
    len: usize,
}

impl MappedMemory {
    /// Wraps a mapped region.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` bytes that stay readable and writable until
    /// the region is passed back to the device that produced it.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        unsafe { from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// Streaming video capture device with driver-allocated, mmap-able buffers.
pub trait CaptureDevice {
    fn query_capabilities(&self) -> io::Result<Capabilities>;

    /// Lists every pixel format the device can capture.
    fn enumerate_formats(&self) -> io::Result<Vec<FourCC>>;

    fn get_format(&self) -> io::Result<Format>;

    /// Requests a format. The driver may adjust it, the adjusted format is
    /// returned.
    fn set_format(&mut self, width: u32, height: u32, fourcc: FourCC) -> io::Result<Format>;

    /// Requests `count` buffers and returns how many the driver granted.
    fn request_buffers(&mut self, count: u32) -> io::Result<u32>;

    fn query_buffer(&self, index: u32) -> io::Result<BufferInfo>;

    fn map(&mut self, info: &BufferInfo) -> io::Result<MappedMemory>;

    fn unmap(&mut self, memory: MappedMemory) -> io::Result<()>;

    fn queue(&mut self, index: u32) -> io::Result<()>;

    /// Takes a filled buffer from the driver. `None` means no buffer was
    /// ready after all.
    fn dequeue(&mut self) -> io::Result<Option<Dequeued>>;

    /// Blocks until a buffer is ready or `timeout` elapses.
    fn wait(&self, timeout: Duration) -> io::Result<Readiness>;

    fn stream_on(&mut self) -> io::Result<()>;

    fn stream_off(&mut self) -> io::Result<()>;
}

/// Memory-mapped display.
pub trait DisplayDevice {
    fn screen_info(&self) -> io::Result<ScreenInfo>;

    fn map(&mut self, length: usize) -> io::Result<MappedMemory>;

    fn unmap(&mut self, memory: MappedMemory) -> io::Result<()>;
}
