// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! In-memory capture and display devices for exercising the pipeline without
//! hardware. Both hand out heap memory as their "mapped" regions and share
//! their state through `Rc<RefCell<..>>` so tests can inspect it after the
//! session is gone.

#![allow(dead_code)]

use edgefirst_camera_lcd::{
    config::Config,
    device::{
        BufferInfo, Capabilities, CaptureDevice, Dequeued, DisplayDevice, Format, MappedMemory,
        Readiness, ScreenInfo, CAP_STREAMING, CAP_VIDEO_CAPTURE,
    },
    v4l2::{FourCC, YUYV},
};
use std::{
    cell::RefCell,
    collections::VecDeque,
    io,
    ptr::{slice_from_raw_parts_mut, NonNull},
    rc::Rc,
    time::Duration,
};

/// Macropixel every fake capture buffer is filled with: neutral mid-gray.
pub const GRAY: [u8; 4] = [128, 128, 128, 128];

/// RGB565 bytes of [`GRAY`].
pub const GRAY_RGB565: [u8; 2] = [0x10, 0x84];

fn alloc(len: usize, fill: &[u8]) -> MappedMemory {
    let data: Box<[u8]> = fill.iter().copied().cycle().take(len).collect();
    let ptr = Box::into_raw(data) as *mut u8;
    unsafe { MappedMemory::from_raw_parts(NonNull::new(ptr).unwrap(), len) }
}

fn free(memory: MappedMemory) {
    drop(unsafe { Box::from_raw(slice_from_raw_parts_mut(memory.as_ptr(), memory.len())) });
}

/// Scripted answer for one call to `wait`.
#[derive(Clone, Copy, Debug)]
pub enum Wait {
    Ready,
    TimedOut,
    Interrupted,
    Fail,
}

#[derive(Debug)]
pub struct CameraState {
    pub capabilities: u32,
    pub formats: Vec<FourCC>,
    /// Frame size the driver forces, if any.
    pub forced_size: Option<(u32, u32)>,
    pub format: Option<Format>,
    /// Buffers granted regardless of the request.
    pub grant: Option<u32>,
    pub requested: u32,
    pub fail_map_at: Option<u32>,
    pub fail_queue_at: Option<u32>,
    pub fail_stream_on: bool,
    pub maps: usize,
    pub unmaps: usize,
    /// Kernel queue, oldest first.
    pub queue: VecDeque<u32>,
    pub streaming: bool,
    pub stream_on_calls: usize,
    pub stream_off_calls: usize,
    pub waits: VecDeque<Wait>,
    pub wait_calls: usize,
    pub dequeue_calls: usize,
    /// Indices returned by `dequeue` instead of the queue head.
    pub bogus_indices: VecDeque<u32>,
    /// `bytes_used` reported for every frame, the whole buffer if `None`.
    pub bytes_used: Option<u32>,
    pub sequence: u32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            capabilities: CAP_VIDEO_CAPTURE | CAP_STREAMING,
            formats: vec![FourCC(*b"MJPG"), YUYV],
            forced_size: None,
            format: None,
            grant: None,
            requested: 0,
            fail_map_at: None,
            fail_queue_at: None,
            fail_stream_on: false,
            maps: 0,
            unmaps: 0,
            queue: VecDeque::new(),
            streaming: false,
            stream_on_calls: 0,
            stream_off_calls: 0,
            waits: VecDeque::new(),
            wait_calls: 0,
            dequeue_calls: 0,
            bogus_indices: VecDeque::new(),
            bytes_used: None,
            sequence: 0,
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeCamera(pub Rc<RefCell<CameraState>>);

impl FakeCamera {
    pub fn state(&self) -> std::cell::RefMut<'_, CameraState> {
        self.0.borrow_mut()
    }
}

impl CaptureDevice for FakeCamera {
    fn query_capabilities(&self) -> io::Result<Capabilities> {
        Ok(Capabilities {
            driver: "fake".to_string(),
            card: "Fake Camera".to_string(),
            bus_info: "platform:fake".to_string(),
            version: 0x0006_0100,
            capabilities: self.0.borrow().capabilities,
        })
    }

    fn enumerate_formats(&self) -> io::Result<Vec<FourCC>> {
        Ok(self.0.borrow().formats.clone())
    }

    fn get_format(&self) -> io::Result<Format> {
        self.0
            .borrow()
            .format
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no format"))
    }

    fn set_format(&mut self, width: u32, height: u32, fourcc: FourCC) -> io::Result<Format> {
        let mut state = self.state();
        let (width, height) = state.forced_size.unwrap_or((width, height));
        let format = Format {
            width,
            height,
            fourcc,
            bytes_per_line: width * 2,
            size_image: width * height * 2,
        };
        state.format = Some(format);
        Ok(format)
    }

    fn request_buffers(&mut self, count: u32) -> io::Result<u32> {
        let mut state = self.state();
        state.requested = count;
        Ok(state.grant.map_or(count, |granted| granted.min(count)))
    }

    fn query_buffer(&self, index: u32) -> io::Result<BufferInfo> {
        let state = self.0.borrow();
        let format = state
            .format
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no format"))?;
        Ok(BufferInfo {
            index,
            offset: index * 0x10_0000,
            length: format.size_image,
        })
    }

    fn map(&mut self, info: &BufferInfo) -> io::Result<MappedMemory> {
        let mut state = self.state();
        if state.fail_map_at == Some(info.index) {
            return Err(io::Error::new(io::ErrorKind::OutOfMemory, "mmap failed"));
        }
        state.maps += 1;
        Ok(alloc(info.length as usize, &GRAY))
    }

    fn unmap(&mut self, memory: MappedMemory) -> io::Result<()> {
        self.state().unmaps += 1;
        free(memory);
        Ok(())
    }

    fn queue(&mut self, index: u32) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_queue_at == Some(index) {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "qbuf failed"));
        }
        if state.queue.contains(&index) {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "already queued"));
        }
        state.queue.push_back(index);
        Ok(())
    }

    fn dequeue(&mut self) -> io::Result<Option<Dequeued>> {
        let mut state = self.state();
        state.dequeue_calls += 1;
        let index = match state.bogus_indices.pop_front() {
            Some(index) => index,
            None => match state.queue.pop_front() {
                Some(index) => index,
                None => return Ok(None),
            },
        };
        let format = state.format.unwrap_or(Format {
            width: 0,
            height: 0,
            fourcc: YUYV,
            bytes_per_line: 0,
            size_image: 0,
        });
        state.sequence += 1;
        Ok(Some(Dequeued {
            index,
            bytes_used: state.bytes_used.unwrap_or(format.size_image),
            sequence: state.sequence,
        }))
    }

    fn wait(&self, _timeout: Duration) -> io::Result<Readiness> {
        let mut state = self.0.borrow_mut();
        state.wait_calls += 1;
        let scripted = state.waits.pop_front();
        match scripted {
            Some(Wait::Ready) => Ok(Readiness::Ready),
            Some(Wait::TimedOut) => Ok(Readiness::TimedOut),
            Some(Wait::Interrupted) => Ok(Readiness::Interrupted),
            Some(Wait::Fail) => Err(io::Error::new(io::ErrorKind::Other, "poll failed")),
            None if state.streaming && !state.queue.is_empty() => Ok(Readiness::Ready),
            None => Ok(Readiness::TimedOut),
        }
    }

    fn stream_on(&mut self) -> io::Result<()> {
        let mut state = self.state();
        state.stream_on_calls += 1;
        if state.fail_stream_on {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "streamon failed"));
        }
        state.streaming = true;
        Ok(())
    }

    fn stream_off(&mut self) -> io::Result<()> {
        let mut state = self.state();
        state.stream_off_calls += 1;
        state.streaming = false;
        state.queue.clear();
        Ok(())
    }
}

#[derive(Debug)]
pub struct DisplayState {
    pub info: ScreenInfo,
    /// Byte every fresh display mapping starts out with.
    pub fill: u8,
    pub maps: usize,
    pub unmaps: usize,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            info: screen(800, 480, 16),
            fill: 0xFF,
            maps: 0,
            unmaps: 0,
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeDisplay(pub Rc<RefCell<DisplayState>>);

impl FakeDisplay {
    pub fn state(&self) -> std::cell::RefMut<'_, DisplayState> {
        self.0.borrow_mut()
    }
}

impl DisplayDevice for FakeDisplay {
    fn screen_info(&self) -> io::Result<ScreenInfo> {
        Ok(self.0.borrow().info)
    }

    fn map(&mut self, length: usize) -> io::Result<MappedMemory> {
        let mut state = self.state();
        state.maps += 1;
        Ok(alloc(length, &[state.fill]))
    }

    fn unmap(&mut self, memory: MappedMemory) -> io::Result<()> {
        self.state().unmaps += 1;
        free(memory);
        Ok(())
    }
}

pub fn screen(width: u32, height: u32, bits_per_pixel: u32) -> ScreenInfo {
    let line_length = width * bits_per_pixel / 8;
    ScreenInfo {
        width,
        height,
        bits_per_pixel,
        line_length,
        memory_length: line_length * height * 2,
    }
}

pub fn config() -> Config {
    Config {
        width: 640,
        height: 480,
        buffer_count: 4,
        ..Config::default()
    }
}
