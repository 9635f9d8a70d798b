// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! V4L2 capture device using memory-mapped streaming I/O.
//!
//! Capability and format handling go through [`v4l::Device`] and its
//! [`Capture`] implementation. The buffer lifecycle (request, query, map,
//! queue, dequeue, stream on/off) is driven one ioctl at a time through
//! [`v4l::v4l2`] so that every buffer index stays visible to the session's
//! ownership tracking.

use crate::device::{
    BufferInfo, Capabilities, CaptureDevice, Dequeued, Format, MappedMemory, Readiness,
};
use std::{
    fmt, io, mem,
    os::raw::{c_int, c_void},
    path::{Path, PathBuf},
    ptr::{null_mut, NonNull},
    sync::Arc,
    time::Duration,
};
use tracing::debug;
use v4l::{
    buffer::Type,
    device::Handle,
    format::FieldOrder,
    memory::Memory,
    v4l2::{self, vidioc},
    v4l_sys::{v4l2_buffer, v4l2_requestbuffers},
    video::Capture,
    Device,
};

/// Four character code identifying a pixel format.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

/// YUYV 4:2:2 packed format, two pixels per `Y0 U Y1 V` macropixel.
pub const YUYV: FourCC = FourCC(*b"YUYV");

impl From<FourCC> for u32 {
    fn from(value: FourCC) -> Self {
        u32::from_le_bytes(value.0)
    }
}

impl From<u32> for FourCC {
    fn from(value: u32) -> Self {
        FourCC(value.to_le_bytes())
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(value: v4l::FourCC) -> Self {
        FourCC(value.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(value: FourCC) -> Self {
        v4l::FourCC::new(&value.0)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &c in &self.0 {
            let c = if c.is_ascii_graphic() || c == b' ' {
                c as char
            } else {
                '.'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FourCC({self})")
    }
}

impl From<&v4l::Format> for Format {
    fn from(format: &v4l::Format) -> Self {
        Format {
            width: format.width,
            height: format.height,
            fourcc: format.fourcc.into(),
            bytes_per_line: format.stride,
            size_image: format.size,
        }
    }
}

/// V4L2 video capture device node, e.g. `/dev/video0`.
///
/// [`Device::with_path`] opens the node read/write and non-blocking, so
/// dequeues never stall outside of [`CaptureDevice::wait`]. The handle is
/// closed on drop.
pub struct V4l2Device {
    device: Device,
    handle: Arc<Handle>,
    path: PathBuf,
}

impl V4l2Device {
    /// Opens the capture device node.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the node does not exist or the
    /// process lacks permission to open it.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let device = Device::with_path(path)?;
        let handle = device.handle();
        debug!("opened capture device {}", path.display());
        Ok(Self {
            device,
            handle,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fd(&self) -> c_int {
        self.handle.fd()
    }

    /// Issues a buffer ioctl on a capture buffer descriptor for `index`.
    fn buffer_ioctl(&self, request: vidioc::_IOC_TYPE, index: u32) -> io::Result<v4l2_buffer> {
        let mut buf = v4l2_buffer {
            index,
            type_: Type::VideoCapture as u32,
            memory: Memory::Mmap as u32,
            ..unsafe { mem::zeroed() }
        };
        unsafe { v4l2::ioctl(self.fd(), request, &mut buf as *mut _ as *mut c_void) }?;
        Ok(buf)
    }

    fn stream_ioctl(&self, request: vidioc::_IOC_TYPE) -> io::Result<()> {
        let mut typ = Type::VideoCapture as u32;
        unsafe { v4l2::ioctl(self.fd(), request, &mut typ as *mut _ as *mut c_void) }
    }
}

impl CaptureDevice for V4l2Device {
    fn query_capabilities(&self) -> io::Result<Capabilities> {
        let caps = self.device.query_caps()?;
        let (major, minor, patch) = caps.version;

        Ok(Capabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            version: u32::from(major) << 16 | u32::from(minor) << 8 | u32::from(patch),
            capabilities: caps.capabilities.bits(),
        })
    }

    fn enumerate_formats(&self) -> io::Result<Vec<FourCC>> {
        let formats = self.device.enum_formats()?;
        for desc in &formats {
            debug!("format {}: {}", desc.index, desc.description);
        }
        Ok(formats.into_iter().map(|desc| desc.fourcc.into()).collect())
    }

    fn get_format(&self) -> io::Result<Format> {
        Ok((&self.device.format()?).into())
    }

    fn set_format(&mut self, width: u32, height: u32, fourcc: FourCC) -> io::Result<Format> {
        let mut format = v4l::Format::new(width, height, fourcc.into());
        format.field_order = FieldOrder::Interlaced;
        Ok((&self.device.set_format(&format)?).into())
    }

    fn request_buffers(&mut self, count: u32) -> io::Result<u32> {
        let mut req = v4l2_requestbuffers {
            count,
            type_: Type::VideoCapture as u32,
            memory: Memory::Mmap as u32,
            ..unsafe { mem::zeroed() }
        };
        unsafe {
            v4l2::ioctl(
                self.fd(),
                vidioc::VIDIOC_REQBUFS,
                &mut req as *mut _ as *mut c_void,
            )
        }?;
        Ok(req.count)
    }

    fn query_buffer(&self, index: u32) -> io::Result<BufferInfo> {
        let buf = self.buffer_ioctl(vidioc::VIDIOC_QUERYBUF, index)?;
        Ok(BufferInfo {
            index: buf.index,
            offset: unsafe { buf.m.offset },
            length: buf.length,
        })
    }

    fn map(&mut self, info: &BufferInfo) -> io::Result<MappedMemory> {
        let ptr = unsafe {
            v4l2::mmap(
                null_mut(),
                info.length as usize,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.fd(),
                info.offset as libc::off_t,
            )
        }?;
        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| io::Error::other("mmap returned a null mapping"))?;
        Ok(unsafe { MappedMemory::from_raw_parts(ptr, info.length as usize) })
    }

    fn unmap(&mut self, memory: MappedMemory) -> io::Result<()> {
        unsafe { v4l2::munmap(memory.as_ptr().cast(), memory.len()) }
    }

    fn queue(&mut self, index: u32) -> io::Result<()> {
        self.buffer_ioctl(vidioc::VIDIOC_QBUF, index)?;
        Ok(())
    }

    fn dequeue(&mut self) -> io::Result<Option<Dequeued>> {
        match self.buffer_ioctl(vidioc::VIDIOC_DQBUF, 0) {
            Ok(buf) => Ok(Some(Dequeued {
                index: buf.index,
                bytes_used: buf.bytesused,
                sequence: buf.sequence,
            })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn wait(&self, timeout: Duration) -> io::Result<Readiness> {
        let timeout_ms = timeout.as_millis().min(c_int::MAX as u128) as c_int;
        match self.handle.poll(libc::POLLIN, timeout_ms) {
            Ok(0) => Ok(Readiness::TimedOut),
            Ok(_) => Ok(Readiness::Ready),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(Readiness::Interrupted),
            Err(e) => Err(e),
        }
    }

    fn stream_on(&mut self) -> io::Result<()> {
        self.stream_ioctl(vidioc::VIDIOC_STREAMON)
    }

    fn stream_off(&mut self) -> io::Result<()> {
        self.stream_ioctl(vidioc::VIDIOC_STREAMOFF)
    }
}

impl Drop for V4l2Device {
    fn drop(&mut self) {
        debug!("closed capture device {}", self.path.display());
    }
}
