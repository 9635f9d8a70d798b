// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Capture session owning the capture and display devices.
//!
//! [`CaptureSession`] is the single context object of the pipeline: the two
//! device handles, the negotiated format, the buffer pool and the mapped
//! display surface all live here and are released together. Dropping a
//! session stops streaming, unmaps every buffer and the display surface and
//! closes both handles, whichever way the pipeline ended.

use crate::{
    buffer::{BufferPool, BufferState},
    config::Config,
    convert::{self, RGB565_BYTES_PER_PIXEL, YUYV_BYTES_PER_PIXEL},
    device::{Capabilities, CaptureDevice, Dequeued, DisplayDevice, Format, Readiness},
    display::{ConversionBuffer, DisplaySurface},
    error::{Error, Result},
    fbdev::Framebuffer,
    v4l2::{FourCC, V4l2Device, YUYV},
};
use std::{path::Path, time::Duration};
use tracing::{debug, info, warn};

/// Streaming state of the capture device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Buffers may be set up, nothing is circulating yet.
    Idle,
    Streaming,
    /// Streaming was switched off, the session is only waiting to be dropped.
    Stopped,
}

pub struct CaptureSession<C: CaptureDevice, D: DisplayDevice> {
    capture: C,
    display: D,
    capabilities: Option<Capabilities>,
    format: Option<Format>,
    pool: BufferPool,
    surface: Option<DisplaySurface>,
    state: StreamState,
}

impl CaptureSession<V4l2Device, Framebuffer> {
    /// Opens the capture and display device nodes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceOpen`] naming the node that could not be
    /// opened, for example because it is missing or permission was denied.
    /// A capture handle opened before a failing display is closed again.
    pub fn open(capture: impl AsRef<Path>, display: impl AsRef<Path>) -> Result<Self> {
        let open_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| Error::DeviceOpen { path, source }
        };

        let capture = capture.as_ref();
        let display = display.as_ref();
        let capture_dev = V4l2Device::open(capture).map_err(open_error(capture))?;
        let display_dev = Framebuffer::open(display).map_err(open_error(display))?;
        Ok(Self::new(capture_dev, display_dev))
    }

    /// Opens both devices and prepares them for streaming.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut session = Self::open(&config.camera, &config.display)?;
        session.setup(config)?;
        Ok(session)
    }
}

impl<C: CaptureDevice, D: DisplayDevice> CaptureSession<C, D> {
    pub fn new(capture: C, display: D) -> Self {
        Self {
            capture,
            display,
            capabilities: None,
            format: None,
            pool: BufferPool::default(),
            surface: None,
            state: StreamState::Idle,
        }
    }

    /// Runs every setup stage in order: capability check, YUYV format
    /// negotiation, display mapping, buffer allocation and mapping, then
    /// stream-on.
    ///
    /// Whatever was acquired before a failing stage is released when the
    /// session is dropped.
    pub fn setup(&mut self, config: &Config) -> Result<()> {
        self.query_capabilities()?;
        self.negotiate_format(config.width, config.height, YUYV)?;
        self.map_display()?;
        self.allocate_buffers(config.buffer_count)?;
        self.start_streaming()
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.capabilities.as_ref()
    }

    pub fn format(&self) -> Option<&Format> {
        self.format.as_ref()
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn surface(&self) -> Option<&DisplaySurface> {
        self.surface.as_ref()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Queries the capture device and checks that it can capture video.
    ///
    /// # Errors
    ///
    /// [`Error::Capability`] unless the video capture capability is set.
    pub fn query_capabilities(&mut self) -> Result<&Capabilities> {
        let caps = self
            .capture
            .query_capabilities()
            .map_err(Error::CapabilityQuery)?;

        info!(
            "capture device {} driver {} bus {} version {}.{}.{}",
            caps.card,
            caps.driver,
            caps.bus_info,
            (caps.version >> 16) & 0xff,
            (caps.version >> 8) & 0xff,
            caps.version & 0xff,
        );

        if !caps.can_capture() {
            return Err(Error::Capability {
                device: caps.card,
                capabilities: caps.capabilities,
            });
        }
        if !caps.can_stream() {
            warn!("{} does not report streaming I/O support", caps.card);
        }

        Ok(&*self.capabilities.insert(caps))
    }

    /// Negotiates the capture format.
    ///
    /// The format must appear in the device's format list. The driver may
    /// adjust the frame size, the adjusted size is kept and used for every
    /// later sizing decision.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFormat`] if the device never lists `fourcc` or
    /// replaces it while setting the format, [`Error::FrameSize`] if the
    /// device settles on an empty frame or an odd width.
    pub fn negotiate_format(&mut self, width: u32, height: u32, fourcc: FourCC) -> Result<Format> {
        let formats = self
            .capture
            .enumerate_formats()
            .map_err(Error::FormatNegotiation)?;
        if !formats.iter().any(|f| *f == fourcc) {
            return Err(Error::UnsupportedFormat(fourcc));
        }
        debug!("device supports {}", fourcc);

        self.capture
            .set_format(width, height, fourcc)
            .map_err(Error::FormatNegotiation)?;
        let mut format = self
            .capture
            .get_format()
            .map_err(Error::FormatNegotiation)?;

        if format.fourcc != fourcc {
            return Err(Error::UnsupportedFormat(fourcc));
        }
        // YUYV pairs pixels, the converter needs whole macropixels
        if format.width == 0 || format.height == 0 || format.width % 2 != 0 {
            return Err(Error::FrameSize {
                width: format.width,
                height: format.height,
            });
        }
        if format.width != width || format.height != height {
            warn!(
                "requested {}x{} capture but the device set {}x{}",
                width, height, format.width, format.height
            );
        }

        let min_stride = format.width * YUYV_BYTES_PER_PIXEL as u32;
        if format.bytes_per_line < min_stride {
            format.bytes_per_line = min_stride;
        }

        info!(
            "capture format {}x{} {} stride {}",
            format.width, format.height, format.fourcc, format.bytes_per_line
        );
        self.format = Some(format);
        Ok(format)
    }

    /// Maps the display and clears it.
    ///
    /// # Errors
    ///
    /// [`Error::DisplayFormat`] unless the display is RGB565,
    /// [`Error::DisplayGeometry`] if it is smaller than the negotiated frame.
    pub fn map_display(&mut self) -> Result<&DisplaySurface> {
        let format = self
            .format
            .ok_or(Error::NotReady("capture format not negotiated"))?;
        let info = self.display.screen_info().map_err(Error::DisplayMap)?;

        if info.bits_per_pixel != 8 * RGB565_BYTES_PER_PIXEL as u32 {
            return Err(Error::DisplayFormat {
                bits_per_pixel: info.bits_per_pixel,
            });
        }
        if info.width < format.width || info.height < format.height {
            return Err(Error::DisplayGeometry {
                display_width: info.width,
                display_height: info.height,
                frame_width: format.width,
                frame_height: format.height,
            });
        }

        let length = info.visible_length();
        if info.memory_length != 0 && length > info.memory_length as usize {
            return Err(Error::DisplayMap(std::io::Error::other(format!(
                "visible area of {} bytes exceeds display memory of {} bytes",
                length, info.memory_length
            ))));
        }

        let memory = self.display.map(length).map_err(Error::DisplayMap)?;
        let mut surface = DisplaySurface::new(memory, info);
        surface.clear();

        info!(
            "display {}x{} {}bpp stride {}",
            info.width, info.height, info.bits_per_pixel, info.line_length
        );
        Ok(&*self.surface.insert(surface))
    }

    /// Allocates and maps the capture buffer pool.
    pub fn allocate_buffers(&mut self, count: u32) -> Result<()> {
        let mut pool = BufferPool::allocate(&mut self.capture, count)?;
        pool.map_all(&mut self.capture)?;
        info!("mapped {} capture buffers", pool.size());
        self.pool = pool;
        Ok(())
    }

    /// Queues every buffer and switches streaming on.
    pub fn start_streaming(&mut self) -> Result<()> {
        match self.state {
            StreamState::Streaming => return Ok(()),
            StreamState::Stopped => return Err(Error::NotReady("stream already stopped")),
            StreamState::Idle => {}
        }
        if self.pool.mapped() == 0 {
            return Err(Error::NotReady("no capture buffers mapped"));
        }

        self.pool.enqueue_all(&mut self.capture)?;
        self.capture.stream_on().map_err(Error::StreamControl)?;
        self.state = StreamState::Streaming;
        info!("streaming started");
        Ok(())
    }

    /// Switches streaming off, returning every buffer to the process.
    ///
    /// Calling this again, or before streaming started, does nothing.
    pub fn stop_streaming(&mut self) -> Result<()> {
        if self.state != StreamState::Streaming && !self.pool.any_queued() {
            return Ok(());
        }

        self.state = StreamState::Stopped;
        self.capture.stream_off().map_err(Error::StreamControl)?;
        self.pool.reclaim_all();
        info!("streaming stopped");
        Ok(())
    }

    /// Blocks until a filled buffer is ready or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> Result<Readiness> {
        self.capture.wait(timeout).map_err(Error::Wait)
    }

    /// Takes one filled buffer from the device.
    ///
    /// # Errors
    ///
    /// [`Error::BufferOwnership`] if a previously dequeued buffer has not been
    /// requeued yet or the device returns a buffer it did not own, and
    /// [`Error::IndexBounds`] if the device returns an index outside the pool.
    pub fn dequeue(&mut self) -> Result<Option<Dequeued>> {
        if self.state != StreamState::Streaming {
            return Err(Error::NotReady("capture is not streaming"));
        }
        if let Some(index) = self.pool.dequeued() {
            return Err(Error::BufferOwnership {
                index,
                expected: "kernel",
            });
        }

        let Some(frame) = self.capture.dequeue().map_err(Error::Dequeue)? else {
            return Ok(None);
        };
        self.pool.check_out(frame.index)?;
        Ok(Some(frame))
    }

    /// Hands a dequeued buffer back to the device.
    pub fn requeue(&mut self, index: u32) -> Result<()> {
        if self.pool.state(index) != Some(BufferState::Dequeued) {
            return Err(Error::BufferOwnership {
                index,
                expected: "process",
            });
        }
        self.capture
            .queue(index)
            .map_err(|source| Error::Queue { index, source })?;
        self.pool.check_in(index)
    }

    /// Converts a dequeued frame into `scratch`, blits it onto the display and
    /// zeroes `scratch` again.
    ///
    /// A short frame is still shown, rows the buffer did not contain stay
    /// blank, and [`Error::ShortFrame`] is returned afterwards.
    ///
    /// # Errors
    ///
    /// [`Error::ScratchSize`] unless `scratch` matches the negotiated frame
    /// size. Nothing is converted in that case.
    pub fn present(&mut self, frame: &Dequeued, scratch: &mut ConversionBuffer) -> Result<()> {
        let format = self
            .format
            .ok_or(Error::NotReady("capture format not negotiated"))?;
        let surface = self
            .surface
            .as_mut()
            .ok_or(Error::NotReady("display not mapped"))?;
        if scratch.width() != format.width || scratch.height() != format.height {
            return Err(Error::ScratchSize {
                width: scratch.width(),
                height: scratch.height(),
                frame_width: format.width,
                frame_height: format.height,
            });
        }
        let data = self.pool.frame(frame.index)?;
        let used = (frame.bytes_used as usize).min(data.len());

        let stride = scratch.stride();
        let width = scratch.width() as usize;
        let height = scratch.height() as usize;
        let converted = convert::yuyv_to_rgb565(
            &data[..used],
            format.bytes_per_line as usize,
            scratch.as_mut_slice(),
            stride,
            width,
            height,
        );
        let blitted = surface.blit(scratch);
        scratch.clear();

        blitted?;
        converted
    }

    /// Releases every device resource. Runs on drop.
    fn teardown(&mut self) {
        if let Err(e) = self.stop_streaming() {
            warn!("{}", e);
        }
        self.pool.release(&mut self.capture);
        if let Some(surface) = self.surface.take() {
            if let Err(e) = self.display.unmap(surface.into_memory()) {
                warn!("failed to unmap the display: {}", e);
            }
        }
    }
}

impl<C: CaptureDevice, D: DisplayDevice> Drop for CaptureSession<C, D> {
    fn drop(&mut self) {
        self.teardown();
        debug!("capture session closed");
    }
}
