// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::v4l2::FourCC;
use std::{io, path::PathBuf, time::Duration};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while setting up or running the capture-to-display pipeline.
///
/// Setup-stage variants map onto distinct process exit codes through
/// [`Error::exit_code`]. Only [`Error::Timeout`] and [`Error::ShortFrame`] are
/// recoverable during streaming, every other variant stops the capture loop.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to open {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{device} is not a video capture device (capabilities {capabilities:#010x})")]
    Capability { device: String, capabilities: u32 },

    #[error("capability query failed: {0}")]
    CapabilityQuery(#[source] io::Error),

    #[error("capture device does not support pixel format {0}")]
    UnsupportedFormat(FourCC),

    #[error("format negotiation failed: {0}")]
    FormatNegotiation(#[source] io::Error),

    #[error("capture frame {width}x{height} is empty or has an odd width")]
    FrameSize { width: u32, height: u32 },

    #[error("display is {bits_per_pixel} bits per pixel, only 16-bit RGB565 is supported")]
    DisplayFormat { bits_per_pixel: u32 },

    #[error("display {display_width}x{display_height} is smaller than the {frame_width}x{frame_height} frame")]
    DisplayGeometry {
        display_width: u32,
        display_height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("requested {requested} capture buffers but the device granted {granted}")]
    BufferAllocation { requested: u32, granted: u32 },

    #[error("buffer request failed: {0}")]
    BufferRequest(#[source] io::Error),

    #[error("failed to map buffer {index}: {source}")]
    Map {
        index: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to map the display surface: {0}")]
    DisplayMap(#[source] io::Error),

    #[error("stream control failed: {0}")]
    StreamControl(#[source] io::Error),

    #[error("failed to queue buffer {index}: {source}")]
    Queue {
        index: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to dequeue a buffer: {0}")]
    Dequeue(#[source] io::Error),

    #[error("wait on the capture device failed: {0}")]
    Wait(#[source] io::Error),

    #[error("no frame within {0:?}")]
    Timeout(Duration),

    #[error("{count} consecutive timeouts of {timeout:?}")]
    TimeoutLimit { count: u32, timeout: Duration },

    #[error("device returned buffer index {index} outside the pool of {pool_size}")]
    IndexBounds { index: u32, pool_size: u32 },

    #[error("buffer {index} is not owned by the {expected} side")]
    BufferOwnership { index: u32, expected: &'static str },

    #[error("short frame: {actual} of {expected} bytes")]
    ShortFrame { expected: usize, actual: usize },

    #[error("blit needs {required} bytes but only {available} are mapped")]
    Blit { required: usize, available: usize },

    #[error("conversion buffer {width}x{height} does not match the {frame_width}x{frame_height} frame")]
    ScratchSize {
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("session not ready: {0}")]
    NotReady(&'static str),
}

impl Error {
    /// Process exit code for this error.
    ///
    /// Each setup stage has its own code: open 2, capability 3, format 4,
    /// allocate 5, map 6, stream-on 7. Errors outside those stages use 1, the
    /// binary reports every failure after streaming began as 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::DeviceOpen { .. } => 2,
            Error::Capability { .. } | Error::CapabilityQuery(_) => 3,
            Error::UnsupportedFormat(_)
            | Error::FormatNegotiation(_)
            | Error::FrameSize { .. }
            | Error::DisplayFormat { .. }
            | Error::DisplayGeometry { .. } => 4,
            Error::BufferAllocation { .. } | Error::BufferRequest(_) => 5,
            Error::Map { .. } | Error::DisplayMap(_) => 6,
            Error::StreamControl(_) | Error::Queue { .. } => 7,
            _ => 1,
        }
    }

    /// Whether the capture loop may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::ShortFrame { .. })
    }
}
