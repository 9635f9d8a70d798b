// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::{path::PathBuf, time::Duration};

/// Default number of capture buffers circulating between driver and process.
pub const DEFAULT_BUFFER_COUNT: u32 = 4;

/// Default wait on the capture device before a timeout is reported.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Pipeline configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Capture device node
    pub camera: PathBuf,
    /// Framebuffer device node
    pub display: PathBuf,
    /// Requested capture width in pixels
    pub width: u32,
    /// Requested capture height in pixels
    pub height: u32,
    /// Number of capture buffers to request
    pub buffer_count: u32,
    /// Wait on the capture device per iteration
    pub timeout: Duration,
    /// Consecutive timeouts tolerated before giving up, unlimited if `None`
    pub max_timeouts: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: PathBuf::from("/dev/video2"),
            display: PathBuf::from("/dev/fb0"),
            width: 640,
            height: 480,
            buffer_count: DEFAULT_BUFFER_COUNT,
            timeout: DEFAULT_TIMEOUT,
            max_timeouts: None,
        }
    }
}
