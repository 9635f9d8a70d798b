// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_camera_lcd::config::Config;
use std::{path::PathBuf, time::Duration};

/// Command-line arguments for the EdgeFirst Camera LCD Preview.
///
/// Every option can also be given through the environment variable named
/// next to it.
///
/// # Example
///
/// ```bash
/// # Via command line
/// edgefirst-camera-lcd --camera /dev/video0 --display /dev/fb0
///
/// # Via environment variables
/// export CAMERA=/dev/video0
/// export CAMERA_SIZE="320 240"
/// edgefirst-camera-lcd
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera capture device path (e.g., /dev/video0)
    #[arg(short, long, env = "CAMERA", default_value = "/dev/video2")]
    pub camera: PathBuf,

    /// Framebuffer display device path
    #[arg(short, long, env = "DISPLAY_DEVICE", default_value = "/dev/fb0")]
    pub display: PathBuf,

    /// Camera capture resolution in pixels (width height), must fit the
    /// display
    #[arg(
        long,
        env = "CAMERA_SIZE",
        default_value = "640 480",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub camera_size: Vec<u32>,

    /// Number of capture buffers to request from the driver
    #[arg(
        short,
        long,
        env = "BUFFERS",
        default_value = "4",
        value_parser = clap::value_parser!(u32).range(1..=32)
    )]
    pub buffers: u32,

    /// Seconds to wait for a frame before reporting a timeout
    #[arg(
        short,
        long,
        env = "TIMEOUT",
        default_value = "2",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Give up after this many consecutive timeouts (default: never)
    #[arg(long, env = "MAX_TIMEOUTS")]
    pub max_timeouts: Option<u32>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            camera: args.camera,
            display: args.display,
            width: args.camera_size[0],
            height: args.camera_size[1],
            buffer_count: args.buffers,
            timeout: Duration::from_secs(args.timeout),
            max_timeouts: args.max_timeouts,
        }
    }
}
