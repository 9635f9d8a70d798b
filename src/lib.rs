// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst Camera LCD Preview Library
//!
//! This library streams frames from a V4L2 camera straight onto a Linux
//! framebuffer LCD. Frames are captured as YUYV 4:2:2 into driver-allocated
//! memory-mapped buffers, converted in software to the RGB565 layout the LCD
//! controller expects, and copied row by row into the mapped framebuffer.
//!
//! ## Features
//!
//! - **Buffer Pool**: Driver-allocated capture buffers mapped into the process
//!   with explicit kernel/process ownership tracking per buffer.
//! - **Capture Session**: A single owned context for the capture and display
//!   devices, released in full on every exit path.
//! - **Capture Loop**: A cooperative step function with timeout handling and
//!   a cancellation flag checked between frames.
//! - **Conversion**: Bit-exact fixed-point YUYV to RGB565 conversion with
//!   saturation.
//!
//! ## Example
//!
//! ```no_run
//! use edgefirst_camera_lcd::{capture::CaptureLoop, config::Config, session::CaptureSession};
//! use std::sync::atomic::AtomicBool;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let mut session = CaptureSession::from_config(&config)?;
//!
//! let cancel = AtomicBool::new(false);
//! let stats = CaptureLoop::new(&mut session, config.timeout)?.run(&cancel)?;
//! println!("displayed {} frames", stats.frames);
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Requirements
//!
//! - **Linux**: V4L2 capture device supporting YUYV and memory-mapped
//!   streaming, 16-bit fbdev display at least as large as the capture frame.

pub mod buffer;
pub mod capture;
pub mod config;
pub mod convert;
pub mod device;
pub mod display;
pub mod error;
pub mod fbdev;
pub mod session;
pub mod v4l2;

pub use error::{Error, Result};
