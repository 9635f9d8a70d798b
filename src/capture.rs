// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Capture loop: wait, dequeue, convert, blit, requeue.
//!
//! [`CaptureLoop::step`] performs one iteration and [`CaptureLoop::run`]
//! repeats it until the cancellation flag is raised or a fatal error occurs.
//! The flag is only checked between iterations, so a dequeued buffer is
//! always requeued before the loop stops. Streaming is switched off however
//! the loop ends.

use crate::{
    device::{CaptureDevice, Dequeued, DisplayDevice, Readiness},
    display::ConversionBuffer,
    error::{Error, Result},
    session::CaptureSession,
};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};
use tracing::{debug, error, info, warn};

/// Outcome of a single [`CaptureLoop::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// A frame was shown and its buffer requeued.
    Frame(Dequeued),
    /// The wait ended without a frame to dequeue, e.g. interrupted by a
    /// signal.
    Idle,
    /// Cancellation was requested, nothing was done.
    Stopped,
}

/// Counters kept across the life of a capture loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames dequeued, shown and requeued.
    pub frames: u64,
    /// Waits that timed out.
    pub timeouts: u64,
    /// Frames that held fewer bytes than a full image.
    pub short_frames: u64,
}

pub struct CaptureLoop<'a, C: CaptureDevice, D: DisplayDevice> {
    session: &'a mut CaptureSession<C, D>,
    scratch: ConversionBuffer,
    timeout: Duration,
    max_timeouts: Option<u32>,
    consecutive_timeouts: u32,
    stats: LoopStats,
}

impl<'a, C: CaptureDevice, D: DisplayDevice> CaptureLoop<'a, C, D> {
    /// Creates a loop over a session whose format has been negotiated.
    pub fn new(session: &'a mut CaptureSession<C, D>, timeout: Duration) -> Result<Self> {
        let format = *session
            .format()
            .ok_or(Error::NotReady("capture format not negotiated"))?;
        Ok(Self {
            session,
            scratch: ConversionBuffer::new(format.width, format.height),
            timeout,
            max_timeouts: None,
            consecutive_timeouts: 0,
            stats: LoopStats::default(),
        })
    }

    /// Gives up after `limit` consecutive timeouts instead of waiting forever.
    pub fn with_max_timeouts(mut self, limit: Option<u32>) -> Self {
        self.max_timeouts = limit;
        self
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn session(&self) -> &CaptureSession<C, D> {
        &*self.session
    }

    /// Performs one iteration of the loop.
    ///
    /// The dequeued buffer is requeued even when conversion or blitting
    /// failed, that error is returned only after the requeue.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] when no frame arrived within the timeout. Nothing
    /// changes in that case and the next step simply waits again.
    pub fn step(&mut self, cancel: &AtomicBool) -> Result<Step> {
        if cancel.load(Ordering::Acquire) {
            return Ok(Step::Stopped);
        }

        match self.session.wait(self.timeout)? {
            Readiness::Ready => {}
            Readiness::Interrupted => return Ok(Step::Idle),
            Readiness::TimedOut => {
                self.stats.timeouts += 1;
                self.consecutive_timeouts += 1;
                if let Some(limit) = self.max_timeouts {
                    if self.consecutive_timeouts >= limit {
                        return Err(Error::TimeoutLimit {
                            count: self.consecutive_timeouts,
                            timeout: self.timeout,
                        });
                    }
                }
                return Err(Error::Timeout(self.timeout));
            }
        }

        let Some(frame) = self.session.dequeue()? else {
            return Ok(Step::Idle);
        };
        self.consecutive_timeouts = 0;

        let now = Instant::now();
        let presented = self.session.present(&frame, &mut self.scratch);
        let present_time = now.elapsed();

        self.session.requeue(frame.index)?;
        self.stats.frames += 1;

        if let Some(client) = tracy_client::Client::running() {
            client.frame_mark();
        }

        debug!(
            "frame {} buffer {} bytes {} present {:?}",
            frame.sequence, frame.index, frame.bytes_used, present_time
        );

        if let Err(e) = presented {
            if matches!(e, Error::ShortFrame { .. }) {
                self.stats.short_frames += 1;
            }
            return Err(e);
        }
        Ok(Step::Frame(frame))
    }

    /// Runs until `cancel` is raised or a fatal error occurs, then switches
    /// streaming off.
    ///
    /// Timeouts and short frames are logged and the loop keeps going, any
    /// other error ends it and is returned once streaming is off.
    pub fn run(&mut self, cancel: &AtomicBool) -> Result<LoopStats> {
        let result = loop {
            match self.step(cancel) {
                Ok(Step::Stopped) => {
                    info!("capture cancelled");
                    break Ok(());
                }
                Ok(_) => {}
                Err(e) if e.is_recoverable() => warn!("{}", e),
                Err(e) => {
                    error!("capture stopped: {}", e);
                    break Err(e);
                }
            }
        };

        let stopped = self.session.stop_streaming();
        if let Err(e) = &stopped {
            error!("stream off failed: {}", e);
        }
        result?;
        stopped?;
        Ok(self.stats)
    }
}
