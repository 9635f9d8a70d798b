// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Pool of driver-allocated capture buffers mapped into the process.
//!
//! Every buffer is either owned by the kernel (queued, being filled by the
//! device) or by the process (dequeued, being read). The pool records that
//! ownership per index so that a buffer is never touched by both sides at
//! once, and so an index handed back by the driver can be validated before
//! it is used.

use crate::{
    device::{CaptureDevice, MappedMemory},
    error::{Error, Result},
};
use tracing::{debug, warn};

/// Ownership of a single capture buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferState {
    /// Mapped but not circulating, streaming has not started or has stopped.
    Idle,
    /// Owned by the kernel, waiting to be filled.
    Queued,
    /// Owned by the process, holding a filled frame.
    Dequeued,
}

/// A capture buffer mapped into the process.
#[derive(Debug)]
pub struct FrameBuffer {
    index: u32,
    memory: MappedMemory,
    state: BufferState,
}

impl FrameBuffer {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn state(&self) -> BufferState {
        self.state
    }
}

/// Fixed-size pool of capture buffers.
///
/// The size is decided once by [`BufferPool::allocate`] and never changes.
#[derive(Debug, Default)]
pub struct BufferPool {
    size: u32,
    buffers: Vec<FrameBuffer>,
}

impl BufferPool {
    /// Requests `count` buffers from the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferAllocation`] if the device grants fewer buffers
    /// than requested, in which case the grant is released again.
    pub fn allocate<C: CaptureDevice>(device: &mut C, count: u32) -> Result<Self> {
        let granted = device.request_buffers(count).map_err(Error::BufferRequest)?;
        if granted < count {
            if let Err(e) = device.request_buffers(0) {
                warn!("failed to release {} capture buffers: {}", granted, e);
            }
            return Err(Error::BufferAllocation {
                requested: count,
                granted,
            });
        }
        debug!("device granted {} of {} buffers", granted, count);

        Ok(Self {
            size: granted,
            buffers: Vec::with_capacity(granted as usize),
        })
    }

    /// Maps every allocated buffer into the process.
    ///
    /// If any buffer fails to map, every buffer mapped so far is unmapped and
    /// the allocation is handed back to the driver before the error is
    /// returned.
    pub fn map_all<C: CaptureDevice>(&mut self, device: &mut C) -> Result<()> {
        if let Err(e) = self.try_map_all(device) {
            self.release(device);
            if let Err(e) = device.request_buffers(0) {
                warn!("failed to release {} capture buffers: {}", self.size, e);
            }
            self.size = 0;
            return Err(e);
        }
        Ok(())
    }

    fn try_map_all<C: CaptureDevice>(&mut self, device: &mut C) -> Result<()> {
        for index in self.buffers.len() as u32..self.size {
            let info = device
                .query_buffer(index)
                .map_err(|source| Error::Map { index, source })?;
            let memory = device
                .map(&info)
                .map_err(|source| Error::Map { index, source })?;
            debug!(
                "mapped buffer {} offset {:#x} length {}",
                index, info.offset, info.length
            );
            self.buffers.push(FrameBuffer {
                index,
                memory,
                state: BufferState::Idle,
            });
        }
        Ok(())
    }

    /// Submits every buffer to the kernel queue.
    pub fn enqueue_all<C: CaptureDevice>(&mut self, device: &mut C) -> Result<()> {
        for buffer in &mut self.buffers {
            device.queue(buffer.index).map_err(|source| Error::Queue {
                index: buffer.index,
                source,
            })?;
            buffer.state = BufferState::Queued;
        }
        Ok(())
    }

    /// Unmaps every buffer. Failures are logged, the pool is left empty.
    pub fn release<C: CaptureDevice>(&mut self, device: &mut C) {
        for buffer in self.buffers.drain(..) {
            if let Err(e) = device.unmap(buffer.memory) {
                warn!("failed to unmap buffer {}: {}", buffer.index, e);
            }
        }
    }

    /// Number of buffers in the pool.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of buffers currently mapped.
    pub fn mapped(&self) -> usize {
        self.buffers.len()
    }

    pub fn get(&self, index: u32) -> Option<&FrameBuffer> {
        self.buffers.get(index as usize)
    }

    pub fn state(&self, index: u32) -> Option<BufferState> {
        self.get(index).map(FrameBuffer::state)
    }

    /// Index of the buffer currently held by the process, if any.
    pub fn dequeued(&self) -> Option<u32> {
        self.buffers
            .iter()
            .find(|b| b.state == BufferState::Dequeued)
            .map(|b| b.index)
    }

    /// Whether the kernel currently owns any buffer.
    pub fn any_queued(&self) -> bool {
        self.buffers.iter().any(|b| b.state == BufferState::Queued)
    }

    fn checked_mut(&mut self, index: u32) -> Result<&mut FrameBuffer> {
        let pool_size = self.size;
        self.buffers
            .get_mut(index as usize)
            .ok_or(Error::IndexBounds { index, pool_size })
    }

    /// Records that the driver handed buffer `index` to the process.
    ///
    /// # Errors
    ///
    /// [`Error::IndexBounds`] if `index` is outside the pool and
    /// [`Error::BufferOwnership`] if the kernel did not own the buffer.
    pub fn check_out(&mut self, index: u32) -> Result<()> {
        let buffer = self.checked_mut(index)?;
        if buffer.state != BufferState::Queued {
            return Err(Error::BufferOwnership {
                index,
                expected: "kernel",
            });
        }
        buffer.state = BufferState::Dequeued;
        Ok(())
    }

    /// Records that buffer `index` was handed back to the kernel.
    pub fn check_in(&mut self, index: u32) -> Result<()> {
        let buffer = self.checked_mut(index)?;
        if buffer.state != BufferState::Dequeued {
            return Err(Error::BufferOwnership {
                index,
                expected: "process",
            });
        }
        buffer.state = BufferState::Queued;
        Ok(())
    }

    /// Marks every buffer idle, used once streaming is off and the kernel has
    /// returned all of them.
    pub fn reclaim_all(&mut self) {
        for buffer in &mut self.buffers {
            buffer.state = BufferState::Idle;
        }
    }

    /// Contents of a dequeued buffer.
    pub fn frame(&self, index: u32) -> Result<&[u8]> {
        let buffer = self.get(index).ok_or(Error::IndexBounds {
            index,
            pool_size: self.size,
        })?;
        if buffer.state != BufferState::Dequeued {
            return Err(Error::BufferOwnership {
                index,
                expected: "process",
            });
        }
        Ok(buffer.memory.as_slice())
    }
}
