// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    convert::RGB565_BYTES_PER_PIXEL,
    device::{MappedMemory, ScreenInfo},
    error::{Error, Result},
};

/// Scratch RGB565 frame the converter writes into.
///
/// Sized to one capture frame and reused for every frame. It is zeroed after
/// each blit so that a frame which is only partially converted shows blank
/// rows instead of the previous frame's pixels.
#[derive(Debug)]
pub struct ConversionBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl ConversionBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * RGB565_BYTES_PER_PIXEL;
        Self {
            data: vec![0; len],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Length of one row in bytes.
    pub fn stride(&self) -> usize {
        self.width as usize * RGB565_BYTES_PER_PIXEL
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}

/// Copies `rows` rows of `row_bytes` bytes between two strided images.
///
/// The source is anchored at the destination's top-left corner, bytes of a
/// destination row beyond `row_bytes` are not touched.
///
/// # Errors
///
/// Returns [`Error::Blit`] without writing anything if either image is too
/// small for the requested rows.
pub fn blit(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    row_bytes: usize,
    rows: usize,
) -> Result<()> {
    if rows == 0 || row_bytes == 0 {
        return Ok(());
    }

    let dst_required = dst_stride * (rows - 1) + row_bytes;
    if row_bytes > dst_stride || dst_required > dst.len() {
        return Err(Error::Blit {
            required: dst_required,
            available: dst.len(),
        });
    }
    let src_required = src_stride * (rows - 1) + row_bytes;
    if row_bytes > src_stride || src_required > src.len() {
        return Err(Error::Blit {
            required: src_required,
            available: src.len(),
        });
    }

    for (s, d) in src
        .chunks(src_stride)
        .zip(dst.chunks_mut(dst_stride))
        .take(rows)
    {
        d[..row_bytes].copy_from_slice(&s[..row_bytes]);
    }
    Ok(())
}

/// Mapped display memory with its geometry.
#[derive(Debug)]
pub struct DisplaySurface {
    memory: MappedMemory,
    info: ScreenInfo,
}

impl DisplaySurface {
    pub fn new(memory: MappedMemory, info: ScreenInfo) -> Self {
        Self { memory, info }
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.info.bytes_per_pixel()
    }

    /// Length of one display row in bytes.
    pub fn stride(&self) -> usize {
        self.info.line_length as usize
    }

    pub fn info(&self) -> &ScreenInfo {
        &self.info
    }

    pub fn as_slice(&self) -> &[u8] {
        self.memory.as_slice()
    }

    /// Fills the whole surface with black.
    pub fn clear(&mut self) {
        self.memory.as_slice_mut().fill(0);
    }

    /// Copies a converted frame to the top-left corner of the surface.
    pub fn blit(&mut self, frame: &ConversionBuffer) -> Result<()> {
        let row_bytes = frame.width() as usize * self.bytes_per_pixel();
        let stride = self.stride();
        blit(
            frame.as_slice(),
            frame.stride(),
            self.memory.as_slice_mut(),
            stride,
            row_bytes,
            frame.height() as usize,
        )
    }

    pub(crate) fn into_memory(self) -> MappedMemory {
        self.memory
    }
}
