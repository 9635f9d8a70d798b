// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! YUYV 4:2:2 to RGB565 software conversion.
//!
//! Each 4-byte macropixel `Y0 U Y1 V` holds two horizontal pixels sharing one
//! chroma pair. Both pixels are converted with fixed-point approximations of
//! the BT.601 coefficients (multiply, then arithmetic shift right by 8):
//!
//! ```text
//! R = Y + (V-128) + ((V-128)*104 >> 8)                   ~ Y + 1.402(V-128)
//! G = Y - ((U-128)*89 >> 8) - ((V-128)*183 >> 8)         ~ Y - 0.344(U-128) - 0.714(V-128)
//! B = Y + (U-128) + ((U-128)*199 >> 8)                   ~ Y + 1.772(U-128)
//! ```
//!
//! Every channel saturates to `[0, 255]`. The LCD controller expects each
//! pixel as two bytes, low byte first:
//!
//! ```text
//! low  = ((G & 0x1C) << 3) | (B >> 3)
//! high = (R & 0xF8) | (G >> 5)
//! ```

use crate::error::{Error, Result};

/// Bytes per YUYV macropixel.
pub const MACROPIXEL_SIZE: usize = 4;

/// Bytes per YUYV pixel.
pub const YUYV_BYTES_PER_PIXEL: usize = 2;

/// Bytes per RGB565 pixel.
pub const RGB565_BYTES_PER_PIXEL: usize = 2;

fn saturate(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Converts one luma sample and its chroma pair to `[R, G, B]`.
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = i32::from(y);
    let u = i32::from(u) - 128;
    let v = i32::from(v) - 128;

    let r = y + v + ((v * 104) >> 8);
    let g = y - ((u * 89) >> 8) - ((v * 183) >> 8);
    let b = y + u + ((u * 199) >> 8);

    [saturate(r), saturate(g), saturate(b)]
}

/// Packs `[R, G, B]` into the two RGB565 bytes, low byte first.
pub fn pack_rgb565([r, g, b]: [u8; 3]) -> [u8; 2] {
    [((g & 0x1C) << 3) | (b >> 3), (r & 0xF8) | (g >> 5)]
}

/// Converts one `Y0 U Y1 V` macropixel into two RGB565 pixels.
pub fn convert_macropixel(yuyv: [u8; 4]) -> [u8; 4] {
    let [y0, u, y1, v] = yuyv;
    let [a0, a1] = pack_rgb565(yuv_to_rgb(y0, u, v));
    let [b0, b1] = pack_rgb565(yuv_to_rgb(y1, u, v));
    [a0, a1, b0, b1]
}

/// Converts a single row. Trailing bytes that do not form a whole macropixel
/// are left untouched.
pub fn convert_row(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src
        .chunks_exact(MACROPIXEL_SIZE)
        .zip(dst.chunks_exact_mut(MACROPIXEL_SIZE))
    {
        d.copy_from_slice(&convert_macropixel([s[0], s[1], s[2], s[3]]));
    }
}

/// Converts a YUYV frame into an RGB565 frame.
///
/// # Arguments
///
/// * `src` - YUYV image data, possibly shorter than a whole frame
/// * `src_stride` - Length of one source row in bytes
/// * `dst` - RGB565 destination
/// * `dst_stride` - Length of one destination row in bytes
/// * `width` - Frame width in pixels (even)
/// * `height` - Frame height in pixels
///
/// # Errors
///
/// Returns [`Error::ShortFrame`] when `src` holds fewer than `height` whole
/// rows. The complete rows present are still converted and the remaining
/// destination rows are left as they were.
///
/// # Panics
///
/// Panics if `dst` cannot hold `height` rows of `dst_stride` bytes or either
/// stride is shorter than a row.
pub fn yuyv_to_rgb565(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    width: usize,
    height: usize,
) -> Result<()> {
    let src_row = width * YUYV_BYTES_PER_PIXEL;
    let dst_row = width * RGB565_BYTES_PER_PIXEL;
    assert!(src_stride >= src_row, "source stride shorter than a row");
    assert!(dst_stride >= dst_row, "destination stride shorter than a row");
    assert!(
        height == 0 || dst.len() >= dst_stride * (height - 1) + dst_row,
        "destination too small for {}x{}",
        width,
        height
    );

    let rows = complete_rows(src.len(), src_stride, src_row).min(height);
    for (s, d) in src
        .chunks(src_stride)
        .zip(dst.chunks_mut(dst_stride))
        .take(rows)
    {
        convert_row(&s[..src_row], &mut d[..dst_row]);
    }

    if rows < height {
        return Err(Error::ShortFrame {
            expected: src_stride * (height - 1) + src_row,
            actual: src.len(),
        });
    }
    Ok(())
}

fn complete_rows(len: usize, stride: usize, row: usize) -> usize {
    if len < row {
        0
    } else {
        (len - row) / stride + 1
    }
}
