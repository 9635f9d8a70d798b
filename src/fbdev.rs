// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Linux framebuffer (fbdev) display.

use crate::device::{DisplayDevice, MappedMemory, ScreenInfo};
use std::{
    fs::{File, OpenOptions},
    io,
    mem,
    os::fd::{AsRawFd, RawFd},
    path::{Path, PathBuf},
    ptr::{null_mut, NonNull},
};
use tracing::debug;

mod sys {
    #[repr(C)]
    pub struct FbBitfield {
        pub offset: u32,
        pub length: u32,
        pub msb_right: u32,
    }

    #[repr(C)]
    pub struct FbVarScreeninfo {
        pub xres: u32,
        pub yres: u32,
        pub xres_virtual: u32,
        pub yres_virtual: u32,
        pub xoffset: u32,
        pub yoffset: u32,
        pub bits_per_pixel: u32,
        pub grayscale: u32,
        pub red: FbBitfield,
        pub green: FbBitfield,
        pub blue: FbBitfield,
        pub transp: FbBitfield,
        pub nonstd: u32,
        pub activate: u32,
        pub height: u32,
        pub width: u32,
        pub accel_flags: u32,
        pub pixclock: u32,
        pub left_margin: u32,
        pub right_margin: u32,
        pub upper_margin: u32,
        pub lower_margin: u32,
        pub hsync_len: u32,
        pub vsync_len: u32,
        pub sync: u32,
        pub vmode: u32,
        pub rotate: u32,
        pub colorspace: u32,
        pub reserved: [u32; 4],
    }

    #[repr(C)]
    pub struct FbFixScreeninfo {
        pub id: [u8; 16],
        pub smem_start: libc::c_ulong,
        pub smem_len: u32,
        pub type_: u32,
        pub type_aux: u32,
        pub visual: u32,
        pub xpanstep: u16,
        pub ypanstep: u16,
        pub ywrapstep: u16,
        pub line_length: u32,
        pub mmio_start: libc::c_ulong,
        pub mmio_len: u32,
        pub accel: u32,
        pub capabilities: u16,
        pub reserved: [u16; 2],
    }

    nix::ioctl_read_bad!(fbioget_vscreeninfo, 0x4600, FbVarScreeninfo);
    nix::ioctl_read_bad!(fbioget_fscreeninfo, 0x4602, FbFixScreeninfo);
}

/// Framebuffer device node, e.g. `/dev/fb0`.
pub struct Framebuffer {
    file: File,
    path: PathBuf,
}

impl Framebuffer {
    /// Opens the framebuffer device node read/write.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        debug!("opened display device {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl DisplayDevice for Framebuffer {
    fn screen_info(&self) -> io::Result<ScreenInfo> {
        let mut var: sys::FbVarScreeninfo = unsafe { mem::zeroed() };
        unsafe { sys::fbioget_vscreeninfo(self.fd(), &mut var) }?;

        let mut fix: sys::FbFixScreeninfo = unsafe { mem::zeroed() };
        unsafe { sys::fbioget_fscreeninfo(self.fd(), &mut fix) }?;

        Ok(ScreenInfo {
            width: var.xres,
            height: var.yres,
            bits_per_pixel: var.bits_per_pixel,
            line_length: fix.line_length,
            memory_length: fix.smem_len,
        })
    }

    fn map(&mut self, length: usize) -> io::Result<MappedMemory> {
        let ptr = unsafe {
            libc::mmap(
                null_mut(),
                length,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| io::Error::other("mmap returned a null mapping"))?;
        Ok(unsafe { MappedMemory::from_raw_parts(ptr, length) })
    }

    fn unmap(&mut self, memory: MappedMemory) -> io::Result<()> {
        if unsafe { libc::munmap(memory.as_ptr().cast(), memory.len()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        debug!("closed display device {}", self.path.display());
    }
}
