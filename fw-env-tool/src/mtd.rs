//! Linux MTD character devices (`/dev/mtdN`) as environment storage.
//!
//! Regular files are accepted as well and behave like a NOR device without write protection,
//! erasing fills with `0xFF`. Useful for images and for tests.

use std::fs::{
    File,
    OpenOptions,
};
use std::io;
use std::os::fd::{
    AsRawFd,
    IntoRawFd,
};
use std::os::unix::fs::FileExt;
use std::path::{
    Path,
    PathBuf,
};

use embedded_storage::nor_flash::{
    ErrorType,
    NorFlash,
    NorFlashError,
    NorFlashErrorKind,
    ReadNorFlash,
};
use fw_env::platform::{
    Crc,
    MediaType,
    Mtd,
};
use nix::errno::Errno;

use crate::error::Error;

/// `struct mtd_info_user` from `<mtd/mtd-abi.h>`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct MtdInfo {
    pub mtd_type: u8,
    pub flags: u32,
    pub size: u32,
    pub erase_size: u32,
    pub write_size: u32,
    pub oob_size: u32,
    padding: u64,
}

/// `struct erase_info_user` from `<mtd/mtd-abi.h>`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct EraseInfo {
    start: u32,
    length: u32,
}

mod ioctl {
    use super::{
        EraseInfo,
        MtdInfo,
    };

    nix::ioctl_read!(mem_get_info, b'M', 1, MtdInfo);
    nix::ioctl_write_ptr!(mem_erase, b'M', 2, EraseInfo);
    nix::ioctl_write_ptr!(mem_lock, b'M', 5, EraseInfo);
    nix::ioctl_write_ptr!(mem_unlock, b'M', 6, EraseInfo);
    nix::ioctl_write_ptr!(mem_get_bad_block, b'M', 11, i64);
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Mtd(MtdInfo),
    Image,
}

/// An opened MTD device or image file.
#[derive(Debug)]
pub struct MtdDevice {
    file: File,
    path: PathBuf,
    kind: Kind,
    size: usize,
}

/// Device failure. The details are reported on stderr when they happen, the engine only sees
/// that the operation failed.
#[derive(Debug)]
pub struct DeviceError(pub io::Error);

impl NorFlashError for DeviceError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl MtdDevice {
    /// Opens `path` read only, or read/write if `writable`.
    pub fn open<P: AsRef<Path>>(path: P, writable: bool) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let device_error = |source| Error::Device {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(&path)
            .map_err(device_error)?;
        let metadata = file.metadata().map_err(device_error)?;

        let (kind, size) = if metadata.file_type().is_file() {
            (Kind::Image, metadata.len() as usize)
        } else {
            let mut info = MtdInfo::default();
            unsafe { ioctl::mem_get_info(file.as_raw_fd(), &mut info) }.map_err(|source| {
                Error::DeviceInfo {
                    path: path.clone(),
                    source,
                }
            })?;
            (Kind::Mtd(info), info.size as usize)
        };

        #[cfg(feature = "debug-logs")]
        println!("MtdDevice: opened {} as {kind:?}, {size:#x} bytes", path.display());

        Ok(MtdDevice {
            file,
            path,
            kind,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The kernel's description of the device, `None` for image files.
    pub fn info(&self) -> Option<&MtdInfo> {
        match &self.kind {
            Kind::Mtd(info) => Some(info),
            Kind::Image => None,
        }
    }

    /// Flushes outstanding writes and closes the device, reporting errors that dropping the
    /// handle would ignore.
    pub fn close(self) -> Result<(), Error> {
        let MtdDevice { file, path, kind, .. } = self;

        if let Kind::Image = kind {
            if let Err(source) = file.sync_all() {
                return Err(Error::Device { path, source });
            }
        }

        let fd = file.into_raw_fd();
        Errno::result(unsafe { nix::libc::close(fd) })
            .map(|_| ())
            .map_err(|errno| Error::Device {
                path,
                source: io::Error::from(errno),
            })
    }

    fn check_range(&self, offset: u32, len: usize) -> Result<(), DeviceError> {
        if offset as usize + len > self.size {
            return Err(self.report(
                "Access out of range",
                io::Error::from(io::ErrorKind::InvalidInput),
            ));
        }
        Ok(())
    }

    fn report(&self, what: &str, error: io::Error) -> DeviceError {
        eprintln!("{what} on {}: {error}", self.path.display());
        DeviceError(error)
    }

    fn erase_ioctl(
        &self,
        what: &str,
        request: unsafe fn(i32, *const EraseInfo) -> nix::Result<i32>,
        from: u32,
        to: u32,
    ) -> Result<(), DeviceError> {
        let erase = EraseInfo {
            start: from,
            length: to - from,
        };
        unsafe { request(self.file.as_raw_fd(), &erase) }
            .map(|_| ())
            .map_err(|errno| self.report(what, io::Error::from(errno)))
    }
}

impl ErrorType for MtdDevice {
    type Error = DeviceError;
}

impl ReadNorFlash for MtdDevice {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.check_range(offset, bytes.len())?;
        self.file
            .read_exact_at(bytes, offset as u64)
            .map_err(|e| self.report("Read error", e))
    }

    fn capacity(&self) -> usize {
        self.size
    }
}

impl NorFlash for MtdDevice {
    const WRITE_SIZE: usize = 1;

    // the real geometry is taken from the configuration
    const ERASE_SIZE: usize = 1;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.check_range(from, (to - from) as usize)?;
        match self.kind {
            Kind::Mtd(_) => self.erase_ioctl("MTD erase error", ioctl::mem_erase, from, to),
            Kind::Image => {
                let erased = vec![0xffu8; (to - from) as usize];
                self.file
                    .write_all_at(&erased, from as u64)
                    .map_err(|e| self.report("MTD erase error", e))
            }
        }
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.check_range(offset, bytes.len())?;
        self.file
            .write_all_at(bytes, offset as u64)
            .map_err(|e| self.report("Write error", e))
    }
}

impl Mtd for MtdDevice {
    fn mtd_type(&mut self) -> Result<u8, Self::Error> {
        Ok(match self.kind {
            Kind::Mtd(info) => info.mtd_type,
            Kind::Image => MediaType::Nor as u8,
        })
    }

    fn is_bad_block(&mut self, offset: u32) -> Result<bool, Self::Error> {
        let Kind::Mtd(_) = self.kind else {
            return Ok(false);
        };

        let offset = offset as i64;
        let bad = unsafe { ioctl::mem_get_bad_block(self.file.as_raw_fd(), &offset) }
            .map_err(|errno| self.report("Cannot read bad block mark", io::Error::from(errno)))?;

        if bad > 0 {
            eprintln!("Bad block at {offset:#x}, skipping");
        }
        Ok(bad > 0)
    }

    fn unlock(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        match self.kind {
            Kind::Mtd(_) => self.erase_ioctl("MTD unlock error", ioctl::mem_unlock, from, to),
            Kind::Image => Ok(()),
        }
    }

    fn lock(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        match self.kind {
            Kind::Mtd(_) => self.erase_ioctl("MTD lock error", ioctl::mem_lock, from, to),
            Kind::Image => Ok(()),
        }
    }
}

impl Crc for MtdDevice {
    fn crc32(init: u32, data: &[u8]) -> u32 {
        fw_env::crc::crc32(init, data)
    }
}
