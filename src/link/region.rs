//! Shared writable link region.
//!
//! [`LinkRegion`] is the single capability the update sink relies on. Each
//! platform backend maps exactly [`RECORD_SIZE`] bytes of a resource the
//! voice client created and keeps it mapped until dropped:
//!
//! - [`MappedRegion`] — a memory-mapped file (`/dev/shm` on Linux, `/tmp`
//!   on macOS).
//! - `NamedRegion` — a named file mapping (Windows only).
//!
//! The bridge never creates or resizes the region; a missing resource is
//! reported as [`BridgeError::NotFound`].

#![allow(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};

use super::platform::LinkLocation;
use super::record::{LinkRecord, RECORD_SIZE};
use crate::{BridgeError, Result};

/// A fixed-size shared memory region holding one link record.
pub trait LinkRegion: Send {
    /// Resource backing this region.
    fn location(&self) -> &LinkLocation;

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Region` if the range leaves the record.
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()>;

    /// Overwrite the bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Region` if the range leaves the record.
    fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()>;

    /// Make previous writes visible to other processes.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Region` if the platform sync call fails.
    fn flush(&mut self) -> Result<()>;

    /// Read the whole record.
    ///
    /// # Errors
    ///
    /// Propagates [`LinkRegion::read_at`] failures.
    fn read_record(&self) -> Result<LinkRecord> {
        let mut bytes = [0u8; RECORD_SIZE];
        self.read_at(0, &mut bytes)?;
        Ok(LinkRecord::from_bytes(bytes))
    }

    /// Overwrite the whole record and flush it.
    ///
    /// # Errors
    ///
    /// Propagates write and flush failures.
    fn write_record(&mut self, record: &LinkRecord) -> Result<()> {
        self.write_at(0, record.as_bytes())?;
        self.flush()
    }
}

impl std::fmt::Debug for dyn LinkRegion + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkRegion")
            .field("location", self.location())
            .finish_non_exhaustive()
    }
}

fn check_bounds(offset: usize, len: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= RECORD_SIZE => Ok(()),
        _ => Err(BridgeError::Region(format!(
            "range {offset}+{len} exceeds {RECORD_SIZE}-byte record"
        ))),
    }
}

/// Open the link region at `location`.
///
/// # Errors
///
/// Returns `BridgeError::NotFound` when the voice client has not created
/// the resource, `BridgeError::UnsupportedPlatform` for a named mapping
/// outside Windows, and `BridgeError::Region` for any mapping failure.
pub fn open_region(location: &LinkLocation) -> Result<Box<dyn LinkRegion>> {
    match location {
        LinkLocation::Path(path) => Ok(Box::new(MappedRegion::open(path)?)),
        #[cfg(windows)]
        LinkLocation::Named(name) => Ok(Box::new(windows::NamedRegion::open(name)?)),
        #[cfg(not(windows))]
        LinkLocation::Named(name) => Err(BridgeError::UnsupportedPlatform(format!(
            "named mapping '{name}' requires windows"
        ))),
    }
}

/// Memory-mapped file region.
#[derive(Debug)]
pub struct MappedRegion {
    mmap: MmapMut,
    location: LinkLocation,
    _file: File,
}

impl MappedRegion {
    /// Map the first [`RECORD_SIZE`] bytes of an existing file.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::NotFound` if the file does not exist and
    /// `BridgeError::Region` if it is too small or cannot be mapped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();

        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(BridgeError::NotFound(format!(
                    "link region {} does not exist",
                    path.display()
                )));
            }
            Err(err) => {
                return Err(BridgeError::Region(format!(
                    "failed to open {}: {err}",
                    path.display()
                )));
            }
        };

        let len = file
            .metadata()
            .map_err(|err| BridgeError::Region(format!("failed to stat {}: {err}", path.display())))?
            .len();
        if usize::try_from(len).is_ok_and(|len| len < RECORD_SIZE) {
            return Err(BridgeError::Region(format!(
                "{} is {len} bytes, need at least {RECORD_SIZE}",
                path.display()
            )));
        }

        // SAFETY: the file is at least RECORD_SIZE bytes and is never
        // truncated by the bridge. Concurrent writers only ever see plain
        // bytes; no references into the mapping escape this type.
        let mmap = unsafe { MmapOptions::new().len(RECORD_SIZE).map_mut(&file) }
            .map_err(|err| BridgeError::Region(format!("failed to map {}: {err}", path.display())))?;

        Ok(Self {
            mmap,
            location: LinkLocation::Path(path),
            _file: file,
        })
    }
}

impl LinkRegion for MappedRegion {
    fn location(&self) -> &LinkLocation {
        &self.location
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        check_bounds(offset, buf.len())?;
        buf.copy_from_slice(&self.mmap[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        check_bounds(offset, bytes.len())?;
        self.mmap[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // Shared mappings are visible to other processes as soon as the
        // bytes are copied; only schedule write-back so a disk-backed file
        // (macOS `/tmp`) never blocks the caller.
        self.mmap
            .flush_async()
            .map_err(|err| BridgeError::Region(format!("failed to sync {}: {err}", self.location)))
    }
}

#[cfg(windows)]
mod windows {
    use std::ffi::c_void;

    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
    use windows_sys::Win32::System::Memory::{
        FlushViewOfFile, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, FILE_MAP_ALL_ACCESS,
        MEMORY_MAPPED_VIEW_ADDRESS,
    };

    use super::{check_bounds, LinkLocation, LinkRegion, RECORD_SIZE};
    use crate::{BridgeError, Result};

    /// View of a named file mapping created by the voice client.
    pub struct NamedRegion {
        handle: HANDLE,
        view: MEMORY_MAPPED_VIEW_ADDRESS,
        location: LinkLocation,
    }

    // SAFETY: the handle and view are owned exclusively by this value and
    // are only accessed through `&self` / `&mut self`.
    unsafe impl Send for NamedRegion {}

    impl NamedRegion {
        pub fn open(name: &str) -> Result<Self> {
            let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();

            // SAFETY: `wide` is NUL-terminated and outlives the call.
            let handle = unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS, 0, wide.as_ptr()) };
            if handle == 0 {
                return Err(BridgeError::NotFound(format!(
                    "file mapping {name} does not exist"
                )));
            }

            // SAFETY: `handle` is a valid mapping handle opened above.
            let view = unsafe { MapViewOfFile(handle, FILE_MAP_ALL_ACCESS, 0, 0, RECORD_SIZE) };
            if view.Value.is_null() {
                let err = std::io::Error::last_os_error();
                // SAFETY: `handle` is valid and not used afterwards.
                unsafe { CloseHandle(handle) };
                return Err(BridgeError::Region(format!(
                    "failed to map view of {name}: {err}"
                )));
            }

            Ok(Self {
                handle,
                view,
                location: LinkLocation::Named(name.to_owned()),
            })
        }

        fn base(&self) -> *mut u8 {
            self.view.Value.cast()
        }
    }

    impl LinkRegion for NamedRegion {
        fn location(&self) -> &LinkLocation {
            &self.location
        }

        fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
            check_bounds(offset, buf.len())?;
            // SAFETY: bounds checked against the RECORD_SIZE-byte view.
            unsafe {
                std::ptr::copy_nonoverlapping(self.base().add(offset), buf.as_mut_ptr(), buf.len());
            }
            Ok(())
        }

        fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
            check_bounds(offset, bytes.len())?;
            // SAFETY: bounds checked against the RECORD_SIZE-byte view.
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.base().add(offset), bytes.len());
            }
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            // SAFETY: the view is mapped for RECORD_SIZE bytes.
            let ok = unsafe { FlushViewOfFile(self.view.Value.cast::<c_void>(), RECORD_SIZE) };
            if ok == 0 {
                return Err(BridgeError::Region(format!(
                    "failed to flush {}: {}",
                    self.location,
                    std::io::Error::last_os_error()
                )));
            }
            Ok(())
        }
    }

    impl Drop for NamedRegion {
        fn drop(&mut self) {
            // SAFETY: view and handle were obtained in `open` and are
            // released exactly once here.
            unsafe {
                UnmapViewOfFile(self.view);
                CloseHandle(self.handle);
            }
        }
    }
}
