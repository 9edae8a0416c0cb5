use crate::error::*;

use std::io::{Read, Seek, SeekFrom, Write};

/// Whether the device may be modified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Writes actually reach the device
    ReadWrite,
    /// Every write is silently dropped, reads still work
    Preview,
}

/// The storage medium the catalog lives on
///
/// Any struct that implements [`Read`], [`Write`] & [`Seek`] will do.
/// Each operation wraps its IO error with the device name
#[derive(Debug)]
pub(crate) struct Device<S>
where
    S: Read + Write + Seek,
{
    storage: S,
    name: String,
    access: Access,
    /// size of the device in bytes
    size: u64,
}

impl<S> Device<S>
where
    S: Read + Write + Seek,
{
    /// Measure the size of `storage`, then position it at `start`
    pub(crate) fn new(mut storage: S, name: String, access: Access, start: u64) -> Result<Self> {
        let seek_error = |source: std::io::Error| Error::DeviceSeek {
            device: name.clone(),
            source,
        };

        let size = storage.seek(SeekFrom::End(0)).map_err(seek_error)?;
        storage.seek(SeekFrom::Start(start)).map_err(seek_error)?;

        log::info!("device {name} is {size} bytes long ({access:?})");

        Ok(Self {
            storage,
            name,
            access,
            size,
        })
    }

    #[inline]
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub(crate) fn access(&self) -> Access {
        self.access
    }

    #[inline]
    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub(crate) fn into_inner(self) -> S {
        self.storage
    }

    pub(crate) fn seek(&mut self, offset: u64) -> Result<()> {
        log::trace!("seeking device {} to byte {offset}", self.name);

        self.storage
            .seek(SeekFrom::Start(offset))
            .map_err(|source| Error::DeviceSeek {
                device: self.name.clone(),
                source,
            })?;

        Ok(())
    }

    pub(crate) fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.storage
            .read_exact(buf)
            .map_err(|source| Error::DeviceRead {
                device: self.name.clone(),
                source,
            })
    }

    pub(crate) fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        if self.access == Access::Preview {
            return Ok(());
        }

        self.storage.write_all(buf).map_err(|source| {
            log::error!("failed writing {} bytes to device {}", buf.len(), self.name);

            Error::DeviceWrite {
                device: self.name.clone(),
                source,
            }
        })
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        if self.access == Access::Preview {
            return Ok(());
        }

        self.storage.flush().map_err(|source| Error::DeviceFlush {
            device: self.name.clone(),
            source,
        })
    }
}
