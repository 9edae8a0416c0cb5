//! Turn a block device into a chain of bootable images
//!
//! Images are written one after the other, past a reserved header region that holds
//! the MBR of the device, a marker sector and a catalog of the images.
//! Any cataloged image can later be made the one the MBR chainloads.

mod error;
pub mod disk;
mod io;
pub mod manifest;
mod utils;
pub mod workflow;

pub use disk::{BootTarget, Catalog, ListEntry, Listing, Progress};
pub use error::*;
pub use io::Access;
pub use manifest::{ImageSource, Manifest};

/// Make sure the host can read and write the on-disk format
///
/// Should be called once, before anything else
pub fn check_host() -> Result<()> {
    if cfg!(target_endian = "big") {
        return Err(Error::ByteOrder);
    }

    let header_len = utils::bincode::encoded_len(&*disk::Header::zeroed())?;
    if header_len != disk::HEADER_SIZE {
        log::error!("the header encodes to {header_len} bytes");
        return Err(Error::HeaderLayout(header_len));
    }

    Ok(())
}
