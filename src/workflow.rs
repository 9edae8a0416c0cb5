//! The three things one can do with a device: build a chain of images, list it, or switch the booted image

use crate::{
    disk::{Catalog, Listing, Progress},
    error::*,
    io::Access,
    manifest::Manifest,
};

use std::{
    io::{Read, Seek, Write},
    path::Path,
};

/// Write every image listed in `manifest` to `device`, then boot image number `boot`
///
/// With [`Access::Preview`], every check is performed but nothing gets written
pub fn build<P, Q, F>(device: P, manifest: Q, boot: usize, access: Access, progress: F) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    F: FnMut(Progress<'_>),
{
    let mut manifest = Manifest::from_path(manifest)?;

    // no need to touch the device if this will fail anyway
    if boot > manifest.len() {
        return Err(Error::OrdinalOutOfRange {
            ordinal: boot,
            count: manifest.len(),
        });
    }

    let mut catalog = Catalog::open(device, access)?;

    build_catalog(&mut catalog, &mut manifest, boot, progress)
}

/// Same as [`build`], on an already opened [`Catalog`]
pub fn build_catalog<S, R, F>(
    catalog: &mut Catalog<S>,
    manifest: &mut Manifest<R>,
    boot: usize,
    mut progress: F,
) -> Result<()>
where
    S: Read + Write + Seek,
    R: Read,
    F: FnMut(Progress<'_>),
{
    catalog.check_capacity(manifest.total_gib())?;

    for source in manifest.sources_mut() {
        catalog.write_image(source, &mut progress)?;
    }

    catalog.select_boot(boot)
}

/// Read the catalog of `device` without modifying it
pub fn list<P>(device: P) -> Result<Listing>
where
    P: AsRef<Path>,
{
    let mut catalog = Catalog::open(device, Access::Preview)?;
    catalog.load()?;

    catalog.listing()
}

/// Make image number `boot` of `device` the one that boots
pub fn switch<P>(device: P, boot: usize) -> Result<()>
where
    P: AsRef<Path>,
{
    let mut catalog = Catalog::open(device, Access::ReadWrite)?;
    catalog.load()?;

    catalog.select_boot(boot)
}
