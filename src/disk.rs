//! The reserved header region of the device and the catalog of images it describes

mod consts;
mod layout;

pub use consts::*;
pub use layout::*;

use crate::{
    error::*,
    io::{Access, Device},
    manifest::ImageSource,
    utils,
};

use core::fmt;

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, Write},
    path::Path,
};

/// Progress notifications sent while an image is being written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress<'a> {
    /// We are about to write `image`, which will occupy `total_bytes` on the device
    Started { image: &'a str, total_bytes: u64 },
    /// That many bytes of the current image (padding included) have been written so far
    Written(u64),
    /// The current image was written successfully and is now part of the catalog
    Finished,
}

/// A single line of a [`Listing`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// 1-based position in the catalog
    pub ordinal: usize,
    pub name: String,
    /// The MBR of the device currently chainloads this image
    pub active: bool,
}

/// What the MBR of the device currently boots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootTarget {
    /// The image with this ordinal
    Image(usize),
    /// Nothing, the MBR was never written
    Zeroed,
}

/// The catalog of a device, as reported by [`Catalog::listing`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub entries: Vec<ListEntry>,
    pub boot: BootTarget,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let mark = if entry.active { '*' } else { ' ' };
            writeln!(f, "{mark} {}: {}", entry.ordinal, entry.name)?;
        }

        match self.boot {
            BootTarget::Image(ordinal) => write!(f, "* - active partition {ordinal}"),
            BootTarget::Zeroed => write!(f, "MBR is zeroed"),
        }
    }
}

/// An API to lay out images on a device and choose which one boots
///
/// A [`Catalog`] either starts empty (to build a new chain of images with
/// [`write_image`](Catalog::write_image)) or gets [`load`](Catalog::load)ed from the device
#[derive(Debug)]
pub struct Catalog<S>
where
    S: Read + Write + Seek,
{
    device: Device<S>,

    header: Box<Header>,
    /// how many leading slots of `header.images` are in use
    image_count: usize,
    /// the (already fitted) boot sector of each image written through this catalog
    staged_boot_sectors: Vec<MasterBootSector>,

    chunk: Vec<u8>,
}

/// Constructors
impl Catalog<File> {
    /// Open the device at `path`
    ///
    /// With [`Access::Preview`], the device is opened read-only and nothing will ever be written to it
    pub fn open<P>(path: P, access: Access) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let device = path.display().to_string();

        let file = OpenOptions::new()
            .read(true)
            .write(access == Access::ReadWrite)
            .open(path)
            .map_err(|source| {
                log::error!("cannot open device {device}");

                Error::DeviceOpen {
                    device: device.clone(),
                    source,
                }
            })?;

        Self::from_storage(file, device, access)
    }
}

/// Constructors
impl<S> Catalog<S>
where
    S: Read + Write + Seek,
{
    /// Create an empty [`Catalog`] on a storage object that implements [`Read`], [`Write`] & [`Seek`]
    ///
    /// `name` is only used for diagnostics
    pub fn from_storage<N>(storage: S, name: N, access: Access) -> Result<Self>
    where
        N: Into<String>,
    {
        let device = Device::new(storage, name.into(), access, HEADER_SIZE as u64)?;

        Ok(Self {
            device,
            header: Header::zeroed(),
            image_count: 0,
            staged_boot_sectors: Vec::new(),
            chunk: vec![0; CHUNK_SIZE],
        })
    }
}

/// Getter functions
impl<S> Catalog<S>
where
    S: Read + Write + Seek,
{
    #[inline]
    /// The size of the device in bytes
    pub fn device_size(&self) -> u64 {
        self.device.size()
    }

    #[inline]
    /// How many images are in the catalog
    pub fn image_count(&self) -> usize {
        self.image_count
    }

    #[inline]
    /// The descriptors of the cataloged images, in order
    pub fn descriptors(&self) -> &[ImageDescriptor] {
        &self.header.images[..self.image_count]
    }

    #[inline]
    /// The in-memory copy of the device's header region
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// How many GiB of images fit on the device
    pub fn available_gib(&self) -> u64 {
        let payload_bytes = self.device.size().saturating_sub(HEADER_SIZE as u64);

        (payload_bytes >> GIB_SHIFT).min(MAX_ADDRESSABLE_GIB)
    }

    /// Give back the underlying storage object
    pub fn into_storage(self) -> S {
        self.device.into_inner()
    }
}

/// Building a new chain of images
impl<S> Catalog<S>
where
    S: Read + Write + Seek,
{
    /// Make sure `required_gib` worth of images fit on the device
    ///
    /// This should be called before the first [`write_image`](Catalog::write_image),
    /// so that nothing gets written if the device is too small
    pub fn check_capacity(&self, required_gib: u64) -> Result<()> {
        let available_gib = self.available_gib();

        if required_gib > available_gib {
            log::error!(
                "device {} has room for {available_gib} GiB, {required_gib} GiB required",
                self.device.name()
            );

            return Err(Error::Capacity {
                device: self.device.name().to_owned(),
                available_gib,
                required_gib,
            });
        }

        Ok(())
    }

    /// Append `source` to the catalog, right after the last image
    ///
    /// The image's own MBR gets its second partition stretched (or shrunk) so that
    /// it ends exactly where the slot does, the rest of the slot is zero-filled.
    ///
    /// If this fails, the catalog is left as it was before the call,
    /// although the device may already contain part of the image
    pub fn write_image<R, F>(&mut self, source: &mut ImageSource<R>, mut progress: F) -> Result<()>
    where
        R: Read,
        F: FnMut(Progress<'_>),
    {
        let ordinal = self.image_count + 1;
        let image = source.path().to_owned();

        if self.image_count >= MAX_IMAGE_COUNT {
            log::error!("cannot add {image}, the catalog is full");

            return Err(Error::CatalogFull {
                device: self.device.name().to_owned(),
                limit: MAX_IMAGE_COUNT,
            });
        }

        let first_lba = match self.image_count {
            0 => u64::from(HEADER_SECTORS),
            n => self.header.images[n - 1].end_lba(),
        };
        let sector_count = u64::from(source.size_gib()) * SECTORS_PER_GIB;
        let size_bytes = source.size_bytes();

        // every sector of the image must be addressable by the partition tables
        if first_lba + sector_count > u64::from(u32::MAX) {
            return Err(Error::Capacity {
                device: self.device.name().to_owned(),
                available_gib: self.available_gib(),
                required_gib: (first_lba + sector_count - u64::from(HEADER_SECTORS))
                    .div_ceil(SECTORS_PER_GIB),
            });
        }

        let mut descriptor = ImageDescriptor::EMPTY;
        descriptor.first_lba = first_lba as u32;
        descriptor.sector_count = sector_count as u32;
        descriptor.set_name(&image);

        log::info!(
            "writing image #{ordinal} {image} at LBA {first_lba}, {size_bytes} bytes total"
        );
        progress(Progress::Started {
            image: &image,
            total_bytes: size_bytes,
        });

        self.device.seek(first_lba << SECTOR_SHIFT)?;

        let mut written: u64 = 0;
        let mut boot_sector = None;

        loop {
            let bytes_read = utils::io::read_chunk(source.reader_mut(), &mut self.chunk)
                .map_err(|err| Error::SourceRead {
                    image: image.clone(),
                    source: err,
                })?;

            if bytes_read == 0 {
                break;
            }

            if boot_sector.is_none() {
                if bytes_read < SECTOR_SIZE {
                    log::error!("image {image} is too short to contain an MBR");
                    return Err(Error::ImageBootMagic { image, ordinal });
                }

                let mut mbr = MasterBootSector::from_bytes(&self.chunk)?;
                let part1 = mbr.partitions[1];

                let Some(fitted_count) = (size_bytes >> SECTOR_SHIFT)
                    .checked_sub(u64::from(part1.first_lba))
                    .filter(|fitted| u64::from(part1.sector_count) <= *fitted)
                else {
                    let required_gib = part1.end_lba().div_ceil(SECTORS_PER_GIB);
                    log::error!("image {image} #{ordinal} requires at least {required_gib} GiB");

                    return Err(Error::SlotTooSmall {
                        image,
                        ordinal,
                        required_gib,
                    });
                };

                log::debug!(
                    "image {image}: partition 1 resized from {} to {fitted_count} sectors",
                    part1.sector_count
                );

                descriptor.part0_first_lba = mbr.partitions[0].first_lba;
                // can't overflow, the whole slot was checked to be addressable
                mbr.partitions[1].sector_count = fitted_count as u32;
                mbr.write_to(&mut self.chunk[..SECTOR_SIZE])?;

                boot_sector = Some(mbr);
            }

            written += bytes_read as u64;

            if written > size_bytes {
                log::error!(
                    "image {image} is larger than its {} GiB slot",
                    source.size_gib()
                );

                return Err(Error::ImageTooBig {
                    image,
                    size_gib: source.size_gib(),
                });
            }

            self.device.write_all(&self.chunk[..bytes_read])?;
            progress(Progress::Written(written));

            if bytes_read < CHUNK_SIZE {
                break;
            }
        }

        let Some(boot_sector) = boot_sector else {
            log::error!("image {image} is empty");
            return Err(Error::ImageBootMagic { image, ordinal });
        };

        // pad the rest of the slot with zeroes
        self.chunk.fill(0);
        while written < size_bytes {
            let len = (size_bytes - written).min(CHUNK_SIZE as u64) as usize;

            self.device.write_all(&self.chunk[..len])?;
            written += len as u64;
            progress(Progress::Written(written));
        }

        // only now that the whole image is on the device does it become part of the catalog
        self.header.images[self.image_count] = descriptor;
        self.staged_boot_sectors.push(boot_sector);
        self.image_count += 1;

        progress(Progress::Finished);

        Ok(())
    }
}

/// Reading and switching an existing chain of images
impl<S> Catalog<S>
where
    S: Read + Write + Seek,
{
    /// Replace the in-memory header with the one stored on the device
    pub fn load(&mut self) -> Result<()> {
        let mut bytes = [0_u8; HEADER_SIZE];

        self.device.seek(0)?;
        self.device.read_exact(&mut bytes)?;

        let header = Header::from_bytes(&bytes)?;

        if !header.marker.is_marker() {
            log::error!("marker sector of device {} is corrupted", self.device.name());
            return Err(self.header_error(HeaderError::MissingMarker));
        }

        let image_count = header.image_count();
        if image_count == 0 {
            return Err(self.header_error(HeaderError::NoImages));
        }

        log::info!(
            "found {image_count} images on device {}",
            self.device.name()
        );

        self.header = header;
        self.image_count = image_count;
        self.staged_boot_sectors.clear();

        Ok(())
    }

    /// Find out which image the device currently boots
    ///
    /// An MBR that was never written is reported as [`BootTarget::Zeroed`],
    /// but an MBR that points outside of every image is an error
    pub fn listing(&self) -> Result<Listing> {
        let boot_lba = u64::from(self.header.mbr.partitions[0].first_lba);

        let entries: Vec<ListEntry> = self
            .descriptors()
            .iter()
            .enumerate()
            .map(|(index, descriptor)| ListEntry {
                ordinal: index + 1,
                name: descriptor.name(),
                active: descriptor.absolute_part0_lba() == boot_lba,
            })
            .collect();

        let boot = if self.header.mbr.is_zeroed() {
            BootTarget::Zeroed
        } else if let Some(entry) = entries.iter().rev().find(|entry| entry.active) {
            BootTarget::Image(entry.ordinal)
        } else {
            log::error!(
                "first MBR partition of device {} points to LBA {boot_lba}, outside every image",
                self.device.name()
            );
            return Err(self.header_error(HeaderError::NoActiveImage));
        };

        Ok(Listing { entries, boot })
    }

    /// Make the image with the 1-based `ordinal` the one that boots
    ///
    /// The image's own MBR becomes the MBR of the device, with its first two partitions
    /// moved to where the image actually lives and a third one spanning every image.
    /// The whole header is then written back to the device.
    ///
    /// In [`Access::Preview`], the image's MBR is only checked
    pub fn select_boot(&mut self, ordinal: usize) -> Result<()> {
        if ordinal == 0 || ordinal > self.image_count {
            log::error!(
                "image number {ordinal} is out of range, device {} has {} images",
                self.device.name(),
                self.image_count
            );

            return Err(Error::OrdinalOutOfRange {
                ordinal,
                count: self.image_count,
            });
        }

        let index = ordinal - 1;
        let descriptor = self.header.images[index];
        let image = descriptor.name();

        let mut mbr = match (self.device.access(), self.staged_boot_sectors.get(index)) {
            // the device was never written, so this is the only copy
            (Access::Preview, Some(staged)) => *staged,
            _ => self.read_boot_sector(descriptor.first_lba)?,
        };

        if !mbr.has_boot_magic() {
            log::error!("no magic in the MBR of image #{ordinal} {image}");
            return Err(Error::ImageBootMagic { image, ordinal });
        }

        if !mbr.partitions[0].status().contains(PartitionStatus::ACTIVE) {
            log::warn!("partition 0 of image #{ordinal} {image} isn't flagged as active");
        }

        if self.device.access() == Access::Preview {
            log::info!("preview: image #{ordinal} {image} would be selected for boot");
            return Ok(());
        }

        // the format only has room for 32-bit LBAs
        for partition in &mut mbr.partitions[..2] {
            partition.first_lba = partition.first_lba.wrapping_add(descriptor.first_lba);
        }

        let last = self.header.images[self.image_count - 1];
        let rescue = &mut mbr.partitions[2];
        rescue.first_lba = HEADER_SECTORS;
        rescue.sector_count = (last.end_lba() - u64::from(HEADER_SECTORS)) as u32;
        rescue.partition_type = RESCUE_PARTITION_TYPE;

        log::debug!(
            "chainloading image #{ordinal} {image}: partition 0 at LBA {} (CHS {})",
            mbr.partitions[0].first_lba,
            mbr.partitions[0].first_chs
        );

        self.header.mbr = mbr;
        self.header.marker = MasterBootSector::marker();

        self.persist()
    }
}

/// Internal low-level functions
impl<S> Catalog<S>
where
    S: Read + Write + Seek,
{
    fn read_boot_sector(&mut self, lba: u32) -> Result<MasterBootSector> {
        let mut sector = [0_u8; SECTOR_SIZE];

        self.device.seek(u64::from(lba) << SECTOR_SHIFT)?;
        self.device.read_exact(&mut sector)?;

        Ok(MasterBootSector::from_bytes(&sector)?)
    }

    /// Write the whole header back to the start of the device
    fn persist(&mut self) -> Result<()> {
        let bytes = self.header.to_bytes()?;

        self.device.seek(0)?;
        self.device.write_all(&bytes)?;
        self.device.flush()?;

        log::info!("header written to device {}", self.device.name());

        Ok(())
    }

    #[inline]
    fn header_error(&self, kind: HeaderError) -> Error {
        Error::Header {
            device: self.device.name().to_owned(),
            kind,
        }
    }
}
