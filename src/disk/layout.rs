use super::consts::*;

use crate::utils::{self, bincode::*};

use core::fmt;

use bincode::{
    error::{DecodeError, EncodeError},
    Decode, Encode,
};
use bitfield_struct::bitfield;
use bitflags::bitflags;

bitflags! {
    /// The status byte of a [`PartitionEntry`]
    ///
    /// Only the "active" bit carries any meaning, the rest are retained as-is
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PartitionStatus: u8 {
        /// The BIOS may boot from this partition
        const ACTIVE = 0x80;
    }
}

#[bitfield(u16, order = Lsb)]
#[derive(Encode, Decode, PartialEq, Eq)]
/// The sector & cylinder part of a legacy CHS address
pub struct CylinderSector {
    #[bits(6)]
    pub sector: u8,
    #[bits(2)]
    cylinder_high: u8,
    #[bits(8)]
    cylinder_low: u8,
}

impl CylinderSector {
    #[inline]
    /// The 10-bit cylinder number
    pub fn cylinder(&self) -> u16 {
        (u16::from(self.cylinder_high()) << 8) | u16::from(self.cylinder_low())
    }
}

/// A legacy CHS address. We never interpret these, but they are kept verbatim
#[derive(Encode, Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chs {
    pub head: u8,
    pub cyl_sec: CylinderSector,
}

impl Chs {
    const fn filled(byte: u8) -> Self {
        Self {
            head: byte,
            cyl_sec: CylinderSector::from_bits(u16::from_le_bytes([byte, byte])),
        }
    }
}

impl fmt::Display for Chs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.cyl_sec.cylinder(),
            self.head,
            self.cyl_sec.sector()
        )
    }
}

/// An entry of the partition table of a [`MasterBootSector`]
#[derive(Encode, Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionEntry {
    pub status: u8,
    pub first_chs: Chs,
    pub partition_type: u8,
    pub last_chs: Chs,
    pub first_lba: u32,
    pub sector_count: u32,
}

impl PartitionEntry {
    /// An unused partition table entry
    pub const EMPTY: Self = Self::filled(0);

    const fn filled(byte: u8) -> Self {
        let word = u32::from_le_bytes([byte; 4]);

        Self {
            status: byte,
            first_chs: Chs::filled(byte),
            partition_type: byte,
            last_chs: Chs::filled(byte),
            first_lba: word,
            sector_count: word,
        }
    }

    #[inline]
    /// The status flags of this partition
    pub fn status(&self) -> PartitionStatus {
        PartitionStatus::from_bits_retain(self.status)
    }

    #[inline]
    /// The sector after the last one of this partition
    pub fn end_lba(&self) -> u64 {
        u64::from(self.first_lba) + u64::from(self.sector_count)
    }
}

/// A master boot record, exactly one sector long
///
/// The marker sector that follows the MBR on the device shares this layout,
/// with every single byte set to [`MARKER_BYTE`]
#[derive(Encode, Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterBootSector {
    pub boot_code: [u8; BOOT_CODE_SIZE],
    pub disk_signature: u32,
    pub _reserved: u16,
    pub partitions: [PartitionEntry; PARTITION_COUNT],
    pub magic: u16,
}

impl MasterBootSector {
    const fn filled(byte: u8) -> Self {
        Self {
            boot_code: [byte; BOOT_CODE_SIZE],
            disk_signature: u32::from_le_bytes([byte; 4]),
            _reserved: u16::from_le_bytes([byte; 2]),
            partitions: [PartitionEntry::filled(byte); PARTITION_COUNT],
            magic: u16::from_le_bytes([byte; 2]),
        }
    }

    /// A sector full of zeroes
    pub const fn zeroed() -> Self {
        Self::filled(0)
    }

    /// The marker sector, every byte of which is [`MARKER_BYTE`]
    pub const fn marker() -> Self {
        Self::filled(MARKER_BYTE)
    }

    #[inline]
    /// Whether this sector ends with [`BOOT_MAGIC`]
    pub fn has_boot_magic(&self) -> bool {
        self.magic == BOOT_MAGIC
    }

    #[inline]
    /// Whether every byte of this sector is [`MARKER_BYTE`]
    pub fn is_marker(&self) -> bool {
        *self == Self::marker()
    }

    #[inline]
    /// Whether this looks like a never-written MBR
    /// (the first partition points nowhere and there's no magic)
    pub fn is_zeroed(&self) -> bool {
        self.partitions[0].first_lba == 0 && self.magic == 0
    }

    /// Decode a [`MasterBootSector`] from the first [`SECTOR_SIZE`] bytes of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode_record(&bytes[..SECTOR_SIZE.min(bytes.len())])
    }

    /// Encode this sector into the first [`SECTOR_SIZE`] bytes of `bytes`
    pub fn write_to(&self, bytes: &mut [u8]) -> Result<(), EncodeError> {
        encode_record(self, bytes)?;

        Ok(())
    }
}

/// The catalog entry of a single image
#[derive(Encode, Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// The first sector of the image on the device
    pub first_lba: u32,
    /// How many sectors are reserved for the image
    pub sector_count: u32,
    /// The first LBA of partition 0, relative to the image's own MBR
    pub part0_first_lba: u32,
    pub _reserved: u32,
    /// NUL-terminated base name of the source file
    pub name: [u8; IMAGE_NAME_LEN],
}

impl ImageDescriptor {
    /// An unused catalog slot
    pub const EMPTY: Self = Self {
        first_lba: 0,
        sector_count: 0,
        part0_first_lba: 0,
        _reserved: 0,
        name: [0; IMAGE_NAME_LEN],
    };

    #[inline]
    /// A slot whose first LBA is zero holds no image
    pub fn is_empty(&self) -> bool {
        self.first_lba == 0
    }

    #[inline]
    /// The name of the image, as stored on the device
    pub fn name(&self) -> String {
        utils::string::string_from_nul_terminated(&self.name)
    }

    #[inline]
    /// Set the name of this image to the base name of `path`
    pub fn set_name(&mut self, path: &str) {
        utils::string::fill_base_name(&mut self.name, path)
    }

    #[inline]
    /// The sector right after the end of this image
    pub fn end_lba(&self) -> u64 {
        u64::from(self.first_lba) + u64::from(self.sector_count)
    }

    #[inline]
    /// The absolute LBA partition 0 of this image lives at on the device
    pub fn absolute_part0_lba(&self) -> u64 {
        u64::from(self.first_lba) + u64::from(self.part0_first_lba)
    }
}

/// The reserved region at the very start of the device
#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub mbr: MasterBootSector,
    pub marker: MasterBootSector,
    pub images: [ImageDescriptor; MAX_IMAGE_COUNT],
}

impl Header {
    /// A [`Header`] with every byte set to zero
    pub fn zeroed() -> Box<Self> {
        Box::new(Self {
            mbr: MasterBootSector::zeroed(),
            marker: MasterBootSector::zeroed(),
            images: [ImageDescriptor::EMPTY; MAX_IMAGE_COUNT],
        })
    }

    /// Decode a [`Header`] from exactly [`HEADER_SIZE`] bytes
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Box<Self>, DecodeError> {
        decode_record(bytes).map(Box::new)
    }

    /// Encode this [`Header`] into exactly [`HEADER_SIZE`] bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut bytes = vec![0_u8; HEADER_SIZE];
        let written = encode_record(self, &mut bytes)?;
        debug_assert_eq!(written, HEADER_SIZE);

        Ok(bytes)
    }

    /// How many leading catalog slots are in use
    pub fn image_count(&self) -> usize {
        self.images
            .iter()
            .position(ImageDescriptor::is_empty)
            .unwrap_or(MAX_IMAGE_COUNT)
    }
}
