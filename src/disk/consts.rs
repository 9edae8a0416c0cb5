/// The size (in bytes) of a sector on the target device
pub const SECTOR_SIZE: usize = 512;
/// `SECTOR_SIZE == 1 << SECTOR_SHIFT`
pub const SECTOR_SHIFT: u32 = 9;
/// `1 GiB == 1 << GIB_SHIFT` bytes
pub const GIB_SHIFT: u32 = 30;
/// How many sectors make up a GiB
pub const SECTORS_PER_GIB: u64 = 1 << (GIB_SHIFT - SECTOR_SHIFT);

/// The size (in bytes) of the reserved header region at the start of the device
pub const HEADER_SIZE: usize = 32768;
/// The size of the header region in sectors, which is also the first LBA of the first image
pub const HEADER_SECTORS: u32 = (HEADER_SIZE >> SECTOR_SHIFT) as u32;

/// Images are streamed to the device in chunks of this many bytes
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Every byte of the marker sector is set to this value
pub const MARKER_BYTE: u8 = 0x42;
/// The trailer of a valid master boot sector
pub const BOOT_MAGIC: u16 = 0xAA55;
/// The partition type of the rescue partition that spans the whole payload region
pub const RESCUE_PARTITION_TYPE: u8 = 0x1F;

pub(crate) const CHS_SIZE: usize = 3;
pub(crate) const PARTITION_ENTRY_SIZE: usize = 16;
pub(crate) const PARTITION_COUNT: usize = 4;
pub(crate) const BOOT_CODE_SIZE: usize = 440;
pub(crate) const BOOT_SECTOR_SIZE: usize =
    BOOT_CODE_SIZE + 4 + 2 + PARTITION_COUNT * PARTITION_ENTRY_SIZE + 2;

/// The length of the name field of an image descriptor, terminator included
pub const IMAGE_NAME_LEN: usize = SECTOR_SIZE - 4 * 4;
pub(crate) const IMAGE_DESCRIPTOR_SIZE: usize = 4 * 4 + IMAGE_NAME_LEN;

/// How many image descriptors fit in the header after the boot and marker sectors
pub const MAX_IMAGE_COUNT: usize = (HEADER_SIZE - 2 * BOOT_SECTOR_SIZE) / IMAGE_DESCRIPTOR_SIZE;

const _: () = assert!(1 << SECTOR_SHIFT == SECTOR_SIZE);
const _: () = assert!(PARTITION_ENTRY_SIZE == 1 + CHS_SIZE + 1 + CHS_SIZE + 4 + 4);
const _: () = assert!(BOOT_SECTOR_SIZE == SECTOR_SIZE);
const _: () = assert!(IMAGE_DESCRIPTOR_SIZE == SECTOR_SIZE);
const _: () =
    assert!(2 * BOOT_SECTOR_SIZE + MAX_IMAGE_COUNT * IMAGE_DESCRIPTOR_SIZE == HEADER_SIZE);
const _: () = assert!(CHUNK_SIZE % SECTOR_SIZE == 0);

/// The largest payload (in GiB) whose every sector is still addressable with a 32-bit LBA
pub const MAX_ADDRESSABLE_GIB: u64 = (u32::MAX as u64 - HEADER_SECTORS as u64) / SECTORS_PER_GIB;
