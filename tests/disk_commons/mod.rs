#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use imgchain::disk::{
    MasterBootSector, PartitionEntry, PartitionStatus, BOOT_MAGIC, CHUNK_SIZE, GIB_SHIFT,
    HEADER_SIZE, SECTORS_PER_GIB, SECTOR_SIZE,
};
use imgchain::{Error, ImageSource, Manifest};

static ZEROS: [u8; CHUNK_SIZE] = [0; CHUNK_SIZE];

/// Sectors in a 1 GiB slot
pub const GIB_SECTORS: u32 = SECTORS_PER_GIB as u32;

/// An in-memory disk that only stores the sectors that aren't all zeroes
///
/// This lets us build catalogs of GiB-sized images without allocating them
#[derive(Debug, Default)]
pub struct SparseDisk {
    sectors: BTreeMap<u64, Box<[u8; SECTOR_SIZE]>>,
    len: u64,
    pos: u64,
    writes: usize,
}

impl SparseDisk {
    pub fn new(len: u64) -> Self {
        Self {
            len,
            ..Default::default()
        }
    }

    /// A disk with room for exactly `gib` GiB of images
    pub fn with_room_for(gib: u64) -> Self {
        Self::new(HEADER_SIZE as u64 + (gib << GIB_SHIFT))
    }

    /// How many times [`Write::write`] was called
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn sector(&self, lba: u64) -> [u8; SECTOR_SIZE] {
        self.sectors.get(&lba).map(|s| **s).unwrap_or([0; SECTOR_SIZE])
    }

    pub fn byte(&self, offset: u64) -> u8 {
        self.sector(offset / SECTOR_SIZE as u64)[(offset % SECTOR_SIZE as u64) as usize]
    }

    /// The header region of the disk
    pub fn header_bytes(&self) -> Vec<u8> {
        (0..(HEADER_SIZE / SECTOR_SIZE) as u64)
            .flat_map(|lba| self.sector(lba))
            .collect()
    }

    /// Copy the disk to a (sparse) file of the same length
    pub fn dump_to(&self, file: &mut File) -> io::Result<()> {
        file.set_len(self.len)?;

        for (lba, sector) in &self.sectors {
            file.seek(SeekFrom::Start(lba * SECTOR_SIZE as u64))?;
            file.write_all(&sector[..])?;
        }

        file.flush()
    }

    fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }
}

impl Read for SparseDisk {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let lba = self.pos / SECTOR_SIZE as u64;
        let offset = (self.pos % SECTOR_SIZE as u64) as usize;
        let len = buf
            .len()
            .min(SECTOR_SIZE - offset)
            .min(self.remaining() as usize);

        match self.sectors.get(&lba) {
            Some(sector) => buf[..len].copy_from_slice(&sector[offset..offset + len]),
            None => buf[..len].fill(0),
        }
        self.pos += len as u64;

        Ok(len)
    }
}

impl Write for SparseDisk {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining() < buf.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write past the end of the disk",
            ));
        }
        self.writes += 1;

        let first_lba = self.pos / SECTOR_SIZE as u64;
        let last_lba = (self.pos + buf.len() as u64 - 1) / SECTOR_SIZE as u64;

        // zeroes over zeroes, nothing to store
        if buf.len() <= ZEROS.len()
            && buf == &ZEROS[..buf.len()]
            && self.sectors.range(first_lba..=last_lba).next().is_none()
        {
            self.pos += buf.len() as u64;
            return Ok(buf.len());
        }

        let offset = (self.pos % SECTOR_SIZE as u64) as usize;
        let len = buf.len().min(SECTOR_SIZE - offset);
        let sector = self
            .sectors
            .entry(first_lba)
            .or_insert_with(|| Box::new([0; SECTOR_SIZE]));
        sector[offset..offset + len].copy_from_slice(&buf[..len]);

        if sector[..] == ZEROS[..SECTOR_SIZE] {
            self.sectors.remove(&first_lba);
        }
        self.pos += len as u64;

        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SparseDisk {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(offset) => self.len.checked_add_signed(offset),
            SeekFrom::Current(offset) => self.pos.checked_add_signed(offset),
        };

        self.pos = new_pos.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before the start of the disk")
        })?;

        Ok(self.pos)
    }
}

/// The boot sector of an image with a 2-sector first partition at `part0_lba`
/// and a second partition spanning `part1`
pub fn image_mbr(part0_lba: u32, part1: (u32, u32), tag: u8) -> [u8; SECTOR_SIZE] {
    let mut mbr = MasterBootSector::zeroed();

    mbr.boot_code[..3].copy_from_slice(&[0xEB, 0x63, 0x90]);
    mbr.boot_code[3] = tag;
    mbr.disk_signature = (u32::from(tag) << 24) | 0x00C0_FFEE;
    mbr.partitions[0] = PartitionEntry {
        status: PartitionStatus::ACTIVE.bits(),
        partition_type: 0x0C,
        first_lba: part0_lba,
        sector_count: 2,
        ..PartitionEntry::EMPTY
    };
    mbr.partitions[1] = PartitionEntry {
        partition_type: 0x83,
        first_lba: part1.0,
        sector_count: part1.1,
        ..PartitionEntry::EMPTY
    };
    mbr.magic = BOOT_MAGIC;

    let mut bytes = [0; SECTOR_SIZE];
    mbr.write_to(&mut bytes).unwrap();
    bytes
}

/// A typical image that fits in a 1 GiB slot
pub fn small_image_mbr(tag: u8) -> [u8; SECTOR_SIZE] {
    image_mbr(2048, (4096, 8192), tag)
}

pub type Stream = io::Chain<Cursor<Vec<u8>>, io::Take<io::Repeat>>;

/// An image made of `head`, followed by zeroes up to `len` bytes
pub fn image_source(size_gib: u32, path: &str, head: &[u8], len: u64) -> ImageSource<Stream> {
    let padding = len.saturating_sub(head.len() as u64);
    let stream = Cursor::new(head.to_vec()).chain(io::repeat(0).take(padding));

    ImageSource::from_reader(size_gib, path, stream)
}

/// Parse `text` as an image list, where each image is just the boot sector that `mbr_of` returns for its path
pub fn manifest<F>(text: &str, mut mbr_of: F) -> Result<Manifest<Stream>, Error>
where
    F: FnMut(&str) -> [u8; SECTOR_SIZE],
{
    Manifest::parse(text.as_bytes(), "images.list", |size_gib, path: &str| {
        let mbr = mbr_of(path);
        Ok(image_source(size_gib, path, &mbr, mbr.len() as u64))
    })
}
