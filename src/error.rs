use std::io;

use bincode::error::{DecodeError, EncodeError};

/// An error type that denotes that there is something wrong
/// with the header region of the device itself (perhaps it was never initialized or it got corrupted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, displaydoc::Display)]
pub enum HeaderError {
    /// the marker sector doesn't contain the expected magic, the header can't be trusted
    MissingMarker,
    /// no images found in the catalog
    NoImages,
    /// no active partition selected in the MBR, its first partition points outside every image
    NoActiveImage,
}

/// An error indicating that an operation on the device, the manifest or an image has failed
#[derive(Debug, displaydoc::Display)]
pub enum Error {
    /// compile and run only on a little-endian host, the on-disk format is little-endian
    ByteOrder,
    /// the header layout encodes to {0} bytes instead of the reserved region size
    HeaderLayout(usize),
    /// {0}
    CommandLine(String),
    /// cannot open device {device}: {source}
    DeviceOpen { device: String, source: io::Error },
    /// cannot seek device {device}: {source}
    DeviceSeek { device: String, source: io::Error },
    /// cannot write to device {device}: {source}
    DeviceWrite { device: String, source: io::Error },
    /// cannot read device {device}: {source}
    DeviceRead { device: String, source: io::Error },
    /// cannot flush device {device}: {source}
    DeviceFlush { device: String, source: io::Error },
    /// cannot open image list {manifest}: {source}
    ManifestOpen { manifest: String, source: io::Error },
    /// image list {manifest} line {line} exceeds {limit} characters
    LineTooLong {
        manifest: String,
        line: usize,
        limit: usize,
    },
    /// image list {manifest} line {line}: {reason}
    LineSyntax {
        manifest: String,
        line: usize,
        reason: &'static str,
    },
    /// cannot open source image {path}: {source}
    SourceOpen { path: String, source: io::Error },
    /// cannot read source image {image}: {source}
    SourceRead { image: String, source: io::Error },
    /// no image files defined in {0}
    EmptyManifest(String),
    /// size of image {image} is greater than requested size {size_gib} GiB
    ImageTooBig { image: String, size_gib: u32 },
    /// size of image {image} #{ordinal} requires at least {required_gib} GiB
    SlotTooSmall {
        image: String,
        ordinal: usize,
        required_gib: u64,
    },
    /// image count is {count} in {manifest}, the limit is {limit}
    TooManyImages {
        manifest: String,
        count: usize,
        limit: usize,
    },
    /// device {device} already holds {limit} images, no room left in its catalog
    CatalogFull { device: String, limit: usize },
    /// invalid header on device {device}: {kind}
    Header { device: String, kind: HeaderError },
    /// no boot magic in the MBR of image #{ordinal} {image}
    ImageBootMagic { image: String, ordinal: usize },
    /// image number {ordinal} is out of range, there are {count} images
    OrdinalOutOfRange { ordinal: usize, count: usize },
    /// not enough space on device {device}: {available_gib} GiB available, {required_gib} GiB required
    Capacity {
        device: String,
        available_gib: u64,
        required_gib: u64,
    },
    /**
     [`bincode`] errored out while encoding an on-disk record

     This error variant should NEVER be raised, all records have a fixed size
    */
    #[displaydoc("bincode failed to encode a record: {0}")]
    Encode(EncodeError),
    /**
     [`bincode`] errored out while decoding an on-disk record

     This error variant should NEVER be raised, all records have a fixed size
    */
    #[displaydoc("bincode failed to decode a record: {0}")]
    Decode(DecodeError),
}

impl Error {
    /// The process exit status that corresponds to this error
    ///
    /// Each kind of failure gets its own code, so that scripts can tell them apart
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::ByteOrder | Error::HeaderLayout(_) => 1,
            Error::CommandLine(_) => 2,
            Error::DeviceOpen { .. } => 3,
            Error::DeviceSeek { .. } => 4,
            Error::DeviceWrite { .. } => 5,
            Error::DeviceRead { .. } => 6,
            Error::DeviceFlush { .. } => 7,
            Error::ManifestOpen { .. } => 8,
            Error::LineTooLong { .. } => 9,
            Error::LineSyntax { .. } => 10,
            Error::SourceOpen { .. } => 11,
            Error::EmptyManifest(_) => 12,
            Error::ImageTooBig { .. } => 13,
            Error::SlotTooSmall { .. } => 14,
            Error::TooManyImages { .. } | Error::CatalogFull { .. } => 15,
            Error::Header { kind, .. } => match kind {
                HeaderError::NoActiveImage => 16,
                HeaderError::MissingMarker => 17,
                HeaderError::NoImages => 18,
            },
            Error::ImageBootMagic { .. } => 19,
            Error::OrdinalOutOfRange { .. } => 20,
            Error::Capacity { .. } => 21,
            Error::Encode(_) | Error::Decode(_) => 22,
            Error::SourceRead { .. } => 23,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DeviceOpen { source, .. }
            | Error::DeviceSeek { source, .. }
            | Error::DeviceWrite { source, .. }
            | Error::DeviceRead { source, .. }
            | Error::DeviceFlush { source, .. }
            | Error::ManifestOpen { source, .. }
            | Error::SourceOpen { source, .. }
            | Error::SourceRead { source, .. } => Some(source),
            Error::Encode(err) => Some(err),
            Error::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EncodeError> for Error {
    #[inline]
    fn from(value: EncodeError) -> Self {
        Error::Encode(value)
    }
}

impl From<DecodeError> for Error {
    #[inline]
    fn from(value: DecodeError) -> Self {
        Error::Decode(value)
    }
}

/// An alias for a [`Result`] with an [`Error`] error type
pub type Result<T> = core::result::Result<T, Error>;
