//! Image lists: which images go on the device, and how much room each one gets

use crate::{disk::MAX_IMAGE_COUNT, error::*};

use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

/// Lines (terminator included) can't be longer than this
pub const MAX_LINE_LEN: usize = 1024;

/// A single image to be written to the device
#[derive(Debug)]
pub struct ImageSource<R = File> {
    size_gib: u32,
    path: String,
    reader: R,
}

impl ImageSource<File> {
    /// Open the image file at `path`, to be placed in a slot of `size_gib` GiB
    pub fn open(size_gib: u32, path: &str) -> Result<Self> {
        let file = File::open(path).map_err(|source| {
            log::error!("cannot open source image {path}");

            Error::SourceOpen {
                path: path.to_owned(),
                source,
            }
        })?;

        Ok(Self::from_reader(size_gib, path, file))
    }
}

impl<R> ImageSource<R>
where
    R: Read,
{
    /// Wrap any byte stream as an image source
    pub fn from_reader<P>(size_gib: u32, path: P, reader: R) -> Self
    where
        P: Into<String>,
    {
        Self {
            size_gib,
            path: path.into(),
            reader,
        }
    }

    #[inline]
    /// The size of the slot this image will be given, in GiB
    pub fn size_gib(&self) -> u32 {
        self.size_gib
    }

    #[inline]
    /// The size of the slot this image will be given, in bytes
    pub fn size_bytes(&self) -> u64 {
        u64::from(self.size_gib) << crate::disk::GIB_SHIFT
    }

    #[inline]
    /// The path this image was listed with
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub(crate) fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }
}

/// An ordered, validated list of [`ImageSource`]s
#[derive(Debug)]
pub struct Manifest<R = File> {
    sources: Vec<ImageSource<R>>,
}

impl Manifest<File> {
    /// Parse the image list at `path`, opening every image it names
    pub fn from_path<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let name = path.display().to_string();

        let file = File::open(path).map_err(|source| Error::ManifestOpen {
            manifest: name.clone(),
            source,
        })?;

        Self::parse(BufReader::new(file), &name, ImageSource::open)
    }
}

impl<R> Manifest<R>
where
    R: Read,
{
    /// Parse an image list from `reader`
    ///
    /// `name` is only used for diagnostics, while `open` turns each
    /// `(size, path)` pair into an [`ImageSource`], as soon as its line is parsed
    ///
    /// Either the whole list is valid and every image could be opened, or an error is returned
    pub fn parse<B, F>(mut reader: B, name: &str, mut open: F) -> Result<Self>
    where
        B: BufRead,
        F: FnMut(u32, &str) -> Result<ImageSource<R>>,
    {
        let mut sources = Vec::new();
        let mut buf = Vec::with_capacity(MAX_LINE_LEN);
        let mut line_number = 0;

        loop {
            buf.clear();
            let bytes_read = (&mut reader)
                .take(MAX_LINE_LEN as u64)
                .read_until(b'\n', &mut buf)
                .map_err(|source| Error::ManifestOpen {
                    manifest: name.to_owned(),
                    source,
                })?;

            if bytes_read == 0 {
                break;
            }
            line_number += 1;

            let line = match buf.strip_suffix(b"\n") {
                Some(line) => line,
                None if bytes_read == MAX_LINE_LEN => {
                    log::error!("image list {name} line {line_number} is too long");

                    return Err(Error::LineTooLong {
                        manifest: name.to_owned(),
                        line: line_number,
                        limit: MAX_LINE_LEN - 1,
                    });
                }
                // last line, without a terminator
                None => &buf[..],
            };

            if line.is_empty() || line[0] == b'#' {
                continue;
            }

            let (size_gib, path) = parse_line(line).map_err(|reason| {
                log::error!("image list {name} line {line_number}: {reason}");

                Error::LineSyntax {
                    manifest: name.to_owned(),
                    line: line_number,
                    reason,
                }
            })?;
            log::debug!("image list {name} line {line_number}: {size_gib} GiB from {path}");

            sources.push(open(size_gib, path)?);
        }

        if sources.is_empty() {
            return Err(Error::EmptyManifest(name.to_owned()));
        }
        if sources.len() > MAX_IMAGE_COUNT {
            return Err(Error::TooManyImages {
                manifest: name.to_owned(),
                count: sources.len(),
                limit: MAX_IMAGE_COUNT,
            });
        }

        Ok(Self { sources })
    }

    #[inline]
    /// How many images are listed
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[inline]
    /// A parsed [`Manifest`] always lists at least one image, so this is always `false`
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    #[inline]
    /// The listed images, in order
    pub fn sources(&self) -> &[ImageSource<R>] {
        &self.sources
    }

    #[inline]
    pub(crate) fn sources_mut(&mut self) -> &mut [ImageSource<R>] {
        &mut self.sources
    }

    /// The sum of all requested slot sizes, in GiB
    pub fn total_gib(&self) -> u64 {
        self.sources.iter().map(|s| u64::from(s.size_gib)).sum()
    }
}

/// Split a non-comment line into its size and path
fn parse_line(line: &[u8]) -> core::result::Result<(u32, &str), &'static str> {
    let line = core::str::from_utf8(line).map_err(|_| "line is not valid UTF-8")?;
    let mut tokens = line.split_ascii_whitespace();

    let size = tokens.next().ok_or("cannot parse line")?;
    let size_gib = match size.parse::<u32>() {
        Ok(size_gib) if size_gib > 0 => size_gib,
        _ => return Err("incorrect size"),
    };

    let path = tokens
        .next()
        .ok_or("cannot parse line, empty image file name?")?;

    if tokens.next().is_some() {
        return Err("cannot parse line, space in image file name?");
    }

    Ok((size_gib, path))
}
