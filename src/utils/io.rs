use std::io::{self, Read};

/// Read from `reader` until `buf` is full or EOF is reached,
/// returning the number of bytes read
///
/// Unlike [`Read::read_exact`], hitting EOF early isn't an error
pub(crate) fn read_chunk<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: Read + ?Sized,
{
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            // a signal interrupted us, just try again
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(filled)
}
