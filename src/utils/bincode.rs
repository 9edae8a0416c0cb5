use bincode::{
    config::{standard as StandardOptions, Config},
    error::{DecodeError, EncodeError},
    Decode, Encode,
};

#[inline]
// an easy way to universally use the same bincode (de)serialization options
pub(crate) const fn bincode_config() -> impl Config {
    // on-disk records are packed, fixed-width and little-endian, so no varints here
    StandardOptions()
        .with_fixed_int_encoding()
        .with_no_limit()
        .with_little_endian()
}

/// Decode a fixed-size record from the start of `bytes`
#[inline]
pub(crate) fn decode_record<T>(bytes: &[u8]) -> Result<T, DecodeError>
where
    T: Decode<()>,
{
    bincode::decode_from_slice(bytes, bincode_config()).map(|(record, _)| record)
}

/// Encode a fixed-size record into the start of `bytes`, returning how many bytes were written
#[inline]
pub(crate) fn encode_record<T>(record: &T, bytes: &mut [u8]) -> Result<usize, EncodeError>
where
    T: Encode,
{
    bincode::encode_into_slice(record, bytes, bincode_config())
}

/// How many bytes `record` takes up once encoded
pub(crate) fn encoded_len<T>(record: &T) -> Result<usize, EncodeError>
where
    T: Encode,
{
    bincode::encode_to_vec(record, bincode_config()).map(|bytes| bytes.len())
}
