/// variation of https://stackoverflow.com/a/42067321/19247098 for NUL-terminated name fields
pub(crate) fn string_from_nul_terminated(src: &[u8]) -> String {
    let nul_range_end = src
        .iter()
        .position(|c| *c == 0x00)
        .unwrap_or(src.len()); // default to length if no `\0` present

    String::from_utf8_lossy(&src[0..nul_range_end]).into_owned()
}

/// Fill `dst` with the base name of `path` (everything after the last `/`)
///
/// The name is truncated so that `dst` always ends with at least one `\0`,
/// the rest of `dst` is zeroed
pub(crate) fn fill_base_name(dst: &mut [u8], path: &str) {
    let base_name = path.rsplit('/').next().unwrap_or(path).as_bytes();
    let len = base_name.len().min(dst.len().saturating_sub(1));

    dst.fill(0);
    dst[..len].copy_from_slice(&base_name[..len]);
}
