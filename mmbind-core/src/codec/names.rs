//! Reference name stream.

/// Split a stream of NUL-terminated names. Bytes after the last NUL are not
/// a complete name and are ignored.
pub fn decode_ref_names(bytes: &[u8]) -> Vec<String> {
    let mut names: Vec<String> = bytes
        .split(|&b| b == 0)
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .collect();
    // `split` always yields the piece after the final separator
    names.pop();
    names
}

pub fn encode_ref_names<S: AsRef<str>>(names: &[S]) -> Vec<u8> {
    let mut out = Vec::with_capacity(names.iter().map(|n| n.as_ref().len() + 1).sum());
    for name in names {
        out.extend_from_slice(name.as_ref().as_bytes());
        out.push(0);
    }
    out
}
