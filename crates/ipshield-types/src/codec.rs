use crate::error::TypeError;

/// Decode a fixed-width hex string with an optional `0x` prefix.
pub(crate) fn decode_prefixed<const N: usize>(s: &str) -> Result<[u8; N], TypeError> {
    let trimmed = s.trim();
    let bare = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(bare).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(TypeError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}
