/// Repeating-key XOR over `buf`. Applying it twice with the same key returns
/// the original bytes.
///
/// An empty key leaves the input unchanged.
pub fn xor(buf: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return buf.to_vec();
    }

    buf.iter()
        .zip(key.iter().cycle())
        .map(|(byte, k)| byte ^ k)
        .collect()
}
