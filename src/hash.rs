/// Hashes a field name for the binary field table: `h = h * 3 + byte`, wrapping.
pub const fn calchash(text: &str) -> u32 {
    let bytes = text.as_bytes();
    let mut output = 0u32;
    let mut i = 0;
    while i < bytes.len() {
        output = output.wrapping_mul(3).wrapping_add(bytes[i] as u32);
        i += 1;
    }
    output
}
