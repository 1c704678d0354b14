/// Check if a 16-bit codepoint is a GREASE value (RFC 8701).
///
/// GREASE codepoints repeat the same byte twice and that byte ends in `0xA`:
/// 0x0A0A, 0x1A1A, ..., 0xFAFA. They show up in cipher suites, extension
/// types and supported_versions and carry no identifying information.
pub const fn is_grease(value: u16) -> bool {
    let [hi, lo] = value.to_be_bytes();
    hi == lo && lo & 0x0F == 0x0A
}

/// Copy `values`, dropping every GREASE codepoint and keeping wire order.
pub fn strip_grease(values: &[u16]) -> Vec<u16> {
    values.iter().copied().filter(|v| !is_grease(*v)).collect()
}
