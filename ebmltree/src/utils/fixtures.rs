//! Byte builders for test documents.

/// Encodes `value` as a size VINT of exactly `width` octets.
pub fn encode_vint(value: u64, width: u8) -> Vec<u8> {
    let marked = value | (1u64 << (7 * width as u32));
    marked.to_be_bytes()[8 - width as usize..].to_vec()
}

/// Smallest width whose magnitude range holds `value` without hitting the
/// all-ones pattern.
fn size_width(value: u64) -> u8 {
    (1..=8u8)
        .find(|&w| value < (1u64 << (7 * w as u32)) - 1)
        .unwrap_or(8)
}

/// Raw id octets, marker bit included.
pub fn encode_id(id: u64) -> Vec<u8> {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
    bytes[skip..].to_vec()
}

pub fn element(id: u64, body: &[u8]) -> Vec<u8> {
    let mut out = encode_id(id);
    out.extend(encode_vint(body.len() as u64, size_width(body.len() as u64)));
    out.extend_from_slice(body);
    out
}

/// Element declaring `declared` bytes regardless of how much body follows.
pub fn element_with_size(id: u64, declared: u64, body: &[u8]) -> Vec<u8> {
    let mut out = encode_id(id);
    out.extend(encode_vint(declared, size_width(declared)));
    out.extend_from_slice(body);
    out
}

/// Element using the one-octet unknown-size marker.
pub fn element_unknown_size(id: u64, body: &[u8]) -> Vec<u8> {
    let mut out = encode_id(id);
    out.push(0xFF);
    out.extend_from_slice(body);
    out
}

pub fn uint_body(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    bytes[skip..].to_vec()
}

pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}
