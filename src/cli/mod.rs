pub mod command;
pub mod dump;
pub mod info;

/// Bytes shown before a binary value is abbreviated.
const HEX_PREVIEW_LEN: usize = 32;

/// Lowercase hex of `bytes`, abbreviated with the total length when long.
pub fn hex_preview(bytes: &[u8]) -> String {
    let shown = &bytes[..bytes.len().min(HEX_PREVIEW_LEN)];
    let hex: String = shown.iter().map(|b| format!("{b:02x}")).collect();

    if shown.len() < bytes.len() {
        format!("{hex}... ({} bytes)", bytes.len())
    } else {
        hex
    }
}
