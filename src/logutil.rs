//! Logging helpers for raw serial traffic so log records stay single-line and readable.
//! Board output is mostly ASCII but line noise can inject anything.

/// Longest chunk rendered before truncating with an ellipsis.
const MAX_PREVIEW: usize = 120;

/// Render a raw byte chunk for logging:
/// - printable ASCII is kept as-is
/// - `\n`, `\r`, `\t` and backslash are escaped
/// - every other byte becomes `\xNN`
///
/// Chunks longer than the preview limit are cut and end with `…`.
pub fn escape_bytes(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().min(MAX_PREVIEW) + 8);
    for (count, &b) in data.iter().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7E => out.push(b as char),
            other => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", other);
            }
        }
    }
    out
}

/// Same as [`escape_bytes`] for text that is already a `str` (outbound lines).
pub fn escape_log(s: &str) -> String {
    escape_bytes(s.as_bytes())
}
