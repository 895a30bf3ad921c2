//! OpenPGP ASCII armor (RFC 4880, section 6).
//!
//! Binary messages are base64 encoded in 64-column lines, followed by a
//! CRC-24 checksum line and framed by `-----BEGIN/END <label>-----`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Label used for encrypted messages.
pub const MESSAGE_LABEL: &str = "PGP MESSAGE";

/// Characters of base64 per armor line.
const LINE_WIDTH: usize = 64;

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;

/// Errors from [`decode`].
#[derive(Debug, Error)]
pub enum ArmorError {
    #[error("missing armor header line")]
    MissingHeader,

    #[error("missing armor footer for {label}")]
    MissingFooter { label: String },

    #[error("invalid base64 in armor body: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("malformed armor checksum")]
    MalformedChecksum,

    #[error("armor checksum mismatch: expected {expected:06X}, computed {actual:06X}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

/// CRC-24 as used by OpenPGP armor.
pub fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for &byte in data {
        crc ^= u32::from(byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

fn checksum_line(data: &[u8]) -> String {
    let crc = crc24(data).to_be_bytes();
    format!("={}", STANDARD.encode(&crc[1..]))
}

/// Armor `data` under `label`.
pub fn encode(data: &[u8], label: &str) -> String {
    let body = STANDARD.encode(data);
    let mut out = String::with_capacity(body.len() + body.len() / LINE_WIDTH + 96);

    out.push_str("-----BEGIN ");
    out.push_str(label);
    out.push_str("-----\n\n");
    // base64 output is ASCII, so byte chunks are char boundaries
    for line in body.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(std::str::from_utf8(line).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(&checksum_line(data));
    out.push('\n');
    out.push_str("-----END ");
    out.push_str(label);
    out.push_str("-----\n");
    out
}

/// Parse armored text back into its label and binary payload.
///
/// Armor headers (`Key: value` lines before the first blank line) are
/// skipped. The checksum line is optional but verified when present.
pub fn decode(text: &str) -> Result<(String, Vec<u8>), ArmorError> {
    let mut lines = text.lines().map(str::trim_end);

    let label = lines
        .by_ref()
        .find_map(|line| {
            line.strip_prefix("-----BEGIN ")
                .and_then(|rest| rest.strip_suffix("-----"))
        })
        .ok_or(ArmorError::MissingHeader)?
        .to_owned();
    let footer = format!("-----END {label}-----");

    let mut section: Vec<&str> = Vec::new();
    let mut closed = false;
    for line in lines {
        if line == footer {
            closed = true;
            break;
        }
        section.push(line);
    }
    if !closed {
        return Err(ArmorError::MissingFooter { label });
    }

    // Headers end at the first blank line, if there are any.
    let body_start = match section.iter().position(|l| l.is_empty()) {
        Some(blank) if section[..blank].iter().all(|l| l.contains(": ")) => blank + 1,
        _ => 0,
    };

    let mut body = String::new();
    let mut checksum = None;
    for line in &section[body_start..] {
        if let Some(sum) = line.strip_prefix('=') {
            checksum = Some(sum);
        } else {
            body.push_str(line);
        }
    }

    let data = STANDARD.decode(body)?;
    if let Some(sum) = checksum {
        let bytes = STANDARD.decode(sum)?;
        let [a, b, c] = bytes[..] else {
            return Err(ArmorError::MalformedChecksum);
        };
        let expected = u32::from_be_bytes([0, a, b, c]);
        let actual = crc24(&data);
        if expected != actual {
            return Err(ArmorError::ChecksumMismatch { expected, actual });
        }
    }
    Ok((label, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc24_of_empty_input_is_init() {
        assert_eq!(crc24(b""), CRC24_INIT);
        assert_eq!(checksum_line(b""), "=twTO");
    }

    #[test]
    fn test_encode_layout() {
        let data = vec![0xA5_u8; 100];
        let armored = encode(&data, MESSAGE_LABEL);
        let lines: Vec<_> = armored.lines().collect();
        assert_eq!(lines[0], "-----BEGIN PGP MESSAGE-----");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2].len(), LINE_WIDTH);
        assert!(lines[lines.len() - 2].starts_with('='));
        assert_eq!(lines[lines.len() - 1], "-----END PGP MESSAGE-----");
        assert!(armored.ends_with('\n'));
    }

    #[test]
    fn test_decode_reverses_encode() {
        let data: Vec<u8> = (0..=255).collect();
        let (label, decoded) = decode(&encode(&data, MESSAGE_LABEL)).unwrap();
        assert_eq!(label, MESSAGE_LABEL);
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_decode_skips_headers() {
        let text = "-----BEGIN PGP MESSAGE-----\n\
                    Comment: Use \"gpg --dearmor\" for unpacking\n\
                    \n\
                    aGVsbG8=\n\
                    -----END PGP MESSAGE-----\n";
        let (_, data) = decode(text).unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let text = "-----BEGIN PGP MESSAGE-----\n\naGVsbG8=\n=AAAA\n-----END PGP MESSAGE-----\n";
        assert!(matches!(
            decode(&text),
            Err(ArmorError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_requires_footer() {
        let text = "-----BEGIN PGP MESSAGE-----\n\naGVsbG8=\n";
        assert!(matches!(decode(text), Err(ArmorError::MissingFooter { .. })));
    }
}
