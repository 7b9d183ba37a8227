//! Byte-preserving text decoding for descriptor files.
//!
//! Descriptors are scanned as text but must be written back byte for byte
//! outside the spliced ranges. UTF-16 is recognized by its byte order mark;
//! anything that is not valid UTF-8 is read as ISO-8859-1, which maps every
//! byte to one char and back without loss.

/// How a file's bytes were turned into text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

#[derive(Debug)]
pub(crate) struct Decoded {
    pub text: String,
    pub encoding: Encoding,
}

fn utf16_units(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Option<Vec<u16>> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    Some(bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]])).collect())
}

pub(crate) fn decode(bytes: &[u8]) -> Decoded {
    let utf16 = match bytes {
        [0xFF, 0xFE, ..] => Some((Encoding::Utf16Le, u16::from_le_bytes as fn([u8; 2]) -> u16)),
        [0xFE, 0xFF, ..] => Some((Encoding::Utf16Be, u16::from_be_bytes as fn([u8; 2]) -> u16)),
        _ => None,
    };
    if let Some((encoding, unit)) = utf16 {
        // The byte order mark stays in the text so it is written back.
        if let Some(text) = utf16_units(bytes, unit).and_then(|units| String::from_utf16(&units).ok()) {
            return Decoded { text, encoding };
        }
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => Decoded {
            text: text.to_string(),
            encoding: Encoding::Utf8,
        },
        Err(_) => Decoded {
            text: bytes.iter().copied().map(char::from).collect(),
            encoding: Encoding::Latin1,
        },
    }
}

pub(crate) fn encode(text: &str, encoding: Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Utf8 => text.as_bytes().to_vec(),
        Encoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
        Encoding::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        Encoding::Latin1 => {
            let mut out = Vec::with_capacity(text.len());
            for c in text.chars() {
                match u8::try_from(c) {
                    Ok(byte) => out.push(byte),
                    // Outside ISO-8859-1: emit a character reference instead.
                    Err(_) => out.extend_from_slice(format!("&#{};", u32::from(c)).as_bytes()),
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_is_kept() {
        let decoded = decode("<a>Grüße</a>".as_bytes());
        assert_eq!(decoded.encoding, Encoding::Utf8);
        assert_eq!(decoded.text, "<a>Grüße</a>");
    }

    #[test]
    fn invalid_utf8_roundtrips_as_latin1() {
        let bytes = b"<!-- Gr\xfc\xdfe --><a uri=\"x\"/>";
        let decoded = decode(bytes);
        assert_eq!(decoded.encoding, Encoding::Latin1);
        assert!(decoded.text.contains("Grüße"));
        assert_eq!(encode(&decoded.text, decoded.encoding), bytes);
    }

    #[test]
    fn utf16_is_detected_by_byte_order_mark() {
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend("<a uri=\"x\"/>".encode_utf16().flat_map(u16::to_le_bytes));

        let decoded = decode(&bytes);
        assert_eq!(decoded.encoding, Encoding::Utf16Le);
        assert_eq!(decoded.text, "\u{feff}<a uri=\"x\"/>");
        assert_eq!(encode(&decoded.text, decoded.encoding), bytes);
    }

    #[test]
    fn latin1_escapes_wider_chars() {
        assert_eq!(encode("a€b", Encoding::Latin1), b"a&#8364;b");
    }
}
