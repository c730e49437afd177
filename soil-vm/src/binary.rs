//! The `.soil` container format: parser and re-emitter (spec §4.1, §6).
//!
//! Layout: magic `s o i l`, then sections until end-of-input. Each section
//! is `{type: u8, length: u64 little-endian, content: length bytes}`.

use std::collections::BTreeMap;

/// The four magic bytes every `.soil` file starts with.
pub const MAGIC: [u8; 4] = *b"soil";

const SECTION_BYTE_CODE: u8 = 0;
const SECTION_INITIAL_MEMORY: u8 = 1;
const SECTION_NAME: u8 = 2;
const SECTION_LABELS: u8 = 3;
const SECTION_DESCRIPTION: u8 = 4;

/// Byte-code offset to symbol name, built from a labels section.
pub type Labels = BTreeMap<u64, String>;

/// A parsed (or about-to-be-emitted) Soil program container (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoilBinary {
    /// Optional human-readable program name (section type 2).
    pub name: Option<String>,
    /// Optional human-readable description (section type 4).
    pub description: Option<String>,
    /// Optional prefix image copied into memory at VM construction.
    pub initial_memory: Option<Vec<u8>>,
    /// Byte-code offset to symbol name, for diagnostics only.
    pub labels: Labels,
    /// The mandatory executable byte-code.
    pub byte_code: Vec<u8>,
}

/// Why [`parse`] failed. Every variant carries the byte offset at which the
/// problem was found, so a producer can diagnose a round-trip failure
/// instead of staring at a bare "truncated".
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ParseError {
    /// The file doesn't start with `s`, `o`, `i`, `l`.
    #[display(fmt = "missing \"soil\" magic at offset 0")]
    MissingMagic,
    /// Fewer than 9 bytes remained for a section's type + length header.
    #[display(fmt = "truncated section header at offset {_0}")]
    TruncatedHeader(usize),
    /// The section declared a body longer than the remaining input.
    #[display(
        fmt = "truncated section body at offset {_0}: declared length {_1}, only {_2} bytes remain"
    )]
    TruncatedBody(usize, u64, usize),
    /// The section's type byte isn't one of the five recognized types.
    #[display(fmt = "unknown section type {_1} at offset {_0}")]
    UnknownSectionType(usize, u8),
    /// A second section of a type that may appear at most once.
    #[display(fmt = "duplicate section type {_1} at offset {_0}")]
    DuplicateSection(usize, u8),
    /// No byte-code section was present.
    #[display(fmt = "missing mandatory byte-code section")]
    MissingByteCode,
    /// A name or description section's content isn't valid UTF-8.
    #[display(fmt = "section at offset {_0} is not valid UTF-8")]
    InvalidUtf8(usize),
    /// The label table's `count` or an entry's fields ran past its section.
    #[display(fmt = "truncated label table at offset {_0}")]
    TruncatedLabelTable(usize),
    /// Two label entries named the same byte-code offset.
    #[display(fmt = "duplicate label for byte-code offset {_0} (label table at offset {_1})")]
    DuplicateLabel(u64, usize),
}

impl std::error::Error for ParseError {}

fn read_u64_le(bytes: &[u8], at: usize) -> Option<u64> {
    let slice = bytes.get(at..at + 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(slice);
    Some(u64::from_le_bytes(buf))
}

/// Parses a `.soil` container. See spec §4.1 for the section grammar.
pub fn parse(bytes: &[u8]) -> Result<SoilBinary, ParseError> {
    if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
        return Err(ParseError::MissingMagic);
    }

    let mut byte_code: Option<Vec<u8>> = None;
    let mut initial_memory: Option<Vec<u8>> = None;
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;
    let mut labels: Option<Labels> = None;

    let mut pos = MAGIC.len();
    while pos < bytes.len() {
        let section_type = *bytes.get(pos).ok_or(ParseError::TruncatedHeader(pos))?;
        let length = read_u64_le(bytes, pos + 1).ok_or(ParseError::TruncatedHeader(pos))?;
        let content_start = pos + 1 + 8;
        let content_end = content_start
            .checked_add(length as usize)
            .filter(|&end| end <= bytes.len())
            .ok_or(ParseError::TruncatedBody(
                pos,
                length,
                bytes.len().saturating_sub(content_start),
            ))?;
        let content = &bytes[content_start..content_end];

        match section_type {
            SECTION_BYTE_CODE => {
                if byte_code.is_some() {
                    return Err(ParseError::DuplicateSection(pos, section_type));
                }
                byte_code = Some(content.to_vec());
            }
            SECTION_INITIAL_MEMORY => {
                if initial_memory.is_some() {
                    return Err(ParseError::DuplicateSection(pos, section_type));
                }
                initial_memory = Some(content.to_vec());
            }
            SECTION_NAME => {
                if name.is_some() {
                    return Err(ParseError::DuplicateSection(pos, section_type));
                }
                name = Some(
                    String::from_utf8(content.to_vec())
                        .map_err(|_| ParseError::InvalidUtf8(content_start))?,
                );
            }
            SECTION_LABELS => {
                if labels.is_some() {
                    return Err(ParseError::DuplicateSection(pos, section_type));
                }
                labels = Some(parse_labels(content, content_start)?);
            }
            SECTION_DESCRIPTION => {
                if description.is_some() {
                    return Err(ParseError::DuplicateSection(pos, section_type));
                }
                description = Some(
                    String::from_utf8(content.to_vec())
                        .map_err(|_| ParseError::InvalidUtf8(content_start))?,
                );
            }
            other => return Err(ParseError::UnknownSectionType(pos, other)),
        }

        pos = content_end;
    }

    Ok(SoilBinary {
        name,
        description,
        initial_memory,
        labels: labels.unwrap_or_default(),
        byte_code: byte_code.ok_or(ParseError::MissingByteCode)?,
    })
}

fn parse_labels(content: &[u8], base_offset: usize) -> Result<Labels, ParseError> {
    let count = read_u64_le(content, 0).ok_or(ParseError::TruncatedLabelTable(base_offset))?;
    let mut labels = Labels::new();
    let mut pos = 8usize;

    for _ in 0..count {
        let offset =
            read_u64_le(content, pos).ok_or(ParseError::TruncatedLabelTable(base_offset + pos))?;
        let name_length = read_u64_le(content, pos + 8)
            .ok_or(ParseError::TruncatedLabelTable(base_offset + pos))?;
        let name_start = pos + 16;
        let name_end = name_start
            .checked_add(name_length as usize)
            .filter(|&end| end <= content.len())
            .ok_or(ParseError::TruncatedLabelTable(base_offset + name_start))?;
        let name = String::from_utf8(content[name_start..name_end].to_vec())
            .map_err(|_| ParseError::InvalidUtf8(base_offset + name_start))?;

        if labels.insert(offset, name).is_some() {
            return Err(ParseError::DuplicateLabel(offset, base_offset));
        }
        pos = name_end;
    }

    Ok(labels)
}

fn write_section(out: &mut Vec<u8>, section_type: u8, content: &[u8]) {
    out.push(section_type);
    out.extend_from_slice(&(content.len() as u64).to_le_bytes());
    out.extend_from_slice(content);
}

impl SoilBinary {
    /// Re-emits this container as bytes. Section order is fixed (byte-code,
    /// memory, name, labels, description); [`parse`] accepts any legal
    /// order, so `parse(&b.to_bytes()) == Ok(b)` holds regardless (spec §8's
    /// round-trip property).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);

        write_section(&mut out, SECTION_BYTE_CODE, &self.byte_code);

        if let Some(memory) = &self.initial_memory {
            write_section(&mut out, SECTION_INITIAL_MEMORY, memory);
        }
        if let Some(name) = &self.name {
            write_section(&mut out, SECTION_NAME, name.as_bytes());
        }
        if !self.labels.is_empty() {
            let mut content = Vec::new();
            content.extend_from_slice(&(self.labels.len() as u64).to_le_bytes());
            for (offset, name) in &self.labels {
                content.extend_from_slice(&offset.to_le_bytes());
                content.extend_from_slice(&(name.len() as u64).to_le_bytes());
                content.extend_from_slice(name.as_bytes());
            }
            write_section(&mut out, SECTION_LABELS, &content);
        }
        if let Some(description) = &self.description {
            write_section(&mut out, SECTION_DESCRIPTION, description.as_bytes());
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(byte_code: Vec<u8>) -> SoilBinary {
        SoilBinary {
            name: None,
            description: None,
            initial_memory: None,
            labels: Labels::new(),
            byte_code,
        }
    }

    #[test]
    fn round_trips_a_minimal_binary() {
        let binary = minimal(vec![0xf4, 0x00]);
        let bytes = binary.to_bytes();
        assert_eq!(parse(&bytes).unwrap(), binary);
    }

    #[test]
    fn round_trips_every_optional_section() {
        let mut binary = minimal(vec![0x00]);
        binary.name = Some("prog".to_string());
        binary.description = Some("a test program".to_string());
        binary.initial_memory = Some(vec![1, 2, 3, 4]);
        binary.labels.insert(0, "entry".to_string());
        binary.labels.insert(7, "loop_start".to_string());

        let bytes = binary.to_bytes();
        assert_eq!(parse(&bytes).unwrap(), binary);
    }

    #[test]
    fn rejects_missing_magic() {
        assert_eq!(parse(b"xoil"), Err(ParseError::MissingMagic));
        assert_eq!(parse(b"so"), Err(ParseError::MissingMagic));
    }

    #[test]
    fn rejects_missing_byte_code_section() {
        let mut bytes = MAGIC.to_vec();
        // A lone name section, no byte-code.
        write_section(&mut bytes, SECTION_NAME, b"x");
        assert_eq!(parse(&bytes), Err(ParseError::MissingByteCode));
    }

    #[test]
    fn rejects_duplicate_section() {
        let mut bytes = MAGIC.to_vec();
        write_section(&mut bytes, SECTION_BYTE_CODE, &[0x00]);
        let second_at = bytes.len();
        write_section(&mut bytes, SECTION_BYTE_CODE, &[0x00]);
        assert_eq!(
            parse(&bytes),
            Err(ParseError::DuplicateSection(second_at, SECTION_BYTE_CODE))
        );
    }

    #[test]
    fn rejects_unknown_section_type() {
        let mut bytes = MAGIC.to_vec();
        write_section(&mut bytes, SECTION_BYTE_CODE, &[0x00]);
        let bad_at = bytes.len();
        write_section(&mut bytes, 0xaa, &[]);
        assert_eq!(parse(&bytes), Err(ParseError::UnknownSectionType(bad_at, 0xaa)));
    }

    #[test]
    fn rejects_truncated_section_body() {
        let mut bytes = MAGIC.to_vec();
        bytes.push(SECTION_BYTE_CODE);
        bytes.extend_from_slice(&100u64.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3]);
        assert_eq!(parse(&bytes), Err(ParseError::TruncatedBody(MAGIC.len(), 100, 3)));
    }

    #[test]
    fn rejects_duplicate_label_offset() {
        let mut bytes = MAGIC.to_vec();
        write_section(&mut bytes, SECTION_BYTE_CODE, &[0x00]);
        let labels_at = bytes.len();
        let mut content = Vec::new();
        content.extend_from_slice(&2u64.to_le_bytes());
        content.extend_from_slice(&0u64.to_le_bytes());
        content.extend_from_slice(&1u64.to_le_bytes());
        content.push(b'a');
        content.extend_from_slice(&0u64.to_le_bytes());
        content.extend_from_slice(&1u64.to_le_bytes());
        content.push(b'b');
        write_section(&mut bytes, SECTION_LABELS, &content);
        assert_eq!(
            parse(&bytes),
            Err(ParseError::DuplicateLabel(0, labels_at + 1 + 8))
        );
    }

    #[quickcheck_macros::quickcheck]
    fn parsing_never_panics_on_arbitrary_bytes(bytes: Vec<u8>) -> bool {
        let _ = parse(&bytes);
        true
    }
}
