//! Container format round-trips and malformed-input diagnostics (spec §4.1, §8).

use soil_vm::binary::{parse, Labels, ParseError, SoilBinary, MAGIC};

fn minimal(byte_code: Vec<u8>) -> SoilBinary {
    SoilBinary { name: None, description: None, initial_memory: None, labels: Labels::new(), byte_code }
}

#[test]
fn a_fully_populated_binary_survives_a_round_trip() {
    let mut binary = minimal(vec![0xf4, 0x00, 0xe0]);
    binary.name = Some("pong".to_string());
    binary.description = Some("a little demo".to_string());
    binary.initial_memory = Some((0..64).collect());
    binary.labels.insert(0, "main".to_string());
    binary.labels.insert(2, "panic_site".to_string());

    let bytes = binary.to_bytes();
    assert_eq!(parse(&bytes).unwrap(), binary);
}

#[test]
fn missing_magic_is_rejected() {
    assert_eq!(parse(b"notasoilfile"), Err(ParseError::MissingMagic));
    assert_eq!(parse(b""), Err(ParseError::MissingMagic));
}

#[test]
fn a_binary_with_no_byte_code_section_is_rejected() {
    let mut bytes = MAGIC.to_vec();
    bytes.push(2); // name section
    bytes.extend_from_slice(&3u64.to_le_bytes());
    bytes.extend_from_slice(b"abc");
    assert_eq!(parse(&bytes), Err(ParseError::MissingByteCode));
}

#[quickcheck_macros::quickcheck]
fn reordering_optional_sections_does_not_change_the_parsed_value(seed: u8) -> bool {
    // Exercise both legal orderings the re-emitter never produces itself:
    // name before byte-code, and byte-code after labels.
    let mut binary = minimal(vec![0x00, seed]);
    binary.name = Some(format!("program-{seed}"));
    binary.labels.insert(0, "start".to_string());

    let mut reordered = MAGIC.to_vec();
    let name = binary.name.as_ref().unwrap();
    reordered.push(2);
    reordered.extend_from_slice(&(name.len() as u64).to_le_bytes());
    reordered.extend_from_slice(name.as_bytes());

    let mut label_content = Vec::new();
    label_content.extend_from_slice(&1u64.to_le_bytes());
    label_content.extend_from_slice(&0u64.to_le_bytes());
    label_content.extend_from_slice(&5u64.to_le_bytes());
    label_content.extend_from_slice(b"start");
    reordered.push(3);
    reordered.extend_from_slice(&(label_content.len() as u64).to_le_bytes());
    reordered.extend_from_slice(&label_content);

    reordered.push(0);
    reordered.extend_from_slice(&(binary.byte_code.len() as u64).to_le_bytes());
    reordered.extend_from_slice(&binary.byte_code);

    parse(&reordered) == Ok(binary)
}
