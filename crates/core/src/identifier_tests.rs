// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::collections::BTreeMap;
use yare::parameterized;

#[parameterized(
    contact = { 1, RecordType::Contact },
    group_v1 = { 2, RecordType::GroupV1 },
    group_v2 = { 3, RecordType::GroupV2 },
    account = { 4, RecordType::Account },
    distribution_list = { 5, RecordType::StoryDistributionList },
    call_link = { 7, RecordType::CallLink },
    unknown_six = { 6, RecordType::Other(6) },
    unknown_large = { 99, RecordType::Other(99) },
)]
fn record_type_wire_values(value: u32, expected: RecordType) {
    assert_eq!(RecordType::from(value), expected);
    assert_eq!(expected.as_u32(), value);
}

#[parameterized(
    contact = { "contact", RecordType::Contact },
    upper = { "ACCOUNT", RecordType::Account },
    call_link = { "call-link", RecordType::CallLink },
    numeric = { "42", RecordType::Other(42) },
)]
fn record_type_from_str(input: &str, expected: RecordType) {
    assert_eq!(input.parse::<RecordType>().unwrap(), expected);
}

#[test]
fn record_type_from_str_rejects_garbage() {
    let err = "banana".parse::<RecordType>().unwrap_err();
    assert!(matches!(err, Error::InvalidRecordType(_)));
}

#[test]
fn record_type_works_as_json_map_key() {
    let mut map = BTreeMap::new();
    map.insert(RecordType::Other(9), vec![1u8]);
    map.insert(RecordType::Contact, vec![2u8]);

    let json = serde_json::to_string(&map).unwrap();
    assert_eq!(json, r#"{"1":[2],"9":[1]}"#);

    let parsed: BTreeMap<RecordType, Vec<u8>> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, map);
}

#[test]
fn byte_key_serializes_as_hex() {
    let key = ByteKey::new(vec![0xde, 0xad, 0xbe, 0xef]);
    let json = serde_json::to_string(&key).unwrap();
    assert_eq!(json, "\"deadbeef\"");
    let parsed: ByteKey = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, key);
}

#[test]
fn byte_key_rejects_bad_hex() {
    assert!(serde_json::from_str::<ByteKey>("\"xyz\"").is_err());
    assert!(matches!(
        ByteKey::from_hex("0g").unwrap_err(),
        Error::InvalidKey(_)
    ));
}

#[test]
fn byte_key_random_has_requested_length() {
    assert_eq!(ByteKey::random(32).len(), 32);
    assert_ne!(ByteKey::random(16), ByteKey::random(16));
}

#[test]
fn generated_identifiers_are_unique_for_same_payload() {
    let a = StorageIdentifier::generate(RecordType::Contact, b"payload");
    let b = StorageIdentifier::generate(RecordType::Contact, b"payload");
    assert_eq!(a.key.len(), STORAGE_KEY_LEN);
    assert_eq!(a.record_type, RecordType::Contact);
    assert_ne!(a, b);
}

#[test]
fn identifier_equality_includes_type() {
    let key = ByteKey::new(vec![1; 16]);
    let contact = StorageIdentifier::new(key.clone(), RecordType::Contact);
    let account = StorageIdentifier::new(key, RecordType::Account);
    assert_ne!(contact, account);
}

#[test]
fn identifier_json_shape() {
    let id = StorageIdentifier::new(ByteKey::new(vec![0xab]), RecordType::GroupV2);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, r#"{"key":"ab","type":3}"#);
}
