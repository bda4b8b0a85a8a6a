// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use serde_json::json;

#[test]
fn contact_preserves_unknown_members() {
    let bytes = br#"{"aci":"aci-1","givenName":"Ada","futureFlag":true,"nickname":{"given":"A"}}"#;
    let record = Record::decode(RecordType::Contact, bytes).unwrap();

    let Record::Contact(contact) = &record else {
        panic!("expected contact, got {record:?}");
    };
    assert_eq!(contact.aci.as_deref(), Some("aci-1"));
    assert_eq!(contact.given_name.as_deref(), Some("Ada"));
    assert_eq!(contact.unknown.len(), 2);
    assert_eq!(contact.unknown.0["futureFlag"], json!(true));

    let reencoded: Value = serde_json::from_slice(&record.encode().unwrap()).unwrap();
    assert_eq!(reencoded["futureFlag"], json!(true));
    assert_eq!(reencoded["nickname"], json!({"given": "A"}));
}

#[test]
fn known_fields_overwrite_alongside_unknown() {
    let bytes = br#"{"aci":"aci-1","blocked":false,"futureFlag":1}"#;
    let Record::Contact(mut contact) = Record::decode(RecordType::Contact, bytes).unwrap() else {
        panic!("expected contact");
    };
    contact.blocked = true;

    let value: Value = serde_json::to_value(&contact).unwrap();
    assert_eq!(value["blocked"], json!(true));
    assert_eq!(value["futureFlag"], json!(1));
}

#[test]
fn unknown_fields_none_when_fully_parsed() {
    let record = Record::Account(AccountRecord {
        given_name: Some("Ada".into()),
        ..Default::default()
    });
    assert!(record.unknown_fields().is_none());
}

#[test]
fn other_type_kept_as_raw_bytes() {
    let record = Record::decode(RecordType::Other(6), b"\x00\x01opaque").unwrap();
    assert_eq!(record.record_type(), RecordType::Other(6));
    assert_eq!(record.encode().unwrap(), b"\x00\x01opaque".to_vec());
    assert!(record.unknown_fields().is_none());
}

#[test]
fn decode_rejects_malformed_json() {
    assert!(Record::decode(RecordType::GroupV2, b"{not json").is_err());
    assert!(Record::decode(RecordType::CallLink, br#"{"rootKey":"zz"}"#).is_err());
}

#[test]
fn missing_members_take_defaults() {
    let Record::GroupV2(group) = Record::decode(RecordType::GroupV2, b"{}").unwrap() else {
        panic!("expected group");
    };
    assert!(group.master_key.is_empty());
    assert!(!group.archived);
}

#[test]
fn generate_assigns_identifier_of_record_type() {
    let item = StorageItem::generate(Record::GroupV1(GroupV1Record {
        id: ByteKey::new(vec![7; 16]),
        ..Default::default()
    }))
    .unwrap();
    assert_eq!(item.identifier.record_type, RecordType::GroupV1);
}
