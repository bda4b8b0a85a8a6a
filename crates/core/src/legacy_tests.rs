// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::identifier::{ByteKey, RecordType};
use serde_json::json;

#[derive(Deserialize)]
struct Wrapper {
    #[serde(deserialize_with = "deserialize_identifier_map")]
    map: BTreeMap<String, StorageIdentifier>,
}

fn contact_id(byte: u8) -> StorageIdentifier {
    StorageIdentifier::new(ByteKey::new(vec![byte; 16]), RecordType::Contact)
}

#[test]
fn plain_layout_decodes() {
    let value = json!({ "map": { "r-1": contact_id(1), "r-2": contact_id(2) } });
    let wrapper: Wrapper = serde_json::from_value(value).unwrap();
    assert_eq!(wrapper.map.len(), 2);
    assert_eq!(wrapper.map["r-1"], contact_id(1));
}

#[test]
fn bidirectional_layout_decodes_to_forward_half() {
    let value = json!({
        "map": {
            "forwardDictionary": { "r-1": contact_id(1), "r-2": contact_id(2) },
            "backwardDictionary": [
                [contact_id(1), "r-1"],
                [contact_id(2), "r-2"]
            ]
        }
    });
    let wrapper: Wrapper = serde_json::from_value(value).unwrap();
    assert_eq!(wrapper.map.len(), 2);
    assert_eq!(wrapper.map["r-2"], contact_id(2));
}

#[test]
fn both_layouts_produce_same_mapping() {
    let plain: Wrapper =
        serde_json::from_value(json!({ "map": { "r-1": contact_id(1) } })).unwrap();
    let legacy: Wrapper = serde_json::from_value(json!({
        "map": { "forwardDictionary": { "r-1": contact_id(1) }, "backwardDictionary": {} }
    }))
    .unwrap();
    assert_eq!(plain.map, legacy.map);
}

#[test]
fn byte_keyed_maps_decode() {
    #[derive(Deserialize)]
    struct Keyed {
        #[serde(deserialize_with = "deserialize_identifier_map")]
        map: BTreeMap<ByteKey, StorageIdentifier>,
    }
    let value = json!({ "map": { "forwardDictionary": { "0a0b": contact_id(3) } } });
    let keyed: Keyed = serde_json::from_value(value).unwrap();
    assert_eq!(keyed.map[&ByteKey::new(vec![0x0a, 0x0b])], contact_id(3));
}

#[test]
fn malformed_map_is_an_error() {
    let value = json!({ "map": { "r-1": 12 } });
    assert!(serde_json::from_value::<Wrapper>(value).is_err());
}
