//   Copyright 2018 Chorus One, Inc.
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
//   Unless required by applicable law or agreed to in writing, software
//   distributed under the License is distributed on an "AS IS" BASIS,
//   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//   See the License for the specific language governing permissions and
//   limitations under the License.

//! Unit tests for the DynamoDB provider's condition rendering and item codec.
//!
//! These exercise the pure translation from this crate's backend-agnostic [`Condition`]
//! and [`Item`] types into DynamoDB's expression and attribute-value syntax; none of them
//! require a live table or a mocked HTTP dispatcher.

use super::*;

fn names() -> AttributeNames {
    AttributeNames::with_partition_key("lockId")
}

#[test]
fn not_exists_condition_renders_attribute_not_exists() {
    let (expr, attr_names, attr_values) = render_condition(&Condition::NotExists, &names());
    assert_eq!(expr, "attribute_not_exists(#pk)");
    assert_eq!(attr_names.get("#pk"), Some(&"lockId".to_string()));
    assert_eq!(attr_names.len(), 1, "unused names would trip a DynamoDB ValidationException");
    assert!(attr_values.is_empty());
}

#[test]
fn guid_equals_condition_renders_single_placeholder() {
    let (expr, attr_names, attr_values) =
        render_condition(&Condition::GuidEquals("g1".to_string()), &names());
    assert!(expr.contains("attribute_exists(#pk)"));
    assert!(expr.contains("#guid = :guid0"));
    assert_eq!(attr_names.len(), 2, "#token is unused by this condition");
    assert!(!attr_names.contains_key("#token"));
    assert_eq!(attr_values.len(), 1);
    assert_eq!(
        attr_values.get(":guid0").and_then(|v| v.s.clone()),
        Some("g1".to_string())
    );
}

#[test]
fn guid_and_token_equals_renders_both_placeholders() {
    let (expr, attr_names, attr_values) =
        render_condition(&Condition::GuidAndTokenEquals("g1".to_string(), 7), &names());
    assert!(expr.contains("#guid = :guid0"));
    assert!(expr.contains("#token = :token1"));
    assert_eq!(attr_names.len(), 3);
    assert_eq!(attr_values.len(), 2);
    assert_eq!(
        attr_values.get(":token1").and_then(|v| v.n.clone()),
        Some("7".to_string())
    );
}

#[test]
fn or_condition_combines_both_branches() {
    let condition = Condition::Or(
        Box::new(Condition::NotExists),
        Box::new(Condition::GuidAndTokenEquals("g0".to_string(), 3)),
    );
    let (expr, attr_names, attr_values) = render_condition(&condition, &names());
    assert!(expr.contains("attribute_not_exists(#pk)"));
    assert!(expr.contains("OR"));
    assert_eq!(attr_names.len(), 3, "both branches' names are referenced by the combined expression");
    assert_eq!(attr_values.len(), 2);
}

#[test]
fn item_roundtrips_through_rusoto_attribute_values() {
    let mut item = Item::new();
    item.insert("lockId".to_string(), AttributeValue::S("A".to_string()));
    item.insert("fencingToken".to_string(), AttributeValue::N("9".to_string()));

    let rusoto_item = to_rusoto_item(item.clone());
    let roundtripped = from_rusoto_item(rusoto_item);

    assert_eq!(roundtripped, item);
}
