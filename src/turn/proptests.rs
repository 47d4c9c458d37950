//! Property-based tests for the conversation snapshot
//!
//! - Structured tool outputs survive serialization into a transcript item
//! - Snapshots survive a JSON round trip unchanged
//! - Resumption appends outputs in exactly the order results were supplied

use super::state::ConversationState;
use crate::llm::{Role, TranscriptItem};
use crate::tools::ClientToolResult;
use proptest::prelude::*;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        ".{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::btree_map("[a-zA-Z_]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

fn arb_object() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map("[a-zA-Z_]{1,8}", arb_json(), 0..5)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::System), Just(Role::User), Just(Role::Assistant)]
}

fn arb_item() -> impl Strategy<Value = TranscriptItem> {
    prop_oneof![
        (arb_role(), ".{0,40}").prop_map(|(role, content)| TranscriptItem::Message { role, content }),
        ("call_[a-z0-9]{1,8}", "[a-z_]{3,20}", ".{0,30}").prop_map(|(call_id, name, arguments)| {
            TranscriptItem::FunctionCall {
                call_id,
                name,
                arguments,
            }
        }),
        ("call_[a-z0-9]{1,8}", ".{0,30}")
            .prop_map(|(call_id, output)| TranscriptItem::FunctionCallOutput { call_id, output }),
    ]
}

fn client_names() -> BTreeSet<String> {
    ["save_pick", "navigate", "navigate_to_category"]
        .into_iter()
        .map(String::from)
        .collect()
}

proptest! {
    #[test]
    fn object_outputs_parse_back_to_the_same_value(call_id in "call_[a-z0-9]{1,8}", value in arb_object()) {
        let item = TranscriptItem::function_call_output_value(call_id.clone(), &value);
        let TranscriptItem::FunctionCallOutput { call_id: id, output } = item else {
            panic!("expected a function call output");
        };
        prop_assert_eq!(id, call_id);
        let parsed: Value = serde_json::from_str(&output).unwrap();
        prop_assert_eq!(parsed, value);
    }

    #[test]
    fn snapshot_json_round_trip(
        version in any::<u32>(),
        items in proptest::collection::vec(arb_item(), 0..10),
    ) {
        let state = ConversationState { version, items };
        let wire = serde_json::to_string(&state).unwrap();
        let back: ConversationState = serde_json::from_str(&wire).unwrap();
        prop_assert_eq!(back, state);
    }

    #[test]
    fn resume_appends_outputs_in_supplied_order(
        order in Just((0..6).collect::<Vec<usize>>()).prop_shuffle(),
        count in 1usize..=6,
    ) {
        let mut items = vec![TranscriptItem::message(Role::User, "pick for me")];
        items.extend((0..count).map(|i| TranscriptItem::FunctionCall {
            call_id: format!("c{i}"),
            name: "save_pick".to_string(),
            arguments: "{}".to_string(),
        }));
        let state = ConversationState::new(items);

        let supplied: Vec<usize> = order.into_iter().filter(|&i| i < count).collect();
        let results: Vec<ClientToolResult> = supplied
            .iter()
            .map(|i| ClientToolResult {
                call_id: format!("c{i}"),
                output: serde_json::json!({"success": true, "index": i}),
            })
            .collect();

        let resumed = state.resume(&results, &client_names()).unwrap();
        let appended: Vec<String> = resumed[1 + count..]
            .iter()
            .map(|item| match item {
                TranscriptItem::FunctionCallOutput { call_id, .. } => call_id.clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        let expected: Vec<String> = supplied.iter().map(|i| format!("c{i}")).collect();
        prop_assert_eq!(appended, expected);
    }
}
