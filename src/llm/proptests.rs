//! Property-based tests for Responses API normalization
//!
//! - Function calls survive normalization with name, id, and arguments intact
//! - Output order is preserved across message and function call items
//! - Reasoning items never reach the normalized output

use super::openai::{normalize, ResponsesApiResponse};
use super::OutputItem;
use proptest::prelude::*;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
enum RawItem {
    Text(Vec<String>),
    Call {
        call_id: String,
        name: String,
        arguments: String,
    },
    Reasoning,
}

fn arb_arguments() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("{}".to_string()),
        ("[a-z-]{1,20}").prop_map(|id| json!({"category_id": id}).to_string()),
        (0i64..50).prop_map(|n| json!({"limit": n}).to_string()),
        // Malformed arguments must pass through untouched
        "[a-z{ ]{0,10}",
    ]
}

fn arb_item() -> impl Strategy<Value = RawItem> {
    prop_oneof![
        proptest::collection::vec("[a-zA-Z0-9 .,!?]{0,40}", 0..4).prop_map(RawItem::Text),
        ("call_[a-z0-9]{4,12}", "[a-z_]{3,20}", arb_arguments()).prop_map(
            |(call_id, name, arguments)| RawItem::Call {
                call_id,
                name,
                arguments,
            }
        ),
        Just(RawItem::Reasoning),
    ]
}

fn to_wire(item: &RawItem) -> Value {
    match item {
        RawItem::Text(fragments) => json!({
            "type": "message",
            "role": "assistant",
            "content": fragments
                .iter()
                .map(|t| json!({"type": "output_text", "text": t}))
                .collect::<Vec<_>>(),
        }),
        RawItem::Call {
            call_id,
            name,
            arguments,
        } => json!({
            "type": "function_call",
            "call_id": call_id,
            "name": name,
            "arguments": arguments,
        }),
        RawItem::Reasoning => json!({"type": "reasoning", "summary": []}),
    }
}

proptest! {
    #[test]
    fn normalization_preserves_order_and_content(items in proptest::collection::vec(arb_item(), 0..8)) {
        let body = json!({
            "status": "completed",
            "output": items.iter().map(to_wire).collect::<Vec<_>>(),
        });
        let resp: ResponsesApiResponse = serde_json::from_value(body).unwrap();
        let normalized = normalize(resp);

        let expected: Vec<OutputItem> = items
            .iter()
            .filter_map(|item| match item {
                RawItem::Text(fragments) => Some(OutputItem::Message { content: fragments.clone() }),
                RawItem::Call { call_id, name, arguments } => {
                    Some(OutputItem::function_call(call_id.clone(), name.clone(), arguments.clone()))
                }
                RawItem::Reasoning => None,
            })
            .collect();

        prop_assert_eq!(normalized.output, expected);
    }

    #[test]
    fn text_is_concatenation_of_fragments(fragments in proptest::collection::vec("[a-z ]{0,10}", 0..6)) {
        let body = json!({"output": [to_wire(&RawItem::Text(fragments.clone()))]});
        let resp: ResponsesApiResponse = serde_json::from_value(body).unwrap();
        prop_assert_eq!(normalize(resp).text(), fragments.concat());
    }
}
