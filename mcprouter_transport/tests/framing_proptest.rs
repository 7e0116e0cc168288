//! Property-based tests for the frame reader.
//!
//! However the input stream happens to chunk its bytes, the reader must yield
//! the same messages in the same order, and never a partial one.

use mcprouter_transport::{JsonRpcMessage, ReadBuffer};
use proptest::prelude::*;
use proptest::sample::Index;

// ─────────────────────────────────────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────────────────────────────────────

fn arb_id() -> impl Strategy<Value = String> {
    prop_oneof![
        (1i64..=100_000).prop_map(|n| n.to_string()),
        "[a-zA-Z0-9_-]{1,16}".prop_map(|s| format!("\"{s}\"")),
    ]
}

fn arb_method() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_/]{0,20}"
}

fn arb_line() -> impl Strategy<Value = String> {
    prop_oneof![
        (arb_id(), arb_method()).prop_map(|(id, method)| {
            format!(r#"{{"jsonrpc":"2.0","id":{id},"method":"{method}","params":{{"text":"a\nb"}}}}"#)
        }),
        arb_id().prop_map(|id| format!(r#"{{"jsonrpc":"2.0","id":{id},"result":{{"ok":true}}}}"#)),
        arb_method().prop_map(|method| format!(r#"{{"jsonrpc":"2.0","method":"{method}"}}"#)),
        arb_id().prop_map(|id| {
            format!(r#"{{"jsonrpc":"2.0","id":{id},"error":{{"code":-32000,"message":"boom"}}}}"#)
        }),
    ]
}

fn split_at_indices(bytes: &[u8], cuts: &[Index]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for point in points {
        chunks.push(bytes[start..point].to_vec());
        start = point;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

fn drain(reader: &mut ReadBuffer, out: &mut Vec<JsonRpcMessage>) {
    while let Some(message) = reader.read_message().unwrap() {
        out.push(message);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn chunk_boundaries_do_not_change_output(
        lines in proptest::collection::vec(arb_line(), 1..12),
        cuts in proptest::collection::vec(any::<Index>(), 0..16),
        crlf in any::<bool>(),
    ) {
        let delimiter = if crlf { "\r\n" } else { "\n" };
        let stream: String = lines.iter().map(|l| format!("{l}{delimiter}")).collect();
        let expected: Vec<JsonRpcMessage> = lines
            .iter()
            .map(|l| JsonRpcMessage::parse(l).unwrap())
            .collect();

        let mut reader = ReadBuffer::new();
        let mut actual = Vec::new();
        for chunk in split_at_indices(stream.as_bytes(), &cuts) {
            reader.append(&chunk);
            drain(&mut reader, &mut actual);
        }

        prop_assert_eq!(actual, expected);
        prop_assert!(reader.is_empty());
    }

    #[test]
    fn trailing_partial_line_stays_buffered(
        line in arb_line(),
        keep in 1usize..40,
    ) {
        let partial = &line.as_bytes()[..keep.min(line.len())];

        let mut reader = ReadBuffer::new();
        reader.append(partial);
        prop_assert!(reader.read_message().unwrap().is_none());
        prop_assert_eq!(reader.len(), partial.len());

        reader.append(&line.as_bytes()[partial.len()..]);
        reader.append(b"\n");
        let message = reader.read_message().unwrap();
        prop_assert_eq!(message, Some(JsonRpcMessage::parse(&line).unwrap()));
        prop_assert!(reader.read_message().unwrap().is_none());
    }
}
