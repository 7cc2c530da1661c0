//! Property-based tests for frame decoding.
//!
//! Verifies that:
//! 1. Decoding never panics on arbitrary input
//! 2. Oversized input is rejected before parsing
//! 3. Session ids normalize the same way regardless of case or padding

use chatrelay_proto::{ClientFrame, ErrorCode, MessagePayload, SessionId};
use proptest::prelude::*;

fn session_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-fA-F0-9]{8}").expect("valid regex")
}

fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\u{0}]{0,200}").expect("valid regex")
}

proptest! {
    #[test]
    fn decode_never_panics(input in any::<String>()) {
        let _ = ClientFrame::decode(&input, 4096);
    }

    #[test]
    fn oversized_input_is_rejected(len in 33usize..512) {
        let raw = "a".repeat(len);
        let err = ClientFrame::decode(&raw, 32).unwrap_err();
        prop_assert_eq!(err.code(), ErrorCode::FrameTooLong);
    }

    #[test]
    fn session_id_normalization_is_case_insensitive(
        id in session_id_strategy(),
        left in "[ \t]{0,3}",
        right in "[ \t]{0,3}",
    ) {
        let padded = format!("{left}{id}{right}");
        let a = SessionId::parse(&padded).unwrap();
        let b = SessionId::parse(&id.to_lowercase()).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.as_str(), id.to_uppercase());
    }

    #[test]
    fn message_text_survives_decode(id in session_id_strategy(), text in text_strategy()) {
        let raw = serde_json::json!({
            "type": "message",
            "id": "m-1",
            "sessionId": id,
            "username": "alice",
            "text": text,
            "timestamp": "2024-01-01T00:00:00Z",
        })
        .to_string();

        let frame = ClientFrame::decode(&raw, usize::MAX).unwrap();
        let ClientFrame::Message(MessagePayload { text: decoded, .. }) = frame else {
            panic!("expected message frame");
        };
        prop_assert_eq!(decoded, text);
    }
}
