use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use tessera_collab::protocol::{
    ChatPayload, CursorUpdatePayload, Envelope, MessageType,
};
use tessera_collab::session::{ChatMessage, Cursor};
use uuid::Uuid;

fn bench_cursor_encode(c: &mut Criterion) {
    let payload = CursorUpdatePayload {
        user_id: Uuid::new_v4(),
        cursor: Cursor {
            file_id: "src/main.rs".into(),
            line: 120,
            column: 34,
            timestamp: 42,
        },
    };

    c.bench_function("cursor_update_encode", |b| {
        b.iter(|| {
            let env = Envelope::new(
                MessageType::CursorUpdate,
                serde_json::to_value(black_box(&payload)).unwrap(),
            );
            black_box(env.encode().unwrap());
        })
    });
}

fn bench_cursor_decode(c: &mut Criterion) {
    let env = Envelope::new(
        MessageType::CursorUpdate,
        json!({
            "user_id": Uuid::new_v4(),
            "cursor": { "file_id": "src/main.rs", "line": 120, "column": 34, "timestamp": 42 }
        }),
    );
    let raw = env.encode().unwrap();

    c.bench_function("cursor_update_decode", |b| {
        b.iter(|| {
            let env = Envelope::decode(black_box(&raw)).unwrap();
            black_box(env.payload_as::<CursorUpdatePayload>().unwrap());
        })
    });
}

fn bench_chat_roundtrip(c: &mut Criterion) {
    let payload = ChatPayload {
        message: ChatMessage {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content: "a typical short chat message".into(),
            timestamp: 1_756_500_000_000,
            reply_to: None,
            is_system: false,
        },
    };

    c.bench_function("chat_roundtrip", |b| {
        b.iter(|| {
            let env = Envelope::new(
                MessageType::ChatReceived,
                serde_json::to_value(&payload).unwrap(),
            );
            let raw = env.encode().unwrap();
            let back = Envelope::decode(&raw).unwrap();
            black_box(back.payload_as::<ChatPayload>().unwrap());
        })
    });
}

fn bench_unknown_type_decode(c: &mut Criterion) {
    let raw = r#"{"type":"not_in_this_build","payload":{"x":1},"timestamp":1756500000000}"#;

    c.bench_function("unknown_type_decode", |b| {
        b.iter(|| {
            black_box(Envelope::decode(black_box(raw)).unwrap());
        })
    });
}

criterion_group!(
    benches,
    bench_cursor_encode,
    bench_cursor_decode,
    bench_chat_roundtrip,
    bench_unknown_type_decode
);
criterion_main!(benches);
