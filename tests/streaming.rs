//! Streaming invocation behavior: chunking independence, residual flush,
//! localized decode failures, cancellation and deadlines.

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use modelport_core::error::InvokeError;
use modelport_core::invoke::client::{decode_event_stream, Deadline, WireDialect};
use modelport_core::invoke::{BackendAdapter, DeltaKind, EngineDialect, StreamEvent};

fn adapter() -> BackendAdapter {
    BackendAdapter::new(EngineDialect::Vllm, "test-model")
}

fn content_chunk(text: &str) -> String {
    format!(
        "{{\"choices\":[{{\"delta\":{{\"content\":{}}},\"finish_reason\":null}}]}}\n",
        serde_json::to_string(text).unwrap()
    )
}

fn finish_chunk() -> String {
    "{\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n".to_string()
}

async fn collect(
    chunks: Vec<Result<Bytes, InvokeError>>,
    dialect: WireDialect,
) -> Vec<Result<StreamEvent, InvokeError>> {
    decode_event_stream(
        tokio_stream::iter(chunks),
        adapter(),
        dialect,
        CancellationToken::new(),
        None,
    )
    .collect()
    .await
}

fn ok_chunks(raw: &[u8], sizes: impl Iterator<Item = usize>) -> Vec<Result<Bytes, InvokeError>> {
    let mut chunks = Vec::new();
    let mut rest = raw;
    for size in sizes {
        if rest.is_empty() {
            break;
        }
        let take = size.clamp(1, rest.len());
        chunks.push(Ok(Bytes::copy_from_slice(&rest[..take])));
        rest = &rest[take..];
    }
    if !rest.is_empty() {
        chunks.push(Ok(Bytes::copy_from_slice(rest)));
    }
    chunks
}

#[tokio::test]
async fn events_are_independent_of_chunk_boundaries() {
    let body = format!(
        "{}{}{}{}",
        content_chunk("Hello"),
        content_chunk(", "),
        content_chunk("world"),
        finish_chunk()
    );
    let raw = body.as_bytes();

    let whole = collect(ok_chunks(raw, std::iter::once(raw.len())), WireDialect::JsonLines).await;
    let texts: Vec<_> = whole
        .iter()
        .map(|r| r.as_ref().unwrap().delta.clone())
        .collect();
    assert_eq!(texts, vec!["Hello", ", ", "world", ""]);
    assert!(whole.last().unwrap().as_ref().unwrap().is_final);

    // Byte-at-a-time.
    let per_byte = collect(ok_chunks(raw, std::iter::repeat(1)), WireDialect::JsonLines).await;
    assert_eq!(
        per_byte
            .iter()
            .map(|r| r.as_ref().unwrap().clone())
            .collect::<Vec<_>>(),
        whole
            .iter()
            .map(|r| r.as_ref().unwrap().clone())
            .collect::<Vec<_>>()
    );

    // Deterministic pseudo-random splits.
    let mut seed = 0x2545F491u32;
    let sizes = std::iter::from_fn(move || {
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        Some((seed % 7 + 1) as usize)
    });
    let random = collect(ok_chunks(raw, sizes), WireDialect::JsonLines).await;
    assert_eq!(
        random
            .iter()
            .map(|r| r.as_ref().unwrap().clone())
            .collect::<Vec<_>>(),
        whole
            .iter()
            .map(|r| r.as_ref().unwrap().clone())
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn residual_record_is_flushed_at_end_of_stream() {
    // No trailing delimiter on the last record.
    let body = format!("{}{}", content_chunk("partial"),
        "{\"choices\":[{\"delta\":{\"content\":\" tail\"},\"finish_reason\":null}]}");
    let events = collect(
        ok_chunks(body.as_bytes(), std::iter::once(body.len())),
        WireDialect::JsonLines,
    )
    .await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].as_ref().unwrap().delta, " tail");
}

#[tokio::test]
async fn one_malformed_record_does_not_poison_the_stream() {
    let body = format!(
        "{}{}{}{}",
        content_chunk("a"),
        "{this is not json}\n",
        content_chunk("b"),
        finish_chunk()
    );
    let results = collect(
        ok_chunks(body.as_bytes(), std::iter::once(body.len())),
        WireDialect::JsonLines,
    )
    .await;

    let ok: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
    let errs: Vec<_> = results.iter().filter(|r| r.is_err()).collect();
    assert_eq!(ok.len(), 3); // "a", "b", final marker
    assert_eq!(errs.len(), 1);
    assert!(matches!(errs[0], Err(InvokeError::Decode { .. })));
    // The error is reported in stream position, not instead of later
    // records: "b" arrives after the failure.
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().delta, "b");
}

#[tokio::test]
async fn reasoning_channel_is_kept_separate() {
    let body = concat!(
        "{\"choices\":[{\"delta\":{\"reasoning_content\":\"thinking...\"},\"finish_reason\":null}]}\n",
        "{\"choices\":[{\"delta\":{\"content\":\"answer\"},\"finish_reason\":null}]}\n",
    );
    let events = collect(
        ok_chunks(body.as_bytes(), std::iter::once(body.len())),
        WireDialect::JsonLines,
    )
    .await;
    let events: Vec<_> = events.into_iter().map(Result::unwrap).collect();
    assert_eq!(events[0].kind, DeltaKind::Reasoning);
    assert_eq!(events[0].delta, "thinking...");
    assert_eq!(events[1].kind, DeltaKind::Content);
}

#[tokio::test]
async fn sse_framing_is_stripped_before_decode() {
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"},\"finish_reason\":null}]}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"},\"finish_reason\":null}]}\n",
        "\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
        "data: [DONE]\n",
    );
    let results = collect(
        ok_chunks(body.as_bytes(), std::iter::once(body.len())),
        WireDialect::EventStream,
    )
    .await;
    // Role announcement, blank separator and [DONE] are all dropped
    // silently; no decode error, no empty event for them.
    let events: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].delta, "hi");
    assert!(events[1].is_final);
}

#[tokio::test]
async fn keep_alive_records_are_skipped_not_emitted_empty() {
    let body = concat!("{}\n", "{\"choices\":[]}\n");
    let results = collect(
        ok_chunks(body.as_bytes(), std::iter::once(body.len())),
        WireDialect::JsonLines,
    )
    .await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn transport_error_terminates_the_stream() {
    let chunks: Vec<Result<Bytes, InvokeError>> = vec![
        Ok(Bytes::from(content_chunk("a"))),
        Err(InvokeError::Transport("connection reset".to_string())),
        Ok(Bytes::from(content_chunk("never seen"))),
    ];
    let results = collect(chunks, WireDialect::JsonLines).await;
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(InvokeError::Transport(_))));
}

#[tokio::test]
async fn cancellation_closes_the_stream_promptly() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    // An endless transport: without cancellation this would hang.
    let endless = tokio_stream::pending::<Result<Bytes, InvokeError>>();
    let events: Vec<_> = decode_event_stream(
        endless,
        adapter(),
        WireDialect::JsonLines,
        cancel,
        None,
    )
    .collect()
    .await;
    assert!(events.is_empty());
}

#[tokio::test(start_paused = true)]
async fn deadline_bounds_the_full_drain() {
    let endless = tokio_stream::pending::<Result<Bytes, InvokeError>>();
    let deadline = Deadline {
        at: tokio::time::Instant::now() + Duration::from_secs(5),
        budget: Duration::from_secs(5),
    };
    let results: Vec<_> = decode_event_stream(
        endless,
        adapter(),
        WireDialect::JsonLines,
        CancellationToken::new(),
        Some(deadline),
    )
    .collect()
    .await;
    assert_eq!(results.len(), 1);
    match results[0].as_ref().unwrap_err() {
        InvokeError::Timeout(budget) => assert_eq!(*budget, Duration::from_secs(5)),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn event_order_matches_record_order() {
    let texts: Vec<String> = (0..50).map(|i| format!("t{i}")).collect();
    let body: String = texts.iter().map(|t| content_chunk(t)).collect();
    let events = collect(
        ok_chunks(body.as_bytes(), std::iter::repeat(3)),
        WireDialect::JsonLines,
    )
    .await;
    let got: Vec<_> = events
        .into_iter()
        .map(|r| r.unwrap().delta)
        .collect();
    assert_eq!(got, texts);
}
