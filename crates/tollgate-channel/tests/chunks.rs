//! Chunk payment engine: monotonic accounting, signature discipline,
//! idempotency, capacity and concurrency.

mod common;

use std::sync::Arc;

use common::{activate_channel, harness, sign_state};

use tollgate_core::chunk::ChunkPayment;
use tollgate_core::error::TollgateError;
use tollgate_core::types::new_id;
use tollgate_crypto::Keypair;

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn five_chunks_paid_in_order() {
    let h = harness();
    let channel_id = activate_channel(&h, 10_000, 3_600).await;
    let mut rx = h.events.subscribe("session-1");

    for i in 1..=5u64 {
        let event = h
            .engine
            .create_chunk(h.user_id, "session-1", 10)
            .await
            .unwrap();
        assert!(!event.is_paid);
        assert_eq!(event.cumulative_payment, i * 1_000);
        assert_eq!(event.remaining_balance, 10_000 - i * 1_000);
        assert_eq!(event.channel_total_amount, 10_000);

        let sig = sign_state(
            &h.buyer,
            &channel_id,
            event.cumulative_payment,
            event.remaining_balance,
        );
        let paid = h.engine.pay(&event.chunk_id, &sig).await.unwrap();
        assert_eq!(paid.consumed_tokens, i * 10);
    }

    let channel = h.store.get_channel(&channel_id).unwrap().unwrap();
    assert_eq!(channel.consumed_tokens, 50);

    // Paid chunks enumerate with strictly increasing cumulative values whose
    // steps equal tokens × ratio.
    let chunks = h.store.chunks_for_channel(&channel_id).unwrap();
    let mut prior = 0u64;
    for chunk in &chunks {
        assert!(chunk.is_paid);
        assert_eq!(chunk.cumulative_payment, prior + chunk.tokens_count * 100);
        prior = chunk.cumulative_payment;
    }
    // Sum of paid tokens equals consumed_tokens.
    let total: u64 = chunks.iter().map(|c| c.tokens_count).sum();
    assert_eq!(total, channel.consumed_tokens);

    // The stream saw one unpaid and one paid event per chunk.
    let mut unpaid_events = 0;
    let mut paid_events = 0;
    while let Ok(event) = rx.try_recv() {
        if event.is_paid {
            paid_events += 1;
        } else {
            unpaid_events += 1;
        }
    }
    assert_eq!(unpaid_events, 5);
    assert_eq!(paid_events, 5);
}

// ── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_requires_active_default_and_positive_tokens() {
    let h = harness();
    assert!(matches!(
        h.engine.create_chunk(h.user_id, "s", 10).await,
        Err(TollgateError::NoDefaultChannel(_))
    ));

    activate_channel(&h, 10_000, 3_600).await;
    assert!(matches!(
        h.engine.create_chunk(h.user_id, "s", 0).await,
        Err(TollgateError::ZeroTokens)
    ));
}

#[tokio::test]
async fn capacity_is_enforced_including_pending_chunks() {
    let h = harness();
    activate_channel(&h, 1_000, 3_600).await; // capacity: 10 tokens

    h.engine.create_chunk(h.user_id, "s", 6).await.unwrap(); // unpaid, reserves 6
    assert!(matches!(
        h.engine.create_chunk(h.user_id, "s", 5).await,
        Err(TollgateError::CapacityExceeded {
            requested: 5,
            available: 4
        })
    ));
    // Exactly filling the channel is fine.
    h.engine.create_chunk(h.user_id, "s", 4).await.unwrap();
}

#[tokio::test]
async fn invalid_signature_leaves_chunk_unpaid() {
    let h = harness();
    let channel_id = activate_channel(&h, 10_000, 3_600).await;
    let event = h.engine.create_chunk(h.user_id, "s", 10).await.unwrap();

    // Signed by the wrong key.
    let stranger = Keypair::generate();
    let bad_sig = sign_state(
        &stranger,
        &channel_id,
        event.cumulative_payment,
        event.remaining_balance,
    );
    assert!(matches!(
        h.engine.pay(&event.chunk_id, &bad_sig).await,
        Err(TollgateError::PubkeyHashMismatch)
    ));

    // Signed over the wrong state.
    let wrong_state = sign_state(&h.buyer, &channel_id, 1, 2);
    assert!(h.engine.pay(&event.chunk_id, &wrong_state).await.is_err());

    // Malformed bytes never reach recovery.
    assert!(matches!(
        h.engine.pay(&event.chunk_id, &[0u8; 64]).await,
        Err(TollgateError::MalformedSignature(64))
    ));

    // The chunk is still unpaid and the channel unchanged.
    let chunk = h.store.get_chunk(&event.chunk_id).unwrap().unwrap();
    assert!(!chunk.is_paid);
    let channel = h.store.get_channel(&channel_id).unwrap().unwrap();
    assert_eq!(channel.consumed_tokens, 0);
}

// ── Idempotency ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn pay_is_idempotent_on_identical_signature() {
    let h = harness();
    let channel_id = activate_channel(&h, 10_000, 3_600).await;
    let event = h.engine.create_chunk(h.user_id, "s", 10).await.unwrap();
    let sig = sign_state(
        &h.buyer,
        &channel_id,
        event.cumulative_payment,
        event.remaining_balance,
    );

    let first = h.engine.pay(&event.chunk_id, &sig).await.unwrap();
    let second = h.engine.pay(&event.chunk_id, &sig).await.unwrap();
    assert_eq!(first.cumulative_payment, second.cumulative_payment);
    assert_eq!(first.consumed_tokens, second.consumed_tokens);

    // consumed_tokens advanced exactly once.
    let channel = h.store.get_channel(&channel_id).unwrap().unwrap();
    assert_eq!(channel.consumed_tokens, 10);

    // A different signature on a paid chunk is a conflict.
    let mut tampered = sig.clone();
    tampered[0] ^= 0x01;
    assert!(matches!(
        h.engine.pay(&event.chunk_id, &tampered).await,
        Err(TollgateError::PaidSignatureMismatch(_))
    ));
}

// ── Replay / monotonicity ────────────────────────────────────────────────────

#[tokio::test]
async fn replayed_lower_state_is_rejected() {
    let h = harness();
    let channel_id = activate_channel(&h, 10_000, 3_600).await;

    // Pay a chunk taking the watermark to 2_000.
    let event = h.engine.create_chunk(h.user_id, "s", 20).await.unwrap();
    let sig = sign_state(&h.buyer, &channel_id, 2_000, 8_000);
    h.engine.pay(&event.chunk_id, &sig).await.unwrap();

    // A stale record with a lower cumulative (as a malicious client would
    // replay) fails the monotonicity check even with a valid signature.
    let stale = h
        .store
        .create_chunk(ChunkPayment {
            id: 0,
            chunk_id: new_id(),
            user_id: h.user_id,
            session_id: "s".into(),
            channel_id: channel_id.clone(),
            tokens_count: 10,
            is_paid: false,
            cumulative_payment: 1_000,
            remaining_balance: 9_000,
            transaction_data: None,
            buyer_signature: None,
            created_at: 50,
            paid_at: None,
        })
        .unwrap();
    let stale_sig = sign_state(&h.buyer, &channel_id, 1_000, 9_000);
    assert!(matches!(
        h.engine.pay(&stale.chunk_id, &stale_sig).await,
        Err(TollgateError::NonMonotonicCumulative {
            prior: 2_000,
            got: 1_000
        })
    ));

    // Channel state is unchanged.
    let channel = h.store.get_channel(&channel_id).unwrap().unwrap();
    assert_eq!(channel.consumed_tokens, 20);
}

// ── Chaining & concurrency ───────────────────────────────────────────────────

#[tokio::test]
async fn unpaid_chunks_chain_contiguously() {
    let h = harness();
    let channel_id = activate_channel(&h, 10_000, 3_600).await;

    let a = h.engine.create_chunk(h.user_id, "s", 10).await.unwrap();
    let b = h.engine.create_chunk(h.user_id, "s", 15).await.unwrap();
    assert_eq!(a.cumulative_payment, 1_000);
    assert_eq!(b.cumulative_payment, 2_500);

    // Both pay fine, in order.
    let sig_a = sign_state(&h.buyer, &channel_id, 1_000, 9_000);
    let sig_b = sign_state(&h.buyer, &channel_id, 2_500, 7_500);
    h.engine.pay(&a.chunk_id, &sig_a).await.unwrap();
    let paid = h.engine.pay(&b.chunk_id, &sig_b).await.unwrap();
    assert_eq!(paid.consumed_tokens, 25);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creation_yields_contiguous_cumulatives() {
    let h = harness();
    let channel_id = activate_channel(&h, 10_000, 3_600).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = Arc::clone(&h.engine);
        let user_id = h.user_id;
        handles.push(tokio::spawn(async move {
            engine.create_chunk(user_id, "s", 10).await.unwrap()
        }));
    }
    let mut cumulatives: Vec<u64> = Vec::new();
    for handle in handles {
        cumulatives.push(handle.await.unwrap().cumulative_payment);
    }
    cumulatives.sort_unstable();
    assert_eq!(cumulatives, vec![1_000, 2_000]);

    let chunks = h.store.chunks_for_channel(&channel_id).unwrap();
    assert_eq!(chunks.len(), 2);
}

// ── Queries ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn latest_and_session_unpaid() {
    let h = harness();
    let channel_id = activate_channel(&h, 10_000, 3_600).await;
    assert!(h.engine.latest(&channel_id).unwrap().is_none());

    let a = h.engine.create_chunk(h.user_id, "s1", 10).await.unwrap();
    let b = h.engine.create_chunk(h.user_id, "s2", 20).await.unwrap();

    let latest = h.engine.latest(&channel_id).unwrap().unwrap();
    assert_eq!(latest.chunk_id, b.chunk_id);

    let summary = h.engine.session_unpaid(h.user_id).unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.tokens, 30);

    let sig = sign_state(&h.buyer, &channel_id, 1_000, 9_000);
    h.engine.pay(&a.chunk_id, &sig).await.unwrap();
    let summary = h.engine.session_unpaid(h.user_id).unwrap();
    assert_eq!(summary.count, 1);
    assert_eq!(summary.tokens, 20);
}
