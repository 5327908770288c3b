//! Channel lifecycle: open, confirm funding, invalidate, default flag,
//! settlement and expiry transitions.

mod common;

use common::{activate_channel, harness, sign_state};

use tollgate_chain::{BlockchainClient, TxStatus};
use tollgate_codec::{tx_hash, ChannelWitness, Since};
use tollgate_core::channel::ChannelStatus;
use tollgate_core::error::TollgateError;
use tollgate_core::types::TxHash;
use tollgate_crypto::{refund_message, verify_pubkey_hash};
use tollgate_channel::SettleOutcome;

// ── open ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn open_persists_co_signed_refund_before_returning() {
    let h = harness();
    let offer = h.manager.open(h.user_id, 10_000, 3_600).await.unwrap();

    // The channel is durably stored, INACTIVE, with the seller signature.
    let stored = h.store.get_channel(&offer.channel_id).unwrap().unwrap();
    assert_eq!(stored.status, ChannelStatus::Inactive);
    assert_eq!(stored.seller_signature.len(), 65);
    assert!(stored.verified_at.is_none());
    assert!(!stored.is_default);

    // The persisted signature verifies over the refund bound to its since.
    let since = Since::from_raw(stored.refund_tx.inputs[0].since);
    assert!(since.is_relative_seconds());
    assert_eq!(since.metric(), 3_600);
    let msg = refund_message(tx_hash(&stored.refund_tx).as_bytes(), since.to_le_bytes());
    assert!(verify_pubkey_hash(&stored.seller_signature, &msg, &h.seller.pubkey_hash()).is_ok());

    // The refund returns the full amount to the buyer.
    assert_eq!(stored.refund_tx.outputs[0].value, 10_000);
    assert_eq!(
        stored.refund_tx.inputs[0].prev_tx_hash,
        tx_hash(&stored.funding_tx)
    );
}

#[tokio::test]
async fn open_validates_inputs() {
    let h = harness();
    assert!(matches!(
        h.manager.open(h.user_id, 0, 3_600).await,
        Err(TollgateError::ZeroAmount)
    ));
    assert!(matches!(
        h.manager.open(h.user_id, 10_000, 0).await,
        Err(TollgateError::ZeroDuration)
    ));
    assert!(matches!(
        h.manager.open(999, 10_000, 3_600).await,
        Err(TollgateError::UserNotFound(_))
    ));

    // A user without a registered key cannot open a channel.
    let keyless = h.store.create_user("keyless", None, 100).unwrap();
    assert!(matches!(
        h.manager.open(keyless.id, 10_000, 3_600).await,
        Err(TollgateError::InvalidPublicKey(_))
    ));
}

// ── confirm_funding ──────────────────────────────────────────────────────────

#[tokio::test]
async fn confirm_funding_activates_and_sets_first_default() {
    let h = harness();
    let offer = h.manager.open(h.user_id, 10_000, 3_600).await.unwrap();
    let funding_hash = h
        .chain
        .submit_transaction(&offer.funding_tx)
        .await
        .unwrap();

    let channel = h
        .manager
        .confirm_funding(&offer.channel_id, funding_hash)
        .await
        .unwrap();
    assert_eq!(channel.status, ChannelStatus::Active);
    assert_eq!(channel.tx_hash, Some(funding_hash));
    assert!(channel.verified_at.is_some());
    assert!(channel.is_default);

    // Retry with the same hash is idempotent.
    let again = h
        .manager
        .confirm_funding(&offer.channel_id, funding_hash)
        .await
        .unwrap();
    assert_eq!(again.status, ChannelStatus::Active);

    // Retry with a different hash is a conflict.
    assert!(matches!(
        h.manager
            .confirm_funding(&offer.channel_id, TxHash::from_bytes([9; 32]))
            .await,
        Err(TollgateError::FundingHashMismatch(_))
    ));
}

#[tokio::test]
async fn confirm_funding_waits_for_commitment() {
    let h = harness();
    let offer = h.manager.open(h.user_id, 10_000, 3_600).await.unwrap();
    let pending_hash = TxHash::from_bytes([5; 32]);
    h.chain.set_status(pending_hash, TxStatus::Pending);

    assert!(matches!(
        h.manager
            .confirm_funding(&offer.channel_id, pending_hash)
            .await,
        Err(TollgateError::BlockchainPending(_))
    ));
    // No speculative transition happened.
    let stored = h.store.get_channel(&offer.channel_id).unwrap().unwrap();
    assert_eq!(stored.status, ChannelStatus::Inactive);

    let rejected_hash = TxHash::from_bytes([6; 32]);
    h.chain
        .set_status(rejected_hash, TxStatus::Rejected("double spend".into()));
    assert!(matches!(
        h.manager
            .confirm_funding(&offer.channel_id, rejected_hash)
            .await,
        Err(TollgateError::BlockchainRejected(_))
    ));
    let stored = h.store.get_channel(&offer.channel_id).unwrap().unwrap();
    assert_eq!(stored.status, ChannelStatus::Inactive);
}

#[tokio::test]
async fn second_channel_does_not_steal_default() {
    let h = harness();
    let first = activate_channel(&h, 10_000, 3_600).await;
    let second = activate_channel(&h, 20_000, 3_600).await;

    let defaults: Vec<_> = h
        .store
        .channels_for_user(h.user_id)
        .unwrap()
        .into_iter()
        .filter(|c| c.is_default)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].channel_id, first);

    h.manager.set_default(h.user_id, &second).await.unwrap();
    let defaults: Vec<_> = h
        .store
        .channels_for_user(h.user_id)
        .unwrap()
        .into_iter()
        .filter(|c| c.is_default)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].channel_id, second);
}

// ── invalidate ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalidate_only_from_inactive() {
    let h = harness();
    let offer = h.manager.open(h.user_id, 10_000, 3_600).await.unwrap();

    let channel = h.manager.invalidate(&offer.channel_id).await.unwrap();
    assert_eq!(channel.status, ChannelStatus::Invalid);

    // Idempotent on INVALID.
    let again = h.manager.invalidate(&offer.channel_id).await.unwrap();
    assert_eq!(again.status, ChannelStatus::Invalid);

    // ACTIVE channels cannot be invalidated.
    let active = activate_channel(&h, 10_000, 3_600).await;
    assert!(matches!(
        h.manager.invalidate(&active).await,
        Err(TollgateError::InvalidTransition { .. })
    ));
}

// ── set_default ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn set_default_requires_active_owned_channel() {
    let h = harness();
    let offer = h.manager.open(h.user_id, 10_000, 3_600).await.unwrap();

    assert!(matches!(
        h.manager.set_default(h.user_id, &offer.channel_id).await,
        Err(TollgateError::DefaultNotActive(_))
    ));

    let bob_key = tollgate_crypto::Keypair::generate();
    let bob = h
        .store
        .create_user("bob", Some(&bob_key.public_key_hex()), 100)
        .unwrap();
    let active = activate_channel(&h, 10_000, 3_600).await;
    assert!(matches!(
        h.manager.set_default(bob.id, &active).await,
        Err(TollgateError::NotChannelOwner { .. })
    ));
}

// ── settle ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn settle_with_no_paid_chunks_is_a_no_op() {
    let h = harness();
    let channel_id = activate_channel(&h, 10_000, 3_600).await;

    assert_eq!(
        h.manager.settle(&channel_id).await.unwrap(),
        SettleOutcome::NothingToSettle
    );
    let stored = h.store.get_channel(&channel_id).unwrap().unwrap();
    assert_eq!(stored.status, ChannelStatus::Active);
    // Only the funding broadcast hit the chain.
    assert_eq!(h.chain.submitted().len(), 1);
}

#[tokio::test]
async fn settle_distributes_latest_paid_state() {
    let h = harness();
    let channel_id = activate_channel(&h, 10_000, 3_600).await;

    // Five paid chunks of 10 tokens: cumulative 5_000, remaining 5_000.
    for i in 1..=5u64 {
        let event = h
            .engine
            .create_chunk(h.user_id, "session-1", 10)
            .await
            .unwrap();
        assert_eq!(event.cumulative_payment, i * 1_000);
        let sig = sign_state(
            &h.buyer,
            &channel_id,
            event.cumulative_payment,
            event.remaining_balance,
        );
        h.engine.pay(&event.chunk_id, &sig).await.unwrap();
    }

    let outcome = h.manager.settle(&channel_id).await.unwrap();
    let SettleOutcome::Settled { settle_hash } = outcome else {
        panic!("expected settlement, got {outcome:?}");
    };

    let stored = h.store.get_channel(&channel_id).unwrap().unwrap();
    assert_eq!(stored.status, ChannelStatus::Settled);
    assert_eq!(stored.settle_hash, Some(settle_hash));
    assert_eq!(stored.consumed_tokens, 50);
    assert!(!stored.is_default);

    // Inspect the broadcast settlement: seller gets the cumulative, buyer
    // the remainder minus fee, witness is the 132-byte 2-of-2 form.
    let settlement = h.chain.submitted_txs().last().unwrap().clone();
    assert_eq!(settlement.outputs[0].value, 5_000);
    assert!(settlement.outputs[1].value < 5_000);
    assert!(settlement.outputs[1].value > 0);
    let witness = ChannelWitness::decode(&settlement.witnesses[0]).unwrap();
    assert_eq!(witness.buyer_index, 0);
    assert_eq!(witness.seller_index, 1);

    // Settling again is idempotent and does not re-broadcast.
    let calls = h.chain.submit_calls();
    assert_eq!(
        h.manager.settle(&channel_id).await.unwrap(),
        SettleOutcome::Settled { settle_hash }
    );
    assert_eq!(h.chain.submit_calls(), calls);
}

#[tokio::test]
async fn failed_broadcast_leaves_channel_active() {
    let h = harness();
    let channel_id = activate_channel(&h, 10_000, 3_600).await;
    let event = h
        .engine
        .create_chunk(h.user_id, "session-1", 10)
        .await
        .unwrap();
    let sig = sign_state(
        &h.buyer,
        &channel_id,
        event.cumulative_payment,
        event.remaining_balance,
    );
    h.engine.pay(&event.chunk_id, &sig).await.unwrap();

    h.chain
        .fail_submissions([tollgate_chain::mock::ScriptedFailure::Rejected(
            "low fee".into(),
        )]);
    assert!(matches!(
        h.manager.settle(&channel_id).await,
        Err(TollgateError::BlockchainRejected(_))
    ));
    let stored = h.store.get_channel(&channel_id).unwrap().unwrap();
    assert_eq!(stored.status, ChannelStatus::Active);
    assert_eq!(stored.settle_hash, None);
}

// ── expiry ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mark_expired_honours_the_deadline() {
    let h = harness();
    let channel_id = activate_channel(&h, 10_000, 60).await;
    let stored = h.store.get_channel(&channel_id).unwrap().unwrap();
    let deadline = stored.deadline().unwrap();

    // Too early: refused.
    assert!(matches!(
        h.manager.mark_expired(&channel_id, deadline - 1).await,
        Err(TollgateError::InvalidTransition { .. })
    ));

    let expired = h
        .manager
        .mark_expired(&channel_id, deadline + 1)
        .await
        .unwrap();
    assert_eq!(expired.status, ChannelStatus::Expired);
    assert!(!expired.is_default);

    // Idempotent.
    let again = h
        .manager
        .mark_expired(&channel_id, deadline + 2)
        .await
        .unwrap();
    assert_eq!(again.status, ChannelStatus::Expired);
}
