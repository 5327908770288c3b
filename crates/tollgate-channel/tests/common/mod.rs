//! Shared harness: scratch store, mock chain, one registered buyer.

use std::sync::Arc;

use tollgate_chain::{BlockchainClient, MockChain};
use tollgate_channel::{ChannelLocks, ChannelManager, ChannelPolicy, ChunkEngine, EventBus};
use tollgate_core::tx::HashType;
use tollgate_crypto::{state_update_message, Keypair};
use tollgate_store::Store;

pub struct Harness {
    pub _dir: tempfile::TempDir,
    pub store: Arc<Store>,
    pub chain: Arc<MockChain>,
    pub manager: ChannelManager,
    pub engine: Arc<ChunkEngine>,
    pub events: Arc<EventBus>,
    pub seller: Arc<Keypair>,
    pub buyer: Keypair,
    pub user_id: u64,
}

pub fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path()).unwrap());
    let chain = Arc::new(MockChain::new());
    let seller = Arc::new(Keypair::generate());
    let buyer = Keypair::generate();
    let user = store
        .create_user("alice", Some(&buyer.public_key_hex()), 100)
        .unwrap();

    let locks = Arc::new(ChannelLocks::new());
    let events = Arc::new(EventBus::new());
    let policy = ChannelPolicy {
        lock_code_hash: [0xcc; 32],
        lock_hash_type: HashType::Type,
        fee_rate_per_kb: 1_000,
        token_base_unit_ratio: 100,
    };
    let manager = ChannelManager::new(
        Arc::clone(&store),
        Arc::clone(&chain) as Arc<dyn BlockchainClient>,
        Arc::clone(&seller),
        policy,
        Arc::clone(&locks),
    );
    let engine = Arc::new(ChunkEngine::new(
        Arc::clone(&store),
        locks,
        Arc::clone(&events),
        100,
    ));

    Harness {
        _dir: dir,
        store,
        chain,
        manager,
        engine,
        events,
        seller,
        buyer,
        user_id: user.id,
    }
}

/// Open, fund and confirm a channel; returns its channel id.
pub async fn activate_channel(h: &Harness, amount: u64, duration_seconds: i64) -> String {
    let offer = h
        .manager
        .open(h.user_id, amount, duration_seconds)
        .await
        .unwrap();
    let funding_hash = h
        .chain
        .submit_transaction(&offer.funding_tx)
        .await
        .unwrap();
    h.manager
        .confirm_funding(&offer.channel_id, funding_hash)
        .await
        .unwrap();
    offer.channel_id
}

/// Buyer-side signature over a chunk's state update.
pub fn sign_state(buyer: &Keypair, channel_id: &str, cumulative: u64, remaining: u64) -> Vec<u8> {
    buyer
        .sign(&state_update_message(channel_id, cumulative, remaining))
        .unwrap()
        .to_vec()
}
