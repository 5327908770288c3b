use std::path::Path;

use tollgate_core::channel::{ChannelStatus, PaymentChannel};
use tollgate_core::chunk::{ChunkPayment, UnpaidSummary};
use tollgate_core::error::TollgateError;
use tollgate_core::tasklog::{ExecutionStatus, ScheduledTaskLog};
use tollgate_core::types::{Timestamp, UserId};
use tollgate_core::user::{Session, User};

/// Persistent store backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   users                  — user_id be8        → bincode(User)
///   users_by_name          — username utf8      → user_id be8
///   users_by_pubkey        — pubkey hex utf8    → user_id be8
///   sessions               — session_id utf8    → bincode(Session)
///   sessions_by_user       — user_id ‖ '/' ‖ session_id → [] (membership)
///   channels               — channel_id utf8    → bincode(PaymentChannel)
///   channels_by_user       — user_id ‖ '/' ‖ channel_id → [] (membership)
///   chunks                 — chunk_id utf8      → bincode(ChunkPayment)
///   chunks_by_channel      — channel_id ‖ '/' ‖ created_at be8 ‖ id be8 → chunk_id
///   chunks_by_user_session — user_id ‖ '/' ‖ session_id ‖ '/' ‖ chunk_id → []
///   task_logs              — log_id be8         → bincode(ScheduledTaskLog)
///   database_info          — utf8 key           → raw bytes (schema version, counters)
pub struct Store {
    db: sled::Db,
    users: sled::Tree,
    users_by_name: sled::Tree,
    users_by_pubkey: sled::Tree,
    sessions: sled::Tree,
    sessions_by_user: sled::Tree,
    channels: sled::Tree,
    channels_by_user: sled::Tree,
    chunks: sled::Tree,
    chunks_by_channel: sled::Tree,
    chunks_by_user_session: sled::Tree,
    task_logs: sled::Tree,
    database_info: sled::Tree,
}

fn storage_err(e: impl std::fmt::Display) -> TollgateError {
    TollgateError::Storage(e.to_string())
}

fn ser_err(e: impl std::fmt::Display) -> TollgateError {
    TollgateError::Serialization(e.to_string())
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, TollgateError> {
    bincode::deserialize(bytes).map_err(ser_err)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, TollgateError> {
    bincode::serialize(value).map_err(ser_err)
}

/// `user_id ‖ '/' ‖ rest` composite key.
fn scoped_key(user_id: UserId, rest: &[u8]) -> Vec<u8> {
    let mut key = user_id.to_be_bytes().to_vec();
    key.push(b'/');
    key.extend_from_slice(rest);
    key
}

/// Ordered chunk index key: `channel_id ‖ '/' ‖ created_at be8 ‖ id be8`.
/// Big-endian components make lexicographic order equal `(created_at, id)`.
fn chunk_order_key(channel_id: &str, created_at: Timestamp, id: u64) -> Vec<u8> {
    let mut key = channel_id.as_bytes().to_vec();
    key.push(b'/');
    key.extend_from_slice(&(created_at.max(0) as u64).to_be_bytes());
    key.extend_from_slice(&id.to_be_bytes());
    key
}

impl Store {
    /// Open or create the store at `path` and apply pending migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TollgateError> {
        let db = sled::open(path).map_err(storage_err)?;
        let users = db.open_tree("users").map_err(storage_err)?;
        let users_by_name = db.open_tree("users_by_name").map_err(storage_err)?;
        let users_by_pubkey = db.open_tree("users_by_pubkey").map_err(storage_err)?;
        let sessions = db.open_tree("sessions").map_err(storage_err)?;
        let sessions_by_user = db.open_tree("sessions_by_user").map_err(storage_err)?;
        let channels = db.open_tree("channels").map_err(storage_err)?;
        let channels_by_user = db.open_tree("channels_by_user").map_err(storage_err)?;
        let chunks = db.open_tree("chunks").map_err(storage_err)?;
        let chunks_by_channel = db.open_tree("chunks_by_channel").map_err(storage_err)?;
        let chunks_by_user_session = db.open_tree("chunks_by_user_session").map_err(storage_err)?;
        let task_logs = db.open_tree("task_logs").map_err(storage_err)?;
        let database_info = db.open_tree("database_info").map_err(storage_err)?;

        let store = Self {
            db,
            users,
            users_by_name,
            users_by_pubkey,
            sessions,
            sessions_by_user,
            channels,
            channels_by_user,
            chunks,
            chunks_by_channel,
            chunks_by_user_session,
            task_logs,
            database_info,
        };
        crate::migrate::run(&store)?;
        Ok(store)
    }

    /// Flush all pending writes to disk. Durability points (channel open,
    /// chunk payment) call this explicitly.
    pub fn flush(&self) -> Result<(), TollgateError> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }

    // ── database_info ────────────────────────────────────────────────────────

    pub(crate) fn info_get(&self, key: &str) -> Result<Option<Vec<u8>>, TollgateError> {
        Ok(self
            .database_info
            .get(key.as_bytes())
            .map_err(storage_err)?
            .map(|v| v.to_vec()))
    }

    pub(crate) fn info_put(&self, key: &str, value: &[u8]) -> Result<(), TollgateError> {
        self.database_info
            .insert(key.as_bytes(), value)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn schema_version(&self) -> Result<u32, TollgateError> {
        Ok(self
            .info_get("version")?
            .map(|b| {
                let mut arr = [0u8; 4];
                arr.copy_from_slice(&b[..4]);
                u32::from_be_bytes(arr)
            })
            .unwrap_or(0))
    }

    pub(crate) fn set_schema_version(&self, version: u32) -> Result<(), TollgateError> {
        self.info_put("version", &version.to_be_bytes())
    }

    /// Allocate the next value of a monotonic counter stored in database_info.
    fn next_counter(&self, key: &str) -> Result<u64, TollgateError> {
        let current = self
            .info_get(key)?
            .map(|b| {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&b[..8]);
                u64::from_be_bytes(arr)
            })
            .unwrap_or(1);
        self.info_put(key, &(current + 1).to_be_bytes())?;
        Ok(current)
    }

    // ── Users ────────────────────────────────────────────────────────────────

    /// Create a user with a unique username and (optional) unique public key.
    pub fn create_user(
        &self,
        username: &str,
        public_key: Option<&str>,
        now: Timestamp,
    ) -> Result<User, TollgateError> {
        if self
            .users_by_name
            .contains_key(username.as_bytes())
            .map_err(storage_err)?
        {
            return Err(TollgateError::DuplicateUsername(username.to_string()));
        }
        if let Some(pk) = public_key {
            if self
                .users_by_pubkey
                .contains_key(pk.as_bytes())
                .map_err(storage_err)?
            {
                return Err(TollgateError::DuplicatePublicKey);
            }
        }

        let user = User {
            id: self.next_counter("next_user_id")?,
            username: username.to_string(),
            public_key: public_key.map(str::to_string),
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: Some(now),
        };
        self.users
            .insert(user.id.to_be_bytes(), encode(&user)?)
            .map_err(storage_err)?;
        self.users_by_name
            .insert(username.as_bytes(), user.id.to_be_bytes().to_vec())
            .map_err(storage_err)?;
        if let Some(pk) = public_key {
            self.users_by_pubkey
                .insert(pk.as_bytes(), user.id.to_be_bytes().to_vec())
                .map_err(storage_err)?;
        }
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> Result<Option<User>, TollgateError> {
        match self.users.get(id.to_be_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn user_by_index(
        &self,
        tree: &sled::Tree,
        key: &str,
    ) -> Result<Option<User>, TollgateError> {
        match tree.get(key.as_bytes()).map_err(storage_err)? {
            Some(id_bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&id_bytes[..8]);
                self.get_user(u64::from_be_bytes(arr))
            }
            None => Ok(None),
        }
    }

    pub fn get_user_by_public_key(&self, pk_hex: &str) -> Result<Option<User>, TollgateError> {
        self.user_by_index(&self.users_by_pubkey, pk_hex)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, TollgateError> {
        self.user_by_index(&self.users_by_name, username)
    }

    /// Rewrite a user record. Username and public key are immutable; index
    /// trees are maintained at creation only.
    pub fn put_user(&self, user: &User) -> Result<(), TollgateError> {
        self.users
            .insert(user.id.to_be_bytes(), encode(user)?)
            .map_err(storage_err)?;
        Ok(())
    }

    // ── Sessions ─────────────────────────────────────────────────────────────

    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>, TollgateError> {
        match self
            .sessions
            .get(session_id.as_bytes())
            .map_err(storage_err)?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch or implicitly create a session for `user_id`.
    pub fn ensure_session(
        &self,
        session_id: &str,
        user_id: UserId,
        now: Timestamp,
    ) -> Result<Session, TollgateError> {
        if let Some(existing) = self.get_session(session_id)? {
            return Ok(existing);
        }
        let session = Session {
            id: session_id.to_string(),
            user_id,
            title: None,
            created_at: now,
            updated_at: now,
        };
        self.sessions
            .insert(session_id.as_bytes(), encode(&session)?)
            .map_err(storage_err)?;
        self.sessions_by_user
            .insert(scoped_key(user_id, session_id.as_bytes()), b"".as_ref())
            .map_err(storage_err)?;
        Ok(session)
    }

    pub fn sessions_for_user(&self, user_id: UserId) -> Result<Vec<Session>, TollgateError> {
        let prefix = scoped_key(user_id, b"");
        let mut out = Vec::new();
        for item in self.sessions_by_user.scan_prefix(&prefix) {
            let (key, _) = item.map_err(storage_err)?;
            let session_id = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            if let Some(session) = self.get_session(&session_id)? {
                out.push(session);
            }
        }
        Ok(out)
    }

    /// Index backfill hook used by migrations.
    pub(crate) fn all_sessions(&self) -> Result<Vec<Session>, TollgateError> {
        let mut out = Vec::new();
        for item in self.sessions.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    pub(crate) fn index_session(&self, session: &Session) -> Result<(), TollgateError> {
        self.sessions_by_user
            .insert(
                scoped_key(session.user_id, session.id.as_bytes()),
                b"".as_ref(),
            )
            .map_err(storage_err)?;
        Ok(())
    }

    // ── Channels ─────────────────────────────────────────────────────────────

    /// Insert a new channel, assigning its row id. Duplicate `channel_id` is
    /// a conflict.
    pub fn create_channel(
        &self,
        mut channel: PaymentChannel,
    ) -> Result<PaymentChannel, TollgateError> {
        if self
            .channels
            .contains_key(channel.channel_id.as_bytes())
            .map_err(storage_err)?
        {
            return Err(TollgateError::DuplicateChannel(channel.channel_id));
        }
        channel.id = self.next_counter("next_channel_id")?;
        self.channels
            .insert(channel.channel_id.as_bytes(), encode(&channel)?)
            .map_err(storage_err)?;
        self.channels_by_user
            .insert(
                scoped_key(channel.user_id, channel.channel_id.as_bytes()),
                b"".as_ref(),
            )
            .map_err(storage_err)?;
        Ok(channel)
    }

    pub fn get_channel(&self, channel_id: &str) -> Result<Option<PaymentChannel>, TollgateError> {
        match self
            .channels
            .get(channel_id.as_bytes())
            .map_err(storage_err)?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Rewrite an existing channel record.
    pub fn put_channel(&self, channel: &PaymentChannel) -> Result<(), TollgateError> {
        self.channels
            .insert(channel.channel_id.as_bytes(), encode(channel)?)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn channels_for_user(&self, user_id: UserId) -> Result<Vec<PaymentChannel>, TollgateError> {
        let prefix = scoped_key(user_id, b"");
        let mut out = Vec::new();
        for item in self.channels_by_user.scan_prefix(&prefix) {
            let (key, _) = item.map_err(storage_err)?;
            let channel_id = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            if let Some(channel) = self.get_channel(&channel_id)? {
                out.push(channel);
            }
        }
        Ok(out)
    }

    /// The user's default channel, if any.
    pub fn default_channel(&self, user_id: UserId) -> Result<Option<PaymentChannel>, TollgateError> {
        Ok(self
            .channels_for_user(user_id)?
            .into_iter()
            .find(|c| c.is_default))
    }

    /// Atomically move the default flag to `channel_id` within one user's
    /// channel set (single-writer discipline: callers hold the user's
    /// channel locks).
    pub fn set_default_channel(
        &self,
        user_id: UserId,
        channel_id: &str,
    ) -> Result<(), TollgateError> {
        let mut found = false;
        for mut channel in self.channels_for_user(user_id)? {
            let should_be_default = channel.channel_id == channel_id;
            if should_be_default {
                found = true;
            }
            if channel.is_default != should_be_default {
                channel.is_default = should_be_default;
                self.put_channel(&channel)?;
            }
        }
        if !found {
            return Err(TollgateError::ChannelNotFound(channel_id.to_string()));
        }
        Ok(())
    }

    /// All channels currently in `status`. Full scan; channel counts are
    /// bounded by active users.
    pub fn channels_with_status(
        &self,
        status: ChannelStatus,
    ) -> Result<Vec<PaymentChannel>, TollgateError> {
        let mut out = Vec::new();
        for item in self.channels.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let channel: PaymentChannel = decode(&bytes)?;
            if channel.status == status {
                out.push(channel);
            }
        }
        Ok(out)
    }

    // ── Chunk payments ───────────────────────────────────────────────────────

    /// Insert a new chunk payment, assigning its row id. Duplicate
    /// `chunk_id` is a conflict.
    pub fn create_chunk(&self, mut chunk: ChunkPayment) -> Result<ChunkPayment, TollgateError> {
        if self
            .chunks
            .contains_key(chunk.chunk_id.as_bytes())
            .map_err(storage_err)?
        {
            return Err(TollgateError::DuplicateChunk(chunk.chunk_id));
        }
        chunk.id = self.next_counter("next_chunk_id")?;
        self.chunks
            .insert(chunk.chunk_id.as_bytes(), encode(&chunk)?)
            .map_err(storage_err)?;
        self.chunks_by_channel
            .insert(
                chunk_order_key(&chunk.channel_id, chunk.created_at, chunk.id),
                chunk.chunk_id.as_bytes(),
            )
            .map_err(storage_err)?;
        let mut us_key = scoped_key(chunk.user_id, chunk.session_id.as_bytes());
        us_key.push(b'/');
        us_key.extend_from_slice(chunk.chunk_id.as_bytes());
        self.chunks_by_user_session
            .insert(us_key, b"".as_ref())
            .map_err(storage_err)?;
        Ok(chunk)
    }

    pub fn get_chunk(&self, chunk_id: &str) -> Result<Option<ChunkPayment>, TollgateError> {
        match self.chunks.get(chunk_id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_chunk(&self, chunk: &ChunkPayment) -> Result<(), TollgateError> {
        self.chunks
            .insert(chunk.chunk_id.as_bytes(), encode(chunk)?)
            .map_err(storage_err)?;
        Ok(())
    }

    /// Most recent chunk of a channel by `(created_at, id)`.
    pub fn latest_chunk(&self, channel_id: &str) -> Result<Option<ChunkPayment>, TollgateError> {
        let mut prefix = channel_id.as_bytes().to_vec();
        prefix.push(b'/');
        match self.chunks_by_channel.scan_prefix(&prefix).next_back() {
            Some(item) => {
                let (_, chunk_id) = item.map_err(storage_err)?;
                self.get_chunk(&String::from_utf8_lossy(&chunk_id))
            }
            None => Ok(None),
        }
    }

    /// All chunks of a channel in `(created_at, id)` order.
    pub fn chunks_for_channel(
        &self,
        channel_id: &str,
    ) -> Result<Vec<ChunkPayment>, TollgateError> {
        let mut prefix = channel_id.as_bytes().to_vec();
        prefix.push(b'/');
        let mut out = Vec::new();
        for item in self.chunks_by_channel.scan_prefix(&prefix) {
            let (_, chunk_id) = item.map_err(storage_err)?;
            if let Some(chunk) = self.get_chunk(&String::from_utf8_lossy(&chunk_id))? {
                out.push(chunk);
            }
        }
        Ok(out)
    }

    /// Most recent *paid* chunk of a channel.
    pub fn latest_paid_chunk(
        &self,
        channel_id: &str,
    ) -> Result<Option<ChunkPayment>, TollgateError> {
        let mut prefix = channel_id.as_bytes().to_vec();
        prefix.push(b'/');
        for item in self.chunks_by_channel.scan_prefix(&prefix).rev() {
            let (_, chunk_id) = item.map_err(storage_err)?;
            if let Some(chunk) = self.get_chunk(&String::from_utf8_lossy(&chunk_id))? {
                if chunk.is_paid {
                    return Ok(Some(chunk));
                }
            }
        }
        Ok(None)
    }

    /// Aggregate unpaid chunks across all of a user's sessions.
    pub fn unpaid_summary(&self, user_id: UserId) -> Result<UnpaidSummary, TollgateError> {
        let prefix = scoped_key(user_id, b"");
        let mut summary = UnpaidSummary::default();
        for item in self.chunks_by_user_session.scan_prefix(&prefix) {
            let (key, _) = item.map_err(storage_err)?;
            let rest = &key[prefix.len()..];
            let Some(sep) = rest.iter().rposition(|&b| b == b'/') else {
                continue;
            };
            let chunk_id = String::from_utf8_lossy(&rest[sep + 1..]).into_owned();
            if let Some(chunk) = self.get_chunk(&chunk_id)? {
                if !chunk.is_paid {
                    summary.count += 1;
                    summary.tokens += chunk.tokens_count;
                }
            }
        }
        Ok(summary)
    }

    // ── Task logs ────────────────────────────────────────────────────────────

    /// Open a new task-log record in `running` state and return it.
    pub fn create_task_log(
        &self,
        task_name: &str,
        task_type: &str,
        now: Timestamp,
    ) -> Result<ScheduledTaskLog, TollgateError> {
        let log = ScheduledTaskLog {
            id: self.next_counter("next_task_log_id")?,
            task_name: task_name.to_string(),
            task_type: task_type.to_string(),
            execution_status: ExecutionStatus::Running,
            started_at: now,
            completed_at: None,
            duration_ms: None,
            result_data: None,
            error_message: None,
            settled_count: None,
            checked_count: None,
            created_at: now,
        };
        self.task_logs
            .insert(log.id.to_be_bytes(), encode(&log)?)
            .map_err(storage_err)?;
        Ok(log)
    }

    pub fn put_task_log(&self, log: &ScheduledTaskLog) -> Result<(), TollgateError> {
        self.task_logs
            .insert(log.id.to_be_bytes(), encode(log)?)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_task_log(&self, id: u64) -> Result<Option<ScheduledTaskLog>, TollgateError> {
        match self.task_logs.get(id.to_be_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Most recent task logs, newest first.
    pub fn recent_task_logs(&self, limit: usize) -> Result<Vec<ScheduledTaskLog>, TollgateError> {
        let mut out = Vec::with_capacity(limit);
        for item in self.task_logs.iter().rev().take(limit) {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }
}
