//! Forward-only schema migrations.
//!
//! A monotonic integer `version` under the `database_info` tree gates which
//! steps run. Each step is idempotent and the version bump lands last,
//! after a flush, so a crash mid-step re-runs the step harmlessly on next
//! open.

use tracing::info;

use tollgate_core::error::TollgateError;
use tollgate_core::types::unix_now;

use crate::db::Store;

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

pub(crate) fn run(store: &Store) -> Result<(), TollgateError> {
    let mut version = store.schema_version()?;
    if version > CURRENT_SCHEMA_VERSION {
        return Err(TollgateError::Storage(format!(
            "database schema version {version} is newer than supported {CURRENT_SCHEMA_VERSION}"
        )));
    }

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        match next {
            1 => provision(store)?,
            2 => backfill_session_index(store)?,
            other => {
                return Err(TollgateError::Storage(format!(
                    "no migration registered for schema version {other}"
                )))
            }
        }
        store.flush()?;
        store.set_schema_version(next)?;
        store.flush()?;
        info!(from = version, to = next, "applied schema migration");
        version = next;
    }
    Ok(())
}

/// v1: stamp initial provisioning time. Trees are created lazily by sled.
fn provision(store: &Store) -> Result<(), TollgateError> {
    if store.info_get("created_at")?.is_none() {
        store.info_put("created_at", &unix_now().to_be_bytes())?;
    }
    Ok(())
}

/// v2: rebuild the `sessions_by_user` membership index from the sessions
/// tree. Inserts are idempotent, so a partial earlier run is safe.
fn backfill_session_index(store: &Store) -> Result<(), TollgateError> {
    for session in store.all_sessions()? {
        store.index_session(&session)?;
    }
    Ok(())
}
