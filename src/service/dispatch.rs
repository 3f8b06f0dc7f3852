//! Write dispatcher
//!
//! A batch runs inside one write transaction. The first failing operation
//! aborts the batch and nothing it did is kept.

use tracing::{debug, info, warn};

use crate::engine::{StoreHandle, Transaction};
use crate::error::{StoreError, StoreResult};
use crate::types::WriteOperation;

use super::ServiceContext;

/// Apply `batch` to the current store of `ctx`
pub fn apply_batch(ctx: &ServiceContext, batch: &[WriteOperation]) -> StoreResult<()> {
    let handle = ctx.current_handle()?;
    apply(&handle, batch)
}

/// Apply `batch` atomically against `handle`
pub fn apply(handle: &StoreHandle, batch: &[WriteOperation]) -> StoreResult<()> {
    let result = handle.write(|txn| {
        for (index, op) in batch.iter().enumerate() {
            debug!(index, action = op.action(), entity_type = op.entity_type(), "applying write");
            apply_one(txn, op).map_err(|e| StoreError::TransactionAborted {
                index,
                source: Box::new(e),
            })?;
        }
        Ok(())
    });

    match &result {
        Ok(()) => info!(path = handle.path(), operations = batch.len(), "write batch committed"),
        Err(e) => warn!(path = handle.path(), error = %e, "write batch rolled back"),
    }
    result
}

fn apply_one(txn: &mut Transaction<'_>, op: &WriteOperation) -> StoreResult<()> {
    match op {
        WriteOperation::Add {
            entity_type,
            payload,
        } => {
            txn.insert(entity_type, payload)?;
        }
        WriteOperation::Update {
            entity_type,
            payload,
        } => {
            txn.upsert(entity_type, payload)?;
        }
        WriteOperation::Nest {
            entity_type,
            payload,
            filter,
            property,
        } => {
            // Single-match policy: only the first object in store order is touched
            let position = txn.select(entity_type, filter)?.first().copied().ok_or_else(|| {
                StoreError::not_found(format!("no {} matches '{}'", entity_type, filter))
            })?;
            txn.append_to_list(entity_type, position, property, payload)?;
        }
        WriteOperation::Delete {
            entity_type,
            filter,
        } => {
            let positions = txn.select(entity_type, filter)?;
            let deleted = txn.delete(entity_type, &positions)?;
            debug!(entity_type = entity_type.as_str(), deleted, "deleted objects");
        }
        WriteOperation::DeleteAll { entity_type } => {
            let deleted = txn.delete_all(entity_type)?;
            debug!(entity_type = entity_type.as_str(), deleted, "deleted all objects");
        }
        WriteOperation::UpdateMultiple {
            entity_type,
            payload,
            filter,
        } => {
            for position in txn.select(entity_type, filter)? {
                txn.assign(entity_type, position, payload)?;
            }
        }
    }
    Ok(())
}
