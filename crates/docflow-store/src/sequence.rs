//! # Sequence Allocator
//!
//! Hands out the next number of a named sequence inside the caller's
//! transaction. The sequence row stays leased until that transaction ends,
//! so two concurrent allocations on the same code are serialized: the
//! second waits, then reads the value the first committed. If the caller's
//! transaction rolls back, the increment is discarded with it and the
//! number is handed out again by the next allocation.
//!
//! Values are issued strictly increasing with no gaps among committed
//! allocations.

use serde::Serialize;

use docflow_core::{DocflowError, Missing, SequenceCode, SequenceId};

use crate::StoreTx;

/// One allocated number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    /// The sequence the number was drawn from.
    pub sequence_id: SequenceId,
    /// The sequence code.
    pub code: SequenceCode,
    /// The raw counter value.
    pub value: u64,
    /// The formatted number, e.g. `DT-0001`.
    pub number: String,
}

/// Allocates numbers from number sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceAllocator;

impl SequenceAllocator {
    /// Lease `code`, advance it by one and render the new value.
    ///
    /// The lease is released when `tx` commits or rolls back.
    pub async fn allocate<T: StoreTx>(
        tx: &mut T,
        code: &SequenceCode,
    ) -> Result<Allocation, DocflowError> {
        let sequence = tx
            .lock_sequence(code)
            .await?
            .ok_or_else(|| DocflowError::NotFound(Missing::Sequence(code.to_string())))?;

        let value = sequence.current_value.checked_add(1).ok_or_else(|| {
            DocflowError::Internal(format!("sequence {code} exhausted at {}", sequence.current_value))
        })?;
        tx.store_sequence_value(code, value).await?;

        let number = sequence.format.render(value);
        metrics::counter!("docflow_sequence_allocations_total", "code" => code.to_string())
            .increment(1);
        tracing::debug!(code = %code, value, number = %number, "allocated sequence number");

        Ok(Allocation {
            sequence_id: sequence.id,
            code: sequence.code,
            value,
            number,
        })
    }
}
