use thiserror::Error;

use crate::model::{PartialInsightEvent, WindowAggregateResult};

#[derive(Debug, Error)]
pub enum RollupError {
    #[error("customerId mismatch: aggregate={aggregate:?}, partial={partial:?}")]
    CustomerMismatch { aggregate: String, partial: String },

    #[error("windowStart mismatch: aggregate={aggregate}, partial={partial}")]
    WindowStartMismatch {
        aggregate: chrono::DateTime<chrono::Utc>,
        partial: chrono::DateTime<chrono::Utc>,
    },

    #[error("windowSize mismatch: aggregate={aggregate}, partial={partial}")]
    WindowSizeMismatch {
        aggregate: crate::model::WindowSize,
        partial: crate::model::WindowSize,
    },
}

/// Accumulates a partial insight's counts into `aggregate`.
///
/// The identity fields must match; the store fabricates missing aggregates
/// from the event's identity, so a mismatch here only trips on programmer
/// error. Merge is element-wise sum, creating absent keys; counts never
/// decrease.
pub fn rollup(
    aggregate: &mut WindowAggregateResult,
    partial: &PartialInsightEvent,
) -> Result<(), RollupError> {
    if aggregate.customer_id != partial.customer_id {
        return Err(RollupError::CustomerMismatch {
            aggregate: aggregate.customer_id.clone(),
            partial: partial.customer_id.clone(),
        });
    }
    if aggregate.window_start != partial.window_start {
        return Err(RollupError::WindowStartMismatch {
            aggregate: aggregate.window_start,
            partial: partial.window_start,
        });
    }
    if aggregate.window_size != partial.window_size {
        return Err(RollupError::WindowSizeMismatch {
            aggregate: aggregate.window_size,
            partial: partial.window_size,
        });
    }

    for (key, value) in &partial.requests_by_path {
        *aggregate.requests_by_path.entry(key.clone()).or_insert(0) += value;
    }
    for (key, value) in &partial.requests_by_user_agent {
        *aggregate
            .requests_by_user_agent
            .entry(key.clone())
            .or_insert(0) += value;
    }

    Ok(())
}
