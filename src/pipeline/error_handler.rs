use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::EngineError;
use crate::types::{ErrorRow, Row, RowSchema};

/// Rejection limits for a node with an error hop. Zero disables a limit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorHandling {
    /// Fail the run once more than this many rows were rejected.
    pub max_errors: u64,
    /// Fail the run once rejected rows exceed this percentage of rows read.
    pub max_percent_errors: u8,
    /// Rows that must be read before the percentage limit applies.
    pub min_rows_for_percent: u64,
}

impl ErrorHandling {
    /// Check limits after a rejection: `rejected` rows so far out of `read`.
    pub fn check(&self, node: &str, rejected: u64, read: u64) -> Result<(), EngineError> {
        if self.max_errors > 0 && rejected > self.max_errors {
            log::error!(
                "{}: maximum of {} rejected rows exceeded ({} rejected)",
                node,
                self.max_errors,
                rejected
            );
            return Err(EngineError::TooManyRejected {
                node: node.to_string(),
                detail: format!("{rejected} > max {}", self.max_errors),
            });
        }
        if self.max_percent_errors > 0
            && rejected > 0
            && (self.min_rows_for_percent == 0 || read >= self.min_rows_for_percent)
        {
            let pct = if read == 0 {
                100
            } else {
                (100 * rejected).div_ceil(read)
            };
            if pct > u64::from(self.max_percent_errors) {
                log::error!(
                    "{}: rejected {}% of rows ({} of {}), limit is {}%",
                    node,
                    pct,
                    rejected,
                    read,
                    self.max_percent_errors
                );
                return Err(EngineError::TooManyRejected {
                    node: node.to_string(),
                    detail: format!("{pct}% > max {}%", self.max_percent_errors),
                });
            }
        }
        Ok(())
    }
}

/// Turns [`ErrorRow`]s into error-hop rows, reusing the extended schema while the input schema
/// stays the same so every row on the error channel shares one layout.
#[derive(Debug, Default)]
pub struct ErrorRowEncoder {
    cache: Option<(Arc<RowSchema>, Arc<RowSchema>)>,
}

impl ErrorRowEncoder {
    pub fn encode(&mut self, node: &str, mut err: ErrorRow) -> Result<Row, EngineError> {
        if err.node.is_empty() {
            err.node = node.to_string();
        }
        if err.message.is_empty() {
            err.message = format!("row rejected by {node}");
        }
        let source = Arc::clone(err.row.schema());
        let schema = match &self.cache {
            Some((src, extended)) if Arc::ptr_eq(src, &source) || **src == *source => {
                Arc::clone(extended)
            }
            _ => {
                let extended = Arc::new(ErrorRow::schema_for(&source));
                self.cache = Some((source, Arc::clone(&extended)));
                extended
            }
        };
        err.into_row_with(schema)
    }
}
