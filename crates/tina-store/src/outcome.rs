use crate::error::StoreError;

/// Result of applying one keyed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Applied,
    /// The item referenced a row that does not exist. Nothing was written.
    NotFound,
}

/// Aggregated per-item results of a batch operation.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub applied: usize,
    pub not_found: Vec<String>,
    pub failed: Vec<(String, StoreError)>,
}

impl BatchReport {
    pub fn record(&mut self, id: &str, result: Result<ItemOutcome, StoreError>) {
        match result {
            Ok(ItemOutcome::Applied) => self.applied += 1,
            Ok(ItemOutcome::NotFound) => self.not_found.push(id.to_string()),
            Err(e) => self.failed.push((id.to_string(), e)),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.not_found.is_empty() && self.failed.is_empty()
    }
}

/// Chat history sync result.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChatSetReport {
    pub deleted: u64,
    pub added: u64,
}

/// Contact history sync result.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ContactSetReport {
    pub deleted: u64,
    pub upserted: usize,
}
