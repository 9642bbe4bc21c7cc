use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Drop explicitly-null fields instead of clearing the stored column.
    pub remove_nullable: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            remove_nullable: true,
        }
    }
}
