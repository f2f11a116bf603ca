//! Storage object model: where an uploaded file ended up.

use serde::{Deserialize, Serialize};

/// A stored object. `path` is the object-store key, `url` its public
/// download URL. The object store owns its lifecycle; deleting it only needs
/// the URL because the key can be derived back from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObject {
    pub path: String,
    pub url: String,
}
