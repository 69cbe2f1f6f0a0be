use serde::{Deserialize, Serialize};

/// One downloadable resource discovered on a listing page.
///
/// Produced by a [`PageSource`](super::PageSource) and never modified after.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadDescriptor {
    /// Where the resource lives, as found on the listing.
    pub locator: String,
    /// File name the resource is saved under.
    pub target_name: String,
}

impl DownloadDescriptor {
    /// Creates a descriptor.
    pub fn new(locator: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            target_name: target_name.into(),
        }
    }
}
