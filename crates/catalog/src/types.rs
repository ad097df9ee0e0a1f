//! Response shapes of the catalog API.

use rommend_protocol::CatalogItem;
use serde::Deserialize;

/// Body of the item list endpoint.
///
/// Older servers answer with a bare array, newer ones wrap it in a page
/// object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ItemList {
    Bare(Vec<CatalogItem>),
    Paged { items: Vec<CatalogItem> },
}

impl ItemList {
    pub(crate) fn into_items(self) -> Vec<CatalogItem> {
        match self {
            Self::Bare(items) | Self::Paged { items } => items,
        }
    }
}
