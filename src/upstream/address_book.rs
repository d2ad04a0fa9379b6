//! Address book with a disk-resident fallback snapshot
//!
//! The address book lives on a different host than the Explorer API and its
//! availability is not guaranteed; when it cannot be reached or parsed, a
//! bundled read-only snapshot is served instead.

use std::path::{Path, PathBuf};

use super::{decode, ApiError, Gateway, RequestSpec, ADDRESS_BOOK_TIMEOUT};
use crate::models::AddressBook;

pub const DEFAULT_ADDRESS_BOOK_API: &str = "https://api.ergexplorer.com";
const FALLBACK_FILE: &str = "address_book_fallback.json";
const FALLBACK_NOTE: &str = "This is fallback data. The actual API could not be reached.";

#[derive(Clone)]
pub struct AddressBookClient {
    gateway: Gateway,
    fallback_path: PathBuf,
}

impl AddressBookClient {
    pub fn new(base_url: &str, resources_dir: &Path) -> Self {
        Self {
            gateway: Gateway::new(base_url, None),
            fallback_path: resources_dir.join(FALLBACK_FILE),
        }
    }

    /// Fetch the address book, falling back to the local snapshot on any
    /// upstream failure. Never errors: the degenerate case is an empty
    /// snapshot with an explanatory note.
    pub async fn fetch(&self) -> AddressBook {
        match self.fetch_remote().await {
            Ok(book) => {
                tracing::info!(items = book.items.len(), "fetched address book");
                book
            }
            Err(e) => {
                tracing::warn!(error = %e, "address book unreachable, using fallback snapshot");
                self.load_fallback()
            }
        }
    }

    async fn fetch_remote(&self) -> Result<AddressBook, ApiError> {
        let value = self
            .gateway
            .call(
                RequestSpec::get("addressbook/getAddresses").timeout(ADDRESS_BOOK_TIMEOUT),
            )
            .await?;
        decode(value)
    }

    fn load_fallback(&self) -> AddressBook {
        let loaded = std::fs::read_to_string(&self.fallback_path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<AddressBook>(&text).map_err(|e| e.to_string()));

        match loaded {
            Ok(mut book) => {
                tracing::info!(
                    path = %self.fallback_path.display(),
                    items = book.items.len(),
                    "loaded fallback address book"
                );
                book.note = Some(FALLBACK_NOTE.to_string());
                book
            }
            Err(e) => {
                tracing::error!(path = %self.fallback_path.display(), error = %e, "failed to load fallback address book");
                AddressBook {
                    note: Some(
                        "Could not reach API and fallback data could not be loaded.".to_string(),
                    ),
                    ..AddressBook::default()
                }
            }
        }
    }
}
