use tracing::debug;

use crate::entities::voter;

use super::{StoreError, VoterStore, Window};

/// Reads the whole table in `page_size` windows ordered by id.
///
/// The scan ends at the first page shorter than `page_size`, so a table whose
/// size is an exact multiple of the page costs one extra, empty request. Any
/// window failure aborts the scan; no partial snapshot is returned.
pub async fn fetch_all(
    store: &dyn VoterStore,
    page_size: u64,
) -> Result<Vec<voter::Model>, StoreError> {
    assert!(page_size > 0, "Page size must be positive");

    let mut snapshot = Vec::new();
    let mut offset = 0u64;
    loop {
        let page = store
            .fetch_window(Window {
                offset,
                limit: page_size,
            })
            .await?;
        let received = page.len() as u64;
        assert!(received <= page_size, "Store returned an oversized page");
        snapshot.extend(page);

        if received < page_size {
            break;
        }
        offset += page_size;
    }

    debug!("Loaded {} voters in windows of {page_size}", snapshot.len());
    Ok(snapshot)
}
