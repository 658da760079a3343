//! Sequential cursor-paginated catalog scan.
//!
//! Unlike the batch phases, a dropped page here would silently corrupt the
//! identifier set, so a page failure is retried once immediately and a
//! second failure aborts the whole scan.

use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use super::progress::SyncProgress;
use crate::adapters::marketplace::MarketplaceApi;
use crate::error::SyncError;

pub async fn scan_catalog_ids(
    api: &dyn MarketplaceApi,
    seller_id: &str,
    page_limit: u32,
    progress: &SyncProgress,
) -> Result<Vec<String>, SyncError> {
    let mut ids: Vec<String> = Vec::new();
    let mut scroll_id: Option<String> = None;
    let mut page: u32 = 0;

    loop {
        let result = match api.scan_page(seller_id, page_limit, scroll_id.as_deref()).await {
            Ok(page) => Ok(page),
            Err(first) => {
                debug!("Scan page {} failed ({}), retrying once", page + 1, first);
                sleep(Duration::from_secs(1)).await;
                api.scan_page(seller_id, page_limit, scroll_id.as_deref())
                    .await
            }
        };

        let batch = match result {
            Ok(batch) => batch,
            Err(source) => {
                return Err(SyncError::ScanAborted {
                    page: page + 1,
                    source,
                })
            }
        };

        page += 1;
        let count = batch.results.len();
        ids.extend(batch.results);
        // An opaque cursor is always carried forward when present.
        if let Some(cursor) = batch.scroll_id {
            scroll_id = Some(cursor);
        }

        progress.update(|s| {
            s.scan_pages = page;
            s.ids_collected = ids.len();
            s.last_message = format!("+{} identifiers (total {})", count, ids.len());
        });

        if count == 0 {
            break;
        }
    }

    info!("Catalog scan finished: {} identifiers in {} pages", ids.len(), page);
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarketError;
    use crate::sync::testing::MockApi;

    fn page(ids: &[&str], cursor: Option<&str>) -> crate::adapters::marketplace::ScanPage {
        crate::adapters::marketplace::ScanPage {
            results: ids.iter().map(|s| s.to_string()).collect(),
            scroll_id: cursor.map(str::to_string),
        }
    }

    fn ids(n: usize, prefix: &str) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[tokio::test]
    async fn terminates_on_empty_page_not_short_page() {
        let api = MockApi::default();
        api.push_scan(Ok(crate::adapters::marketplace::ScanPage {
            results: ids(100, "a"),
            scroll_id: Some("c1".into()),
        }));
        api.push_scan(Ok(crate::adapters::marketplace::ScanPage {
            results: ids(100, "b"),
            scroll_id: Some("c2".into()),
        }));
        api.push_scan(Ok(crate::adapters::marketplace::ScanPage {
            results: ids(37, "c"),
            scroll_id: Some("c3".into()),
        }));
        api.push_scan(Ok(page(&[], None)));

        let collected = scan_catalog_ids(&api, "seller", 100, &SyncProgress::new())
            .await
            .unwrap();
        assert_eq!(collected.len(), 237);
        assert_eq!(api.scan_calls(), 4);
        // The cursor from the previous page is carried into each request.
        assert_eq!(api.last_scroll_id(), Some("c3".to_string()));
    }

    #[tokio::test]
    async fn transient_page_failure_is_retried_once() {
        let api = MockApi::default();
        api.push_scan(Err(MarketError::Status {
            status: 500,
            body: String::new(),
        }));
        api.push_scan(Ok(page(&["x"], Some("c1"))));
        api.push_scan(Ok(page(&[], None)));

        let collected = scan_catalog_ids(&api, "seller", 100, &SyncProgress::new())
            .await
            .unwrap();
        assert_eq!(collected, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn second_consecutive_failure_aborts_the_scan() {
        let api = MockApi::default();
        api.push_scan(Err(MarketError::Status {
            status: 500,
            body: String::new(),
        }));
        api.push_scan(Err(MarketError::Status {
            status: 500,
            body: String::new(),
        }));

        let err = scan_catalog_ids(&api, "seller", 100, &SyncProgress::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ScanAborted { page: 1, .. }));
    }
}
