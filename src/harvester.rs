//! The fixed-count polling loop: fetch, flatten-and-append, delay, repeat.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::client::{FetchError, ListingsQuery};
use crate::config::Settings;
use crate::model::{flatten_listings, Listing};
use crate::store::RowTable;

/// Fetch seam between the loop and the HTTP client, so the loop's
/// termination and accumulation behavior is testable with a scripted
/// source.
#[allow(async_fn_in_trait)]
pub trait ListingsSource {
    async fn fetch_listings(&self, query: &ListingsQuery) -> Result<Vec<Listing>, FetchError>;
}

/// Runs exactly `settings.cycles` cycles and returns the accumulated
/// table. Termination is the cycle counter, never wall clock.
///
/// Per-cycle failures (transient status, transport after retries, schema
/// violations) contribute zero rows and the loop moves on. A rejected
/// credential aborts the run: every remaining cycle would fail the same
/// way.
pub async fn run<S: ListingsSource>(settings: &Settings, source: &S) -> Result<RowTable> {
    let query = ListingsQuery::from(settings);
    let mut table = RowTable::new();

    for cycle in 1..=settings.cycles {
        match source.fetch_listings(&query).await {
            Ok(listings) => {
                let fetched = listings.len();
                match flatten_listings(listings, &settings.convert) {
                    Ok(rows) => {
                        table.append(rows);
                        log::info!(
                            "harvest.cycle cycle={}/{} listings={} rows_total={}",
                            cycle,
                            settings.cycles,
                            fetched,
                            table.len()
                        );
                    }
                    Err(e) => {
                        log::error!(
                            "harvest.schema cycle={}/{} err={}",
                            cycle,
                            settings.cycles,
                            e
                        );
                    }
                }
            }
            Err(e) if e.is_fatal() => {
                return Err(e).with_context(|| {
                    format!("credential rejected on cycle {cycle}, aborting run")
                });
            }
            Err(e) => {
                log::warn!(
                    "harvest.fetch_failed cycle={}/{} err={}",
                    cycle,
                    settings.cycles,
                    e
                );
            }
        }

        if cycle < settings.cycles && settings.delay_secs > 0 {
            tokio::time::sleep(Duration::from_secs(settings.delay_secs)).await;
        }
    }

    Ok(table)
}
