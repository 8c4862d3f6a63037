// Account reconciliation
// The remote host decides which accounts exist; storage only remembers.

use crate::domain::{AccountRecord, HostAddr, LiveAccountFact};
use crate::port::AccountRepository;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Outcome of merging stored records with live facts
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Stored records, corrected, followed by the newly discovered accounts
    pub accounts: Vec<AccountRecord>,
    /// Accounts present on the host but never stored
    pub discovered: Vec<AccountRecord>,
}

/// Merge stored account records with a fresh live listing.
///
/// A stored record with a live counterpart takes its uid/gid; one without
/// is flagged `not_found_on_remote` and kept. Live facts left over become
/// new records appended after the stored ones, in listing order.
pub fn reconcile(host: &HostAddr, stored: Vec<AccountRecord>, live: Vec<LiveAccountFact>) -> Reconciled {
    let order: Vec<String> = live.iter().map(|fact| fact.name.clone()).collect();
    let mut index: HashMap<String, LiveAccountFact> = live
        .into_iter()
        .map(|fact| (fact.name.clone(), fact))
        .collect();

    let mut accounts: Vec<AccountRecord> = stored
        .into_iter()
        .map(|mut record| {
            match index.remove(&record.name) {
                Some(fact) => {
                    record.uid = fact.uid;
                    record.gid = fact.gid;
                    record.not_found_on_remote = false;
                }
                None => record.not_found_on_remote = true,
            }
            record
        })
        .collect();

    let discovered: Vec<AccountRecord> = order
        .iter()
        .filter_map(|name| index.remove(name))
        .map(|fact| fact.into_record(host.clone()))
        .collect();

    accounts.extend(discovered.iter().cloned());
    Reconciled {
        accounts,
        discovered,
    }
}

/// Reconcile and store the discovered accounts.
///
/// A storage failure is logged and swallowed: the host is the source of
/// truth and the next pass will try again.
pub async fn reconcile_and_persist(
    repo: &dyn AccountRepository,
    host: &HostAddr,
    stored: Vec<AccountRecord>,
    live: Vec<LiveAccountFact>,
) -> Vec<AccountRecord> {
    let reconciled = reconcile(host, stored, live);
    if reconciled.discovered.is_empty() {
        return reconciled.accounts;
    }

    debug!(host = %host, count = reconciled.discovered.len(), "storing discovered accounts");
    if let Err(e) = repo.upsert_accounts(&reconciled.discovered).await {
        warn!(
            host = %host,
            count = reconciled.discovered.len(),
            error = %e,
            "failed to store discovered accounts"
        );
    }
    reconciled.accounts
}
