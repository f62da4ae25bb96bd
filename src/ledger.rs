use crate::dedup::{deduplicate_sales, DeduplicationResult, IdentityKey, OverseasSale};
use crate::error::Result;
use crate::schema::RawEvent;
use chrono::NaiveDateTime;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Every raw event ever seen, bucketed by rendered identity key. Merging new
/// events re-runs the deduplicator over the full history, so merges are exact
/// rather than approximated from aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesLedger {
    #[serde(default)]
    events: BTreeMap<String, Vec<RawEvent>>,

    /// Events whose service label is not (yet) a known service.
    #[serde(default)]
    unassigned: Vec<RawEvent>,
}

impl SalesLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds events, ignoring any whose id is already recorded anywhere in
    /// the ledger. The first delivery of an id wins, even when a later one
    /// carries a different identity. Returns how many were added.
    pub fn record(&mut self, events: &[RawEvent]) -> usize {
        let mut seen: HashSet<String> = self.ids().map(str::to_string).collect();
        let mut added = 0;

        for event in events {
            if !seen.insert(event.id.clone()) {
                debug!("Event {} already recorded, ignoring", event.id);
                continue;
            }

            let bucket = match IdentityKey::for_event(event) {
                Some(key) => self.events.entry(key.to_string()).or_default(),
                None => &mut self.unassigned,
            };
            bucket.push(event.clone());
            added += 1;
        }

        added
    }

    fn ids(&self) -> impl Iterator<Item = &str> {
        self.events
            .values()
            .flatten()
            .chain(self.unassigned.iter())
            .map(|event| event.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.events.values().map(Vec::len).sum::<usize>() + self.unassigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn identity_count(&self) -> usize {
        self.events.len()
    }

    pub fn events_for(&self, key: &IdentityKey) -> &[RawEvent] {
        self.events
            .get(&key.to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_events(&self) -> Vec<RawEvent> {
        self.events
            .values()
            .flatten()
            .chain(self.unassigned.iter())
            .cloned()
            .collect()
    }

    pub fn deduplicate(&self) -> DeduplicationResult {
        deduplicate_sales(&self.all_events())
    }

    /// Records the new batch and recomputes every sale from the full history.
    pub fn merge_overseas_sales(&mut self, new_events: &[RawEvent]) -> DeduplicationResult {
        let added = self.record(new_events);
        info!(
            "Merged {} of {} new events into a ledger of {} events",
            added,
            new_events.len(),
            self.len()
        );
        self.deduplicate()
    }

    /// Rebuilds a ledger from persisted aggregates only. One representative
    /// event is emitted per period start and end, which keeps each group's
    /// deduplicated count intact. Records without periods fall back to their
    /// first and last sale dates. Occurrence counts and event ids are lost.
    pub fn from_legacy_sales(sales: &[OverseasSale]) -> Self {
        let mut ledger = Self::new();

        for sale in sales {
            let mut representatives = Vec::new();

            if sale.periods.is_empty() {
                representatives.push(representative(sale, "first", sale.first_sale_date));
                if sale.last_sale_date != sale.first_sale_date {
                    representatives.push(representative(sale, "last", sale.last_sale_date));
                }
            } else {
                for (idx, period) in sale.periods.iter().enumerate() {
                    representatives.push(representative(
                        sale,
                        &format!("p{}-start", idx),
                        period.start_date,
                    ));
                    if period.end_date != period.start_date {
                        representatives.push(representative(
                            sale,
                            &format!("p{}-end", idx),
                            period.end_date,
                        ));
                    }
                }
            }

            ledger.record(&representatives);
        }

        debug!(
            "Reconstructed {} representative events from {} persisted sales",
            ledger.len(),
            sales.len()
        );

        ledger
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

fn representative(sale: &OverseasSale, tag: &str, at: NaiveDateTime) -> RawEvent {
    RawEvent {
        id: format!("{}#{}", sale.identity_key, tag),
        contract_id: sale.contract_id.clone(),
        client_id: sale.client_id.clone(),
        maid_id: sale.maid_id.clone(),
        service_type: sale.service.as_str().to_string(),
        occurred_at: Some(at.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
    }
}

/// Merges new events into sales that were persisted without their raw events.
pub fn merge_overseas_sales(
    existing: &[OverseasSale],
    new_events: &[RawEvent],
) -> DeduplicationResult {
    SalesLedger::from_legacy_sales(existing).merge_overseas_sales(new_events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ServiceKey;

    fn ttl_event(id: &str, at: &str) -> RawEvent {
        RawEvent::new(id, "Travel to Lebanon - Single Entry", at).with_identity("42", "7", "9")
    }

    #[test]
    fn test_record_ignores_duplicate_ids() {
        let mut ledger = SalesLedger::new();
        assert_eq!(ledger.record(&[ttl_event("a", "2026-01-01")]), 1);
        assert_eq!(
            ledger.record(&[ttl_event("a", "2026-01-02"), ttl_event("b", "2026-01-03")]),
            1
        );
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.identity_count(), 1);

        let key = IdentityKey::new(ServiceKey::TtlSingle, "42", "7", "9");
        assert_eq!(ledger.events_for(&key).len(), 2);
    }

    #[test]
    fn test_redelivered_id_with_new_identity_is_ignored() {
        let mut ledger = SalesLedger::new();
        ledger.record(&[ttl_event("a", "2026-01-01")]);

        let corrected = RawEvent::new("a", "Travel to Lebanon - Single Entry", "2026-01-01")
            .with_identity("43", "7", "9");
        assert_eq!(ledger.record(&[corrected]), 0);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.identity_count(), 1);

        let unknown = RawEvent::new("a", "Salary Dispute", "2026-01-01");
        assert_eq!(ledger.record(&[unknown.clone(), unknown]), 0);

        let result = ledger.deduplicate();
        assert_eq!(result.total_sales(), 1);
        assert_eq!(result.sales[0].contract_id, "42");
    }

    #[test]
    fn test_ids_with_underscores_keep_separate_buckets() {
        let first = RawEvent::new("x", "OEC", "2026-01-10").with_identity("1_2", "3", "m");
        let second = RawEvent::new("y", "OEC", "2026-01-10").with_identity("1", "2_3", "m");

        let mut ledger = SalesLedger::new();
        assert_eq!(ledger.record(&[first, second]), 2);
        assert_eq!(ledger.identity_count(), 2);

        let key = IdentityKey::new(ServiceKey::Oec, "1", "2_3", "m");
        assert_eq!(ledger.events_for(&key).len(), 1);
        assert_eq!(ledger.events_for(&key)[0].id, "y");

        let result = ledger.deduplicate();
        assert_eq!(result.sales.len(), 2);
        assert_eq!(result.total_sales(), 2);

        let restored = SalesLedger::from_json(&ledger.to_json().unwrap()).unwrap();
        assert_eq!(restored.deduplicate(), result);

        let rebuilt = SalesLedger::from_legacy_sales(&result.sales).deduplicate();
        assert_eq!(rebuilt.total_sales(), 2);
    }

    #[test]
    fn test_unknown_labels_are_kept_unassigned() {
        let mut ledger = SalesLedger::new();
        ledger.record(&[RawEvent::new("x", "Salary Dispute", "2026-01-01")]);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.identity_count(), 0);

        let result = ledger.deduplicate();
        assert!(result.sales.is_empty());
        assert_eq!(result.skipped_events.len(), 1);
    }

    #[test]
    fn test_merge_is_exact_rerun() {
        let history = vec![
            ttl_event("a", "2026-01-01"),
            ttl_event("b", "2026-02-01"),
            ttl_event("c", "2026-05-01"),
        ];
        let batch = vec![ttl_event("d", "2026-06-01"), ttl_event("e", "2026-09-15")];

        let mut ledger = SalesLedger::new();
        ledger.record(&history);
        let merged = ledger.merge_overseas_sales(&batch);

        let all: Vec<RawEvent> = history.into_iter().chain(batch).collect();
        assert_eq!(merged, deduplicate_sales(&all));
        assert_eq!(merged.sales[0].occurrence_count, 5);
        assert_eq!(merged.sales[0].deduplicated_count, 3);
    }

    #[test]
    fn test_legacy_reconstruction_keeps_interior_periods() {
        // Three periods: Jan, May, Sep. First/last reconstruction alone would
        // only see Jan and Sep.
        let original = deduplicate_sales(&[
            ttl_event("a", "2026-01-01"),
            ttl_event("b", "2026-05-01"),
            ttl_event("c", "2026-05-20"),
            ttl_event("d", "2026-09-01"),
        ]);
        assert_eq!(original.sales[0].deduplicated_count, 3);

        let rebuilt = SalesLedger::from_legacy_sales(&original.sales).deduplicate();
        assert_eq!(rebuilt.sales[0].deduplicated_count, 3);
        assert_eq!(rebuilt.sales_by_month, original.sales_by_month);
    }

    #[test]
    fn test_legacy_records_without_periods_use_first_and_last() {
        let mut sales = deduplicate_sales(&[
            ttl_event("a", "2026-01-01"),
            ttl_event("b", "2026-09-01"),
        ])
        .sales;
        sales[0].periods.clear();

        let merged = merge_overseas_sales(&sales, &[ttl_event("c", "2026-10-01")]);
        assert_eq!(merged.sales[0].occurrence_count, 3);
        assert_eq!(merged.sales[0].deduplicated_count, 2);
    }

    #[test]
    fn test_ledger_json_persistence() {
        let mut ledger = SalesLedger::new();
        ledger.record(&[ttl_event("a", "2026-01-01"), ttl_event("b", "2026-02-01")]);

        let json = ledger.to_json().unwrap();
        assert!(json.contains("ttlSingle_42_7_9"));

        let restored = SalesLedger::from_json(&json).unwrap();
        assert_eq!(restored, ledger);
        assert_eq!(restored.deduplicate(), ledger.deduplicate());
    }
}
