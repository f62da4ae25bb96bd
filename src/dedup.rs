use crate::schema::{RawEvent, ServiceKey};
use crate::taxonomy::label_to_service_key;
use crate::utils::{month_key, parse_timestamp, within_calendar_months, SALE_WINDOW_MONTHS};
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Composite identity under which raw events are candidates for the same sale.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityKey {
    pub service: ServiceKey,
    pub contract_id: String,
    pub client_id: String,
    pub maid_id: String,
}

impl IdentityKey {
    pub fn new(
        service: ServiceKey,
        contract_id: &str,
        client_id: &str,
        maid_id: &str,
    ) -> Self {
        Self {
            service,
            contract_id: contract_id.trim().to_string(),
            client_id: client_id.trim().to_string(),
            maid_id: maid_id.trim().to_string(),
        }
    }

    /// `None` when the event's service label is not a known service.
    pub fn for_event(event: &RawEvent) -> Option<Self> {
        let service = label_to_service_key(&event.service_type)?;
        Some(Self::new(
            service,
            &event.contract_id,
            &event.client_id,
            &event.maid_id,
        ))
    }

    /// All three ids blank. Such events still group, one bucket per service.
    pub fn has_empty_identity(&self) -> bool {
        self.contract_id.is_empty() && self.client_id.is_empty() && self.maid_id.is_empty()
    }
}

/// Renders `service_contract_client_maid`. Underscores and backslashes inside
/// ids are backslash-escaped so distinct keys never render the same.
impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.service)?;
        for id in [&self.contract_id, &self.client_id, &self.maid_id] {
            f.write_str("_")?;
            write_escaped_id(f, id)?;
        }
        Ok(())
    }
}

fn write_escaped_id(f: &mut fmt::Formatter<'_>, id: &str) -> fmt::Result {
    for c in id.chars() {
        if c == '_' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalePeriod {
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub member_event_ids: Vec<String>,
}

impl SalePeriod {
    fn open(at: NaiveDateTime, event_id: &str) -> Self {
        Self {
            start_date: at,
            end_date: at,
            member_event_ids: vec![event_id.to_string()],
        }
    }

    fn absorb(&mut self, at: NaiveDateTime, event_id: &str) {
        self.member_event_ids.push(event_id.to_string());
        if at > self.end_date {
            self.end_date = at;
        }
    }
}

/// One record per identity group: how many raw events were seen and how many
/// distinct sales they amount to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverseasSale {
    pub identity_key: String,
    pub service: ServiceKey,
    pub contract_id: String,
    pub client_id: String,
    pub maid_id: String,
    pub first_sale_date: NaiveDateTime,
    pub last_sale_date: NaiveDateTime,
    pub occurrence_count: u32,
    pub deduplicated_count: u32,
    pub related_event_ids: Vec<String>,
    #[serde(default)]
    pub periods: Vec<SalePeriod>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    MissingTimestamp,
    UnknownService,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEvent {
    pub event_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeduplicationResult {
    pub sales: Vec<OverseasSale>,
    /// Distinct sales keyed by the `YYYY-MM` of each period's start.
    pub sales_by_month: BTreeMap<String, u32>,
    pub skipped_events: Vec<SkippedEvent>,
}

impl DeduplicationResult {
    pub fn total_sales(&self) -> u32 {
        self.sales.iter().map(|s| s.deduplicated_count).sum()
    }

    pub fn total_occurrences(&self) -> u32 {
        self.sales.iter().map(|s| s.occurrence_count).sum()
    }

    pub fn find(&self, key: &IdentityKey) -> Option<&OverseasSale> {
        self.sales.iter().find(|s| {
            s.service == key.service
                && s.contract_id == key.contract_id
                && s.client_id == key.client_id
                && s.maid_id == key.maid_id
        })
    }

    /// Distinct sales per service whose period started in `month` (`YYYY-MM`).
    pub fn volumes_by_service(&self, month: &str) -> BTreeMap<ServiceKey, u32> {
        let mut volumes = BTreeMap::new();
        for sale in &self.sales {
            let started = sale
                .periods
                .iter()
                .filter(|p| month_key(p.start_date.date()) == month)
                .count() as u32;
            if started > 0 {
                *volumes.entry(sale.service).or_insert(0) += started;
            }
        }
        volumes
    }

    /// Distinct sales per service whose period started inside `[start, end]`.
    pub fn volumes_between(&self, start: NaiveDate, end: NaiveDate) -> BTreeMap<ServiceKey, u32> {
        let mut volumes = BTreeMap::new();
        for sale in &self.sales {
            let started = sale
                .periods
                .iter()
                .filter(|p| {
                    let day = p.start_date.date();
                    start <= day && day <= end
                })
                .count() as u32;
            if started > 0 {
                *volumes.entry(sale.service).or_insert(0) += started;
            }
        }
        volumes
    }
}

pub struct SaleDeduplicator {
    window_months: u32,
}

impl Default for SaleDeduplicator {
    fn default() -> Self {
        Self::new(SALE_WINDOW_MONTHS)
    }
}

impl SaleDeduplicator {
    pub fn new(window_months: u32) -> Self {
        Self { window_months }
    }

    pub fn deduplicate(&self, events: &[RawEvent]) -> DeduplicationResult {
        let mut groups: BTreeMap<IdentityKey, Vec<(NaiveDateTime, &RawEvent)>> = BTreeMap::new();
        let mut skipped_events = Vec::new();

        for event in events {
            let Some(key) = IdentityKey::for_event(event) else {
                debug!(
                    "Skipping event {}: unknown service label '{}'",
                    event.id, event.service_type
                );
                skipped_events.push(SkippedEvent {
                    event_id: event.id.clone(),
                    reason: SkipReason::UnknownService,
                });
                continue;
            };

            let Some(at) = event.occurred_at.as_deref().and_then(parse_timestamp) else {
                debug!("Skipping event {}: missing or unparseable timestamp", event.id);
                skipped_events.push(SkippedEvent {
                    event_id: event.id.clone(),
                    reason: SkipReason::MissingTimestamp,
                });
                continue;
            };

            groups.entry(key).or_default().push((at, event));
        }

        let mut sales = Vec::with_capacity(groups.len());
        let mut sales_by_month: BTreeMap<String, u32> = BTreeMap::new();

        for (key, mut members) in groups {
            // Stable: equal timestamps keep their input order.
            members.sort_by_key(|(at, _)| *at);

            if key.has_empty_identity() {
                debug!(
                    "Grouping {} events for {} under an empty identity",
                    members.len(),
                    key.service
                );
            }

            let periods = self.build_periods(&members);
            for period in &periods {
                *sales_by_month
                    .entry(month_key(period.start_date.date()))
                    .or_insert(0) += 1;
            }

            if let Some(sale) = self.summarize(&key, &members, periods) {
                sales.push(sale);
            }
        }

        let result = DeduplicationResult {
            sales,
            sales_by_month,
            skipped_events,
        };

        info!(
            "Deduplicated {} raw events into {} sales across {} identities ({} skipped)",
            events.len(),
            result.total_sales(),
            result.sales.len(),
            result.skipped_events.len()
        );

        result
    }

    /// Single pass over chronologically sorted members. Each event joins the
    /// first period (in creation order) whose window covers it; periods are
    /// never merged with each other.
    fn build_periods(&self, members: &[(NaiveDateTime, &RawEvent)]) -> Vec<SalePeriod> {
        let mut periods: Vec<SalePeriod> = Vec::new();

        for (at, event) in members {
            let matching = periods
                .iter_mut()
                .find(|p| within_calendar_months(p.start_date, *at, self.window_months));

            match matching {
                Some(period) => period.absorb(*at, &event.id),
                None => periods.push(SalePeriod::open(*at, &event.id)),
            }
        }

        periods
    }

    fn summarize(
        &self,
        key: &IdentityKey,
        members: &[(NaiveDateTime, &RawEvent)],
        periods: Vec<SalePeriod>,
    ) -> Option<OverseasSale> {
        let first_sale_date = members.first().map(|(at, _)| *at)?;
        let last_sale_date = members.last().map(|(at, _)| *at)?;

        Some(OverseasSale {
            identity_key: key.to_string(),
            service: key.service,
            contract_id: key.contract_id.clone(),
            client_id: key.client_id.clone(),
            maid_id: key.maid_id.clone(),
            first_sale_date,
            last_sale_date,
            occurrence_count: members.len() as u32,
            deduplicated_count: periods.len() as u32,
            related_event_ids: members.iter().map(|(_, e)| e.id.clone()).collect(),
            periods,
        })
    }
}

/// Runs the deduplicator with the standard 3-month sale window.
pub fn deduplicate_sales(events: &[RawEvent]) -> DeduplicationResult {
    SaleDeduplicator::default().deduplicate(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oec_event(id: &str, at: &str) -> RawEvent {
        RawEvent::new(id, "OEC", at).with_identity("1086364", "67890", "12345")
    }

    fn oec_key() -> IdentityKey {
        IdentityKey::new(ServiceKey::Oec, "1086364", "67890", "12345")
    }

    #[test]
    fn test_events_within_three_months_collapse() {
        let events = vec![oec_event("a", "2026-01-10"), oec_event("b", "2026-02-16")];

        let result = deduplicate_sales(&events);
        assert_eq!(result.sales.len(), 1);

        let sale = &result.sales[0];
        assert_eq!(sale.identity_key, "oec_1086364_67890_12345");
        assert_eq!(sale.occurrence_count, 2);
        assert_eq!(sale.deduplicated_count, 1);
        assert_eq!(sale.periods[0].member_event_ids, vec!["a", "b"]);
        assert_eq!(sale.periods[0].end_date.date().to_string(), "2026-02-16");
    }

    #[test]
    fn test_event_past_window_starts_new_sale() {
        let events = vec![
            oec_event("a", "2026-01-10"),
            oec_event("b", "2026-02-16"),
            oec_event("c", "2026-06-01"),
        ];

        let result = deduplicate_sales(&events);
        let sale = result.find(&oec_key()).unwrap();
        assert_eq!(sale.occurrence_count, 3);
        assert_eq!(sale.deduplicated_count, 2);
        assert_eq!(result.sales_by_month.get("2026-01"), Some(&1));
        assert_eq!(result.sales_by_month.get("2026-06"), Some(&1));
        assert_eq!(result.sales_by_month.get("2026-02"), None);
    }

    #[test]
    fn test_window_is_anchored_on_period_start() {
        // Each event is within 3 months of the previous one, but the third is
        // more than 3 months after the period start.
        let events = vec![
            oec_event("a", "2026-01-01"),
            oec_event("b", "2026-03-15"),
            oec_event("c", "2026-05-20"),
        ];

        let result = deduplicate_sales(&events);
        let sale = &result.sales[0];
        assert_eq!(sale.deduplicated_count, 2);
        assert_eq!(sale.periods[0].member_event_ids, vec!["a", "b"]);
        assert_eq!(sale.periods[1].member_event_ids, vec!["c"]);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let events = vec![
            oec_event("c", "2026-06-01"),
            oec_event("a", "2026-01-10"),
            oec_event("b", "2026-02-16"),
        ];

        let sale = &deduplicate_sales(&events).sales[0];
        assert_eq!(sale.related_event_ids, vec!["a", "b", "c"]);
        assert_eq!(sale.first_sale_date.date().to_string(), "2026-01-10");
        assert_eq!(sale.last_sale_date.date().to_string(), "2026-06-01");
        assert_eq!(sale.deduplicated_count, 2);
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let events = vec![
            oec_event("second", "2026-01-10 10:00:00"),
            oec_event("first", "2026-01-10 10:00:00"),
        ];

        let sale = &deduplicate_sales(&events).sales[0];
        assert_eq!(sale.related_event_ids, vec!["second", "first"]);
        assert_eq!(sale.deduplicated_count, 1);
    }

    #[test]
    fn test_services_and_identities_group_separately() {
        let events = vec![
            oec_event("a", "2026-01-10"),
            RawEvent::new("b", "OWWA Registration", "2026-01-10")
                .with_identity("1086364", "67890", "12345"),
            RawEvent::new("c", "OEC", "2026-01-10").with_identity("999", "67890", "12345"),
        ];

        let result = deduplicate_sales(&events);
        assert_eq!(result.sales.len(), 3);
        assert_eq!(result.total_sales(), 3);
        assert_eq!(result.sales_by_month.get("2026-01"), Some(&3));
    }

    #[test]
    fn test_missing_timestamps_and_unknown_labels_are_skipped() {
        let mut undated = oec_event("undated", "");
        undated.occurred_at = None;

        let events = vec![
            oec_event("a", "2026-01-10"),
            undated,
            oec_event("garbled", "sometime in March"),
            RawEvent::new("x", "Salary Dispute", "2026-01-10"),
        ];

        let result = deduplicate_sales(&events);
        assert_eq!(result.sales.len(), 1);
        assert_eq!(result.sales[0].occurrence_count, 1);
        assert_eq!(result.skipped_events.len(), 3);
        assert!(result
            .skipped_events
            .iter()
            .any(|s| s.event_id == "x" && s.reason == SkipReason::UnknownService));
        assert!(result
            .skipped_events
            .iter()
            .any(|s| s.event_id == "undated" && s.reason == SkipReason::MissingTimestamp));
    }

    #[test]
    fn test_empty_identity_forms_degenerate_group() {
        let events = vec![
            RawEvent::new("a", "OEC", "2026-01-10"),
            RawEvent::new("b", "OEC", "2026-01-20"),
        ];

        let result = deduplicate_sales(&events);
        assert_eq!(result.sales.len(), 1);
        assert_eq!(result.sales[0].identity_key, "oec___");
        assert_eq!(result.sales[0].deduplicated_count, 1);
    }

    #[test]
    fn test_identity_rendering_escapes_separators() {
        let left = IdentityKey::new(ServiceKey::Oec, "1_2", "3", "4");
        let right = IdentityKey::new(ServiceKey::Oec, "1", "2_3", "4");
        assert_eq!(left.to_string(), "oec_1\\_2_3_4");
        assert_eq!(right.to_string(), "oec_1_2\\_3_4");
        assert_ne!(left.to_string(), right.to_string());

        let slashed = IdentityKey::new(ServiceKey::Oec, "1\\", "_2", "");
        assert_eq!(slashed.to_string(), "oec_1\\\\_\\_2_");

        let events = vec![
            RawEvent::new("x", "OEC", "2026-01-10").with_identity("1_2", "3", "4"),
            RawEvent::new("x", "OEC", "2026-01-10").with_identity("1", "2_3", "4"),
        ];
        let result = deduplicate_sales(&events);
        assert_eq!(result.sales.len(), 2);
        assert_eq!(result.find(&left).map(|s| s.client_id.as_str()), Some("3"));
        assert_eq!(result.find(&right).map(|s| s.client_id.as_str()), Some("2_3"));
    }

    #[test]
    fn test_empty_input_yields_empty_result() {
        let result = deduplicate_sales(&[]);
        assert!(result.sales.is_empty());
        assert!(result.sales_by_month.is_empty());
        assert_eq!(result.total_sales(), 0);
    }

    #[test]
    fn test_volumes_by_service_counts_period_starts() {
        let events = vec![
            oec_event("a", "2026-01-10"),
            oec_event("b", "2026-02-16"),
            oec_event("c", "2026-06-01"),
            RawEvent::new("d", "Travel to Jordan", "2026-01-25").with_identity("55", "66", "77"),
        ];

        let result = deduplicate_sales(&events);
        let january = result.volumes_by_service("2026-01");
        assert_eq!(january.get(&ServiceKey::Oec), Some(&1));
        assert_eq!(january.get(&ServiceKey::Ttj), Some(&1));

        let february = result.volumes_by_service("2026-02");
        assert!(february.is_empty());

        let h1 = result.volumes_between(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
        );
        assert_eq!(h1.get(&ServiceKey::Oec), Some(&2));
    }

    #[test]
    fn test_custom_window_length() {
        let events = vec![oec_event("a", "2026-01-10"), oec_event("b", "2026-02-16")];

        let result = SaleDeduplicator::new(1).deduplicate(&events);
        assert_eq!(result.sales[0].deduplicated_count, 2);
    }
}
