use crate::schema::{
    ComplaintRecord, EvaluationWindow, PaymentRecord, Prospect, ServiceCategory, ServiceKey,
};
use crate::taxonomy::label_to_service_key;
use crate::utils::parse_date;
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupEntry {
    pub service: ServiceKey,
    pub label: String,
    pub date: NaiveDate,
}

/// Entries indexed by each identity id so a prospect matches on whichever of
/// contract, client or maid it carries.
#[derive(Debug, Clone, Default)]
struct IdentityIndex {
    entries: Vec<LookupEntry>,
    by_contract: HashMap<String, Vec<usize>>,
    by_client: HashMap<String, Vec<usize>>,
    by_maid: HashMap<String, Vec<usize>>,
}

impl IdentityIndex {
    fn insert(&mut self, contract_id: &str, client_id: &str, maid_id: &str, entry: LookupEntry) {
        let idx = self.entries.len();
        self.entries.push(entry);

        for (map, id) in [
            (&mut self.by_contract, contract_id),
            (&mut self.by_client, client_id),
            (&mut self.by_maid, maid_id),
        ] {
            let id = id.trim();
            if !id.is_empty() {
                map.entry(id.to_string()).or_default().push(idx);
            }
        }
    }

    fn matching(&self, prospect: &Prospect, category: ServiceCategory) -> Vec<&LookupEntry> {
        let mut hits = BTreeSet::new();

        for (map, id) in [
            (&self.by_contract, prospect.contract_id.as_deref()),
            (&self.by_client, prospect.client_id.as_deref()),
            (&self.by_maid, prospect.maid_id.as_deref()),
        ] {
            let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
                continue;
            };
            if let Some(indices) = map.get(id) {
                hits.extend(indices.iter().copied());
            }
        }

        hits.into_iter()
            .map(|idx| &self.entries[idx])
            .filter(|entry| category.contains(entry.service))
            .collect()
    }
}

/// Received payments for the evaluation window, by identity.
#[derive(Debug, Clone, Default)]
pub struct PaymentLookup {
    index: IdentityIndex,
}

impl PaymentLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps payments with status `received`, a parseable date inside the
    /// window and a known service label.
    pub fn from_records(records: &[PaymentRecord], window: EvaluationWindow) -> Self {
        let mut lookup = Self::new();
        let mut ignored = 0usize;

        for record in records {
            if !record.is_received() {
                ignored += 1;
                continue;
            }
            let Some(date) = record.date_of_payment.as_deref().and_then(parse_date) else {
                ignored += 1;
                continue;
            };
            if !window.contains(date) {
                ignored += 1;
                continue;
            }
            let Some(service) = label_to_service_key(&record.payment_type) else {
                debug!("Ignoring payment with unknown type '{}'", record.payment_type);
                ignored += 1;
                continue;
            };

            lookup.insert(
                &record.contract_id,
                &record.client_id,
                &record.maid_id,
                service,
                &record.payment_type,
                date,
            );
        }

        debug!(
            "Payment lookup for {}..{}: {} entries, {} records ignored",
            window.start,
            window.end,
            lookup.len(),
            ignored
        );

        lookup
    }

    pub fn insert(
        &mut self,
        contract_id: &str,
        client_id: &str,
        maid_id: &str,
        service: ServiceKey,
        label: &str,
        date: NaiveDate,
    ) {
        self.index.insert(
            contract_id,
            client_id,
            maid_id,
            LookupEntry {
                service,
                label: label.to_string(),
                date,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.index.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.entries.is_empty()
    }

    pub fn payments_for(&self, prospect: &Prospect, category: ServiceCategory) -> Vec<&LookupEntry> {
        self.index.matching(prospect, category)
    }
}

/// Complaints raised in the evaluation window, by identity.
#[derive(Debug, Clone, Default)]
pub struct ComplaintLookup {
    index: IdentityIndex,
}

impl ComplaintLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: &[ComplaintRecord], window: EvaluationWindow) -> Self {
        let mut lookup = Self::new();
        let mut ignored = 0usize;

        for record in records {
            let Some(date) = record.creation_date.as_deref().and_then(parse_date) else {
                ignored += 1;
                continue;
            };
            if !window.contains(date) {
                ignored += 1;
                continue;
            }
            let Some(service) = label_to_service_key(&record.complaint_type) else {
                debug!(
                    "Ignoring complaint with unknown type '{}'",
                    record.complaint_type
                );
                ignored += 1;
                continue;
            };

            lookup.insert(
                &record.contract_id,
                &record.client_id,
                &record.housemaid_id,
                service,
                &record.complaint_type,
                date,
            );
        }

        debug!(
            "Complaint lookup for {}..{}: {} entries, {} records ignored",
            window.start,
            window.end,
            lookup.len(),
            ignored
        );

        lookup
    }

    pub fn insert(
        &mut self,
        contract_id: &str,
        client_id: &str,
        maid_id: &str,
        service: ServiceKey,
        label: &str,
        date: NaiveDate,
    ) {
        self.index.insert(
            contract_id,
            client_id,
            maid_id,
            LookupEntry {
                service,
                label: label.to_string(),
                date,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.index.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.entries.is_empty()
    }

    pub fn complaints_for(
        &self,
        prospect: &Prospect,
        category: ServiceCategory,
    ) -> Vec<&LookupEntry> {
        self.index.matching(prospect, category)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionCheck {
    pub conversation_id: String,
    pub contract_id: String,
    pub client_id: Option<String>,
    pub maid_id: Option<String>,
    pub category: ServiceCategory,
    pub confidence: f64,
    pub converted: bool,
    pub has_complaint: bool,
    pub complaint_types: Vec<String>,
    pub complaint_dates: Vec<NaiveDate>,
    pub payment_dates: Vec<NaiveDate>,
}

impl ConversionCheck {
    pub fn is_clean_conversion(&self) -> bool {
        self.converted && !self.has_complaint
    }
}

/// One check per prospect per category it is interested in, converted or not.
/// Prospects without a contract id are skipped. Complaints and payments are
/// matched independently: any complaint for the category in the window marks
/// the check, whether or not it relates to the payment.
pub fn check_conversions(
    prospects: &[Prospect],
    payments: &PaymentLookup,
    complaints: &ComplaintLookup,
) -> Vec<ConversionCheck> {
    let mut checks = Vec::new();
    let mut skipped = 0usize;

    for prospect in prospects {
        let Some(contract_id) = prospect
            .contract_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            skipped += 1;
            continue;
        };

        for category in prospect.interested_categories() {
            let complaint_hits = complaints.complaints_for(prospect, category);
            let payment_hits = payments.payments_for(prospect, category);

            let mut complaint_types: Vec<String> = Vec::new();
            for hit in &complaint_hits {
                if !complaint_types.contains(&hit.label) {
                    complaint_types.push(hit.label.clone());
                }
            }

            checks.push(ConversionCheck {
                conversation_id: prospect.conversation_id.clone(),
                contract_id: contract_id.to_string(),
                client_id: prospect.client_id.clone(),
                maid_id: prospect.maid_id.clone(),
                category,
                confidence: prospect.signal(category).confidence,
                converted: !payment_hits.is_empty(),
                has_complaint: !complaint_hits.is_empty(),
                complaint_types,
                complaint_dates: distinct_dates(&complaint_hits),
                payment_dates: distinct_dates(&payment_hits),
            });
        }
    }

    if skipped > 0 {
        debug!("Skipped {} prospects without a contract id", skipped);
    }

    checks
}

fn distinct_dates(entries: &[&LookupEntry]) -> Vec<NaiveDate> {
    entries
        .iter()
        .map(|e| e.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionRates {
    /// Percentage of prospects that paid.
    pub overall: f64,
    /// Percentage of prospects that paid without a complaint.
    pub clean: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConversionStats {
    pub prospects: u32,
    pub conversions: u32,
    pub with_complaints: u32,
    pub clean_conversions: u32,
    pub rates: ConversionRates,
}

impl ServiceConversionStats {
    fn record(&mut self, check: &ConversionCheck) {
        self.prospects += 1;
        if check.converted {
            self.conversions += 1;
        }
        if check.has_complaint {
            self.with_complaints += 1;
        }
        if check.is_clean_conversion() {
            self.clean_conversions += 1;
        }
    }

    fn recompute_rates(&mut self) {
        self.rates = if self.prospects == 0 {
            ConversionRates::default()
        } else {
            let prospects = self.prospects as f64;
            ConversionRates {
                overall: self.conversions as f64 / prospects * 100.0,
                clean: self.clean_conversions as f64 / prospects * 100.0,
            }
        };
    }
}

/// Per-category conversion counts. Every category is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanConversionStats {
    pub services: BTreeMap<ServiceCategory, ServiceConversionStats>,
}

impl Default for CleanConversionStats {
    fn default() -> Self {
        Self {
            services: ServiceCategory::ALL
                .iter()
                .map(|c| (*c, ServiceConversionStats::default()))
                .collect(),
        }
    }
}

impl CleanConversionStats {
    pub fn get(&self, category: ServiceCategory) -> ServiceConversionStats {
        self.services.get(&category).copied().unwrap_or_default()
    }

    /// Adds another period's counts (e.g. the next day of a range) and
    /// recomputes the rates over the combined counts.
    pub fn absorb(&mut self, other: &CleanConversionStats) {
        for (category, theirs) in &other.services {
            let ours = self.services.entry(*category).or_default();
            ours.prospects += theirs.prospects;
            ours.conversions += theirs.conversions;
            ours.with_complaints += theirs.with_complaints;
            ours.clean_conversions += theirs.clean_conversions;
            ours.recompute_rates();
        }
    }
}

pub fn calculate_clean_conversion_rates(checks: &[ConversionCheck]) -> CleanConversionStats {
    let mut stats = CleanConversionStats::default();

    for check in checks {
        stats.services.entry(check.category).or_default().record(check);
    }

    for service in stats.services.values_mut() {
        service.recompute_rates();
    }

    info!(
        "Clean conversion rates computed from {} checks",
        checks.len()
    );

    stats
}
