use crate::error::{InsightsError, Result};
use crate::schema::ServiceKey;
use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Prices and costs in force from `effective_from` until the next snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub effective_from: NaiveDate,

    /// Fee charged to the customer per sale.
    #[serde(default)]
    pub service_fees: BTreeMap<ServiceKey, f64>,

    /// Direct cost incurred per sale (government fees, couriers, ...).
    #[serde(default)]
    pub unit_costs: BTreeMap<ServiceKey, f64>,

    /// Fixed monthly costs by name (labor, LLM usage, transportation, ...).
    #[serde(default)]
    pub fixed_costs: BTreeMap<String, f64>,
}

impl ConfigSnapshot {
    pub fn new(effective_from: NaiveDate) -> Self {
        Self {
            effective_from,
            service_fees: BTreeMap::new(),
            unit_costs: BTreeMap::new(),
            fixed_costs: BTreeMap::new(),
        }
    }

    pub fn with_service(mut self, service: ServiceKey, fee: f64, unit_cost: f64) -> Self {
        self.service_fees.insert(service, fee);
        self.unit_costs.insert(service, unit_cost);
        self
    }

    pub fn with_fixed_cost(mut self, name: impl Into<String>, monthly: f64) -> Self {
        self.fixed_costs.insert(name.into(), monthly);
        self
    }

    pub fn service_fee(&self, service: ServiceKey) -> f64 {
        self.service_fees.get(&service).copied().unwrap_or(0.0)
    }

    pub fn unit_cost(&self, service: ServiceKey) -> f64 {
        self.unit_costs.get(&service).copied().unwrap_or(0.0)
    }

    pub fn total_fixed_costs(&self) -> f64 {
        self.fixed_costs.values().sum()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |details: String| InsightsError::InvalidConfig {
            effective_from: self.effective_from,
            details,
        };

        for (service, fee) in &self.service_fees {
            if !fee.is_finite() || *fee < 0.0 {
                return Err(invalid(format!("service fee for {} is {}", service, fee)));
            }
        }
        for (service, cost) in &self.unit_costs {
            if !cost.is_finite() || *cost < 0.0 {
                return Err(invalid(format!("unit cost for {} is {}", service, cost)));
            }
        }
        for (name, cost) in &self.fixed_costs {
            if !cost.is_finite() || *cost < 0.0 {
                return Err(invalid(format!("fixed cost '{}' is {}", name, cost)));
            }
        }

        Ok(())
    }
}

/// Effective-dated configuration history. Owned by the caller and passed by
/// reference; lookups are pure. Deserialized stores go through `record`, so
/// they are sorted and validated like built ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredSnapshots")]
pub struct ConfigStore {
    /// Sorted by `effective_from`, at most one snapshot per date.
    snapshots: Vec<ConfigSnapshot>,
}

#[derive(Deserialize)]
struct StoredSnapshots {
    #[serde(default)]
    snapshots: Vec<ConfigSnapshot>,
}

impl TryFrom<StoredSnapshots> for ConfigStore {
    type Error = InsightsError;

    fn try_from(stored: StoredSnapshots) -> Result<Self> {
        let mut store = Self::new();
        for snapshot in stored.snapshots {
            store.record(snapshot)?;
        }
        Ok(store)
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a snapshot, replacing any existing one with the same
    /// `effective_from`.
    pub fn record(&mut self, snapshot: ConfigSnapshot) -> Result<()> {
        if let Err(e) = snapshot.validate() {
            warn!("Rejected configuration snapshot: {}", e);
            return Err(e);
        }

        match self
            .snapshots
            .binary_search_by_key(&snapshot.effective_from, |s| s.effective_from)
        {
            Ok(idx) => self.snapshots[idx] = snapshot,
            Err(idx) => self.snapshots.insert(idx, snapshot),
        }

        Ok(())
    }

    pub fn snapshots(&self) -> &[ConfigSnapshot] {
        &self.snapshots
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Latest snapshot with `effective_from <= date`.
    pub fn resolve(&self, date: NaiveDate) -> Option<&ConfigSnapshot> {
        resolve_snapshot(&self.snapshots, date)
    }

    pub fn resolve_or_err(&self, date: NaiveDate) -> Result<&ConfigSnapshot> {
        self.resolve(date)
            .ok_or(InsightsError::ConfigNotFound(date))
    }

    /// Reads a store from JSON. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(
                "No configuration at {}, starting with an empty store",
                path.display()
            );
            return Ok(Self::new());
        }

        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(path, payload)?;
        Ok(())
    }
}

/// Pure lookup over snapshots sorted by `effective_from`.
pub fn resolve_snapshot(snapshots: &[ConfigSnapshot], date: NaiveDate) -> Option<&ConfigSnapshot> {
    let upper = snapshots.partition_point(|s| s.effective_from <= date);
    upper.checked_sub(1).map(|idx| &snapshots[idx])
}
