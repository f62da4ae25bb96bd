use crate::config::ConfigSnapshot;
use crate::schema::ServiceKey;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePnlLine {
    pub volume: u32,
    pub revenue: f64,
    pub direct_cost: f64,
    pub gross_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPnl {
    pub month: String,
    pub lines: BTreeMap<ServiceKey, ServicePnlLine>,
    pub total_revenue: f64,
    pub total_direct_cost: f64,
    pub gross_profit: f64,
    pub fixed_costs: f64,
    pub net_profit: f64,
}

impl MonthlyPnl {
    /// Net profit over revenue as a percentage, 0 without revenue.
    pub fn net_margin(&self) -> f64 {
        if self.total_revenue == 0.0 {
            0.0
        } else {
            self.net_profit / self.total_revenue * 100.0
        }
    }
}

/// Volumes times fees and unit costs, less the month's fixed costs. Services
/// the snapshot does not price contribute zero revenue and zero cost.
pub fn compute_monthly_pnl(
    month: &str,
    volumes: &BTreeMap<ServiceKey, u32>,
    snapshot: &ConfigSnapshot,
) -> MonthlyPnl {
    let mut lines = BTreeMap::new();
    let mut total_revenue = 0.0;
    let mut total_direct_cost = 0.0;

    for (service, volume) in volumes {
        let revenue = *volume as f64 * snapshot.service_fee(*service);
        let direct_cost = *volume as f64 * snapshot.unit_cost(*service);

        total_revenue += revenue;
        total_direct_cost += direct_cost;

        lines.insert(
            *service,
            ServicePnlLine {
                volume: *volume,
                revenue,
                direct_cost,
                gross_profit: revenue - direct_cost,
            },
        );
    }

    let gross_profit = total_revenue - total_direct_cost;
    let fixed_costs = snapshot.total_fixed_costs();

    debug!(
        "P&L {}: revenue {:.2}, direct {:.2}, fixed {:.2}",
        month, total_revenue, total_direct_cost, fixed_costs
    );

    MonthlyPnl {
        month: month.to_string(),
        lines,
        total_revenue,
        total_direct_cost,
        gross_profit,
        fixed_costs,
        net_profit: gross_profit - fixed_costs,
    }
}
