//! # Sales Conversion Insights
//!
//! Reporting engine behind a visa and employment-certificate services
//! dashboard. It turns raw complaint, to-do and payment rows plus classified
//! conversations into deduplicated sales counts, clean conversion rates and
//! monthly profit and loss.
//!
//! ## Core Concepts
//!
//! - **Identity Key**: service + contract + client + maid. Events sharing one
//!   are candidates for the same sale.
//! - **Sale Period**: a 3-calendar-month window opened by the first event of a
//!   sale. Later events inside it are the same sale; events past it open a new
//!   one.
//! - **Clean Conversion**: a prospect who paid for a service and raised no
//!   complaint for that service in the evaluation window.
//! - **Never Throw**: missing timestamps, missing sources and empty
//!   denominators degrade to skipped events, zero-filled stats and 0% rates.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sales_conversion_insights::*;
//!
//! let events = vec![
//!     RawEvent::new("t-1", "OEC", "2026-01-10").with_identity("1086364", "67890", "12345"),
//!     RawEvent::new("t-2", "OEC", "2026-02-16").with_identity("1086364", "67890", "12345"),
//!     RawEvent::new("t-3", "OEC", "2026-06-01").with_identity("1086364", "67890", "12345"),
//! ];
//!
//! let result = deduplicate_sales(&events);
//! assert_eq!(result.sales[0].occurrence_count, 3);
//! assert_eq!(result.sales[0].deduplicated_count, 2);
//! ```

pub mod config;
pub mod conversion;
pub mod dedup;
pub mod error;
pub mod ledger;
pub mod nps;
pub mod pnl;
pub mod schema;
pub mod taxonomy;
pub mod utils;

pub use config::{resolve_snapshot, ConfigSnapshot, ConfigStore};
pub use conversion::{
    calculate_clean_conversion_rates, check_conversions, CleanConversionStats, ComplaintLookup,
    ConversionCheck, ConversionRates, LookupEntry, PaymentLookup, ServiceConversionStats,
};
pub use dedup::{
    deduplicate_sales, DeduplicationResult, IdentityKey, OverseasSale, SaleDeduplicator,
    SalePeriod, SkipReason, SkippedEvent,
};
pub use error::{InsightsError, Result};
pub use ledger::{merge_overseas_sales, SalesLedger};
pub use nps::NpsSummary;
pub use pnl::{compute_monthly_pnl, MonthlyPnl, ServicePnlLine};
pub use schema::*;
pub use taxonomy::{label_to_service_key, normalize_label};
pub use utils::*;

use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReport {
    pub window: EvaluationWindow,
    pub checks: Vec<ConversionCheck>,
    pub stats: CleanConversionStats,
}

pub struct InsightsProcessor;

impl InsightsProcessor {
    /// Scopes payments and complaints to `window`, checks every prospect and
    /// aggregates the clean conversion stats.
    pub fn conversion_report(
        prospects: &[Prospect],
        payments: &[PaymentRecord],
        complaints: &[ComplaintRecord],
        window: EvaluationWindow,
    ) -> ConversionReport {
        let payment_lookup = PaymentLookup::from_records(payments, window);
        let complaint_lookup = ComplaintLookup::from_records(complaints, window);

        let checks = check_conversions(prospects, &payment_lookup, &complaint_lookup);
        let stats = calculate_clean_conversion_rates(&checks);

        info!(
            "Conversion report {}..{}: {} prospects, {} checks",
            window.start,
            window.end,
            prospects.len(),
            checks.len()
        );

        ConversionReport {
            window,
            checks,
            stats,
        }
    }

    /// Profit and loss for a `YYYY-MM` month, using deduplicated sales that
    /// started in that month and the configuration in force on its first day.
    pub fn monthly_pnl(
        month: &str,
        sales: &DeduplicationResult,
        config: &ConfigStore,
    ) -> Result<MonthlyPnl> {
        let (month_start, _) = parse_month_key(month)?;
        let month = month_key(month_start);
        let snapshot = config.resolve_or_err(month_start)?;
        let volumes = sales.volumes_by_service(&month);

        Ok(compute_monthly_pnl(&month, &volumes, snapshot))
    }
}

pub fn conversion_report(
    prospects: &[Prospect],
    payments: &[PaymentRecord],
    complaints: &[ComplaintRecord],
    window: EvaluationWindow,
) -> ConversionReport {
    InsightsProcessor::conversion_report(prospects, payments, complaints, window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_end_to_end_conversion_report() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let prospects = vec![Prospect {
            conversation_id: "conv-1".to_string(),
            contract_id: Some("1086364".to_string()),
            oec: ServiceSignal::interested(0.95),
            owwa: ServiceSignal::interested(0.6),
            ..Default::default()
        }];

        let payments = vec![PaymentRecord {
            contract_id: "1086364".to_string(),
            client_id: String::new(),
            maid_id: String::new(),
            payment_type: "OEC".to_string(),
            status: "received".to_string(),
            date_of_payment: Some("2026-03-02 11:15:00".to_string()),
            amount: 120.0,
        }];

        let report = conversion_report(
            &prospects,
            &payments,
            &[],
            EvaluationWindow::single_day(date),
        );

        assert_eq!(report.checks.len(), 2);
        let oec = report.stats.get(ServiceCategory::Oec);
        assert_eq!(oec.clean_conversions, 1);
        let owwa = report.stats.get(ServiceCategory::Owwa);
        assert_eq!(owwa.prospects, 1);
        assert_eq!(owwa.conversions, 0);
    }

    #[test]
    fn test_monthly_pnl_requires_config() {
        let result = InsightsProcessor::monthly_pnl(
            "2026-01",
            &DeduplicationResult::default(),
            &ConfigStore::new(),
        );
        assert!(matches!(result, Err(InsightsError::ConfigNotFound(_))));

        let bad_month = InsightsProcessor::monthly_pnl(
            "January",
            &DeduplicationResult::default(),
            &ConfigStore::new(),
        );
        assert!(matches!(bad_month, Err(InsightsError::InvalidMonthKey(_))));
    }

    #[test]
    fn test_monthly_pnl_accepts_unpadded_month() -> Result<()> {
        let sales = deduplicate_sales(&[RawEvent::new("a", "OEC", "2026-01-10")
            .with_identity("1086364", "67890", "12345")]);

        let mut config = ConfigStore::new();
        config.record(
            ConfigSnapshot::new(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
                .with_service(ServiceKey::Oec, 100.0, 0.0),
        )?;

        for month in ["2026-1", " 2026-01", "2026-01"] {
            let pnl = InsightsProcessor::monthly_pnl(month, &sales, &config)?;
            assert_eq!(pnl.month, "2026-01");
            assert_eq!(pnl.lines[&ServiceKey::Oec].volume, 1);
            assert_eq!(pnl.total_revenue, 100.0);
        }
        Ok(())
    }
}
