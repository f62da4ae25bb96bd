use crate::error::InsightsError;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of service lines sold by the agency.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum ServiceKey {
    #[serde(rename = "oec")]
    #[schemars(description = "Overseas Employment Certificate")]
    Oec,

    #[serde(rename = "owwa")]
    #[schemars(description = "OWWA membership registration")]
    Owwa,

    #[serde(rename = "ttl")]
    #[schemars(description = "Travel to Lebanon visa, entry type not specified")]
    Ttl,

    #[serde(rename = "ttlSingle")]
    TtlSingle,

    #[serde(rename = "ttlDouble")]
    TtlDouble,

    #[serde(rename = "ttlMultiple")]
    TtlMultiple,

    #[serde(rename = "tte")]
    #[schemars(description = "Travel to Egypt visa, entry type not specified")]
    Tte,

    #[serde(rename = "tteSingle")]
    TteSingle,

    #[serde(rename = "tteDouble")]
    TteDouble,

    #[serde(rename = "tteMultiple")]
    TteMultiple,

    #[serde(rename = "ttj")]
    #[schemars(description = "Travel to Jordan visa")]
    Ttj,

    #[serde(rename = "schengen")]
    Schengen,

    #[serde(rename = "gcc")]
    Gcc,

    #[serde(rename = "ethiopianPP")]
    #[schemars(description = "Ethiopian passport renewal")]
    EthiopianPp,

    #[serde(rename = "filipinaPP")]
    #[schemars(description = "Filipina passport renewal")]
    FilipinaPp,
}

impl ServiceKey {
    pub const ALL: [ServiceKey; 15] = [
        ServiceKey::Oec,
        ServiceKey::Owwa,
        ServiceKey::Ttl,
        ServiceKey::TtlSingle,
        ServiceKey::TtlDouble,
        ServiceKey::TtlMultiple,
        ServiceKey::Tte,
        ServiceKey::TteSingle,
        ServiceKey::TteDouble,
        ServiceKey::TteMultiple,
        ServiceKey::Ttj,
        ServiceKey::Schengen,
        ServiceKey::Gcc,
        ServiceKey::EthiopianPp,
        ServiceKey::FilipinaPp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKey::Oec => "oec",
            ServiceKey::Owwa => "owwa",
            ServiceKey::Ttl => "ttl",
            ServiceKey::TtlSingle => "ttlSingle",
            ServiceKey::TtlDouble => "ttlDouble",
            ServiceKey::TtlMultiple => "ttlMultiple",
            ServiceKey::Tte => "tte",
            ServiceKey::TteSingle => "tteSingle",
            ServiceKey::TteDouble => "tteDouble",
            ServiceKey::TteMultiple => "tteMultiple",
            ServiceKey::Ttj => "ttj",
            ServiceKey::Schengen => "schengen",
            ServiceKey::Gcc => "gcc",
            ServiceKey::EthiopianPp => "ethiopianPP",
            ServiceKey::FilipinaPp => "filipinaPP",
        }
    }

    /// The prospect-interest category this service is sold under.
    pub fn category(&self) -> ServiceCategory {
        match self {
            ServiceKey::Oec => ServiceCategory::Oec,
            ServiceKey::Owwa => ServiceCategory::Owwa,
            ServiceKey::EthiopianPp => ServiceCategory::EthiopianPassport,
            ServiceKey::FilipinaPp => ServiceCategory::FilipinaPassport,
            ServiceKey::Ttl
            | ServiceKey::TtlSingle
            | ServiceKey::TtlDouble
            | ServiceKey::TtlMultiple
            | ServiceKey::Tte
            | ServiceKey::TteSingle
            | ServiceKey::TteDouble
            | ServiceKey::TteMultiple
            | ServiceKey::Ttj
            | ServiceKey::Schengen
            | ServiceKey::Gcc => ServiceCategory::TravelVisa,
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKey {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ServiceKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| InsightsError::UnknownServiceKey(s.to_string()))
    }
}

/// Service families a conversation can be classified as interested in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum ServiceCategory {
    Oec,
    Owwa,
    TravelVisa,
    FilipinaPassport,
    EthiopianPassport,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 5] = [
        ServiceCategory::Oec,
        ServiceCategory::Owwa,
        ServiceCategory::TravelVisa,
        ServiceCategory::FilipinaPassport,
        ServiceCategory::EthiopianPassport,
    ];

    /// Every service key that satisfies this category. Travel visa is a union
    /// over all destination and entry-type keys.
    pub fn service_keys(&self) -> &'static [ServiceKey] {
        match self {
            ServiceCategory::Oec => &[ServiceKey::Oec],
            ServiceCategory::Owwa => &[ServiceKey::Owwa],
            ServiceCategory::FilipinaPassport => &[ServiceKey::FilipinaPp],
            ServiceCategory::EthiopianPassport => &[ServiceKey::EthiopianPp],
            ServiceCategory::TravelVisa => &[
                ServiceKey::Ttl,
                ServiceKey::TtlSingle,
                ServiceKey::TtlDouble,
                ServiceKey::TtlMultiple,
                ServiceKey::Tte,
                ServiceKey::TteSingle,
                ServiceKey::TteDouble,
                ServiceKey::TteMultiple,
                ServiceKey::Ttj,
                ServiceKey::Schengen,
                ServiceKey::Gcc,
            ],
        }
    }

    pub fn contains(&self, key: ServiceKey) -> bool {
        key.category() == *self
    }
}

/// A single complaint or to-do row tied to one service occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub id: String,

    #[serde(default)]
    pub contract_id: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub maid_id: String,

    #[schemars(description = "Free-text service or complaint type label")]
    pub service_type: String,

    #[schemars(
        description = "Creation or payment timestamp, e.g. 2026-01-10 09:30:00 or RFC 3339"
    )]
    #[serde(default)]
    pub occurred_at: Option<String>,
}

impl RawEvent {
    pub fn new(
        id: impl Into<String>,
        service_type: impl Into<String>,
        occurred_at: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            contract_id: String::new(),
            client_id: String::new(),
            maid_id: String::new(),
            service_type: service_type.into(),
            occurred_at: Some(occurred_at.into()),
        }
    }

    pub fn with_identity(
        mut self,
        contract_id: impl Into<String>,
        client_id: impl Into<String>,
        maid_id: impl Into<String>,
    ) -> Self {
        self.contract_id = contract_id.into();
        self.client_id = client_id.into();
        self.maid_id = maid_id.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSignal {
    #[serde(default)]
    #[schemars(description = "True when the customer asked about or showed interest in this service")]
    pub is_prospect: bool,

    #[serde(default)]
    #[schemars(description = "Classifier confidence in the range 0.0 to 1.0")]
    pub confidence: f64,

    #[serde(default)]
    #[schemars(
        description = "True when the conversation itself suggests the customer went ahead. Informational only; conversions are taken from payments."
    )]
    pub converted: bool,
}

impl ServiceSignal {
    pub fn interested(confidence: f64) -> Self {
        Self {
            is_prospect: true,
            confidence,
            converted: false,
        }
    }
}

/// A classified conversation. Produced by the external classifier and treated
/// as ground truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Prospect {
    pub conversation_id: String,

    #[serde(default)]
    pub contract_id: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub maid_id: Option<String>,

    #[serde(default)]
    pub oec: ServiceSignal,

    #[serde(default)]
    pub owwa: ServiceSignal,

    #[serde(default)]
    pub travel_visa: ServiceSignal,

    #[serde(default)]
    pub filipina_passport: ServiceSignal,

    #[serde(default)]
    pub ethiopian_passport: ServiceSignal,
}

impl Prospect {
    pub fn signal(&self, category: ServiceCategory) -> &ServiceSignal {
        match category {
            ServiceCategory::Oec => &self.oec,
            ServiceCategory::Owwa => &self.owwa,
            ServiceCategory::TravelVisa => &self.travel_visa,
            ServiceCategory::FilipinaPassport => &self.filipina_passport,
            ServiceCategory::EthiopianPassport => &self.ethiopian_passport,
        }
    }

    pub fn interested_categories(&self) -> Vec<ServiceCategory> {
        ServiceCategory::ALL
            .iter()
            .copied()
            .filter(|c| self.signal(*c).is_prospect)
            .collect()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Prospect)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    #[serde(default)]
    pub contract_id: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub maid_id: String,

    pub payment_type: String,

    pub status: String,

    #[serde(default)]
    pub date_of_payment: Option<String>,

    #[serde(default)]
    pub amount: f64,
}

impl PaymentRecord {
    pub fn is_received(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("received")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintRecord {
    #[serde(default)]
    pub contract_id: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub housemaid_id: String,

    pub complaint_type: String,

    #[serde(default)]
    pub creation_date: Option<String>,
}

/// Closed range of calendar days a lookup is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl EvaluationWindow {
    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if end < start {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
