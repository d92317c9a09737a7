//! Fixed product and facility catalog
//!
//! Depositors choose a savings product, wholesale lenders choose a funding
//! facility. Each maps to a maturity bucket used by the liquidity model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Participant role, fixed at join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Depositor,
    Wholesale,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Depositor => write!(f, "depositor"),
            Role::Wholesale => write!(f, "wholesale"),
        }
    }
}

/// Tenor band for assets and liabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaturityBucket {
    #[serde(rename = "0-3m")]
    ZeroToThreeMonths,
    #[serde(rename = "3-12m")]
    ThreeToTwelveMonths,
    #[serde(rename = "12-36m")]
    TwelveToThirtySixMonths,
    #[serde(rename = "other")]
    Other,
}

impl MaturityBucket {
    pub const ALL: [MaturityBucket; 4] = [
        MaturityBucket::ZeroToThreeMonths,
        MaturityBucket::ThreeToTwelveMonths,
        MaturityBucket::TwelveToThirtySixMonths,
        MaturityBucket::Other,
    ];

    /// Label used in the gap table (the open-ended bucket reads `36m+`)
    pub fn gap_label(self) -> &'static str {
        match self {
            MaturityBucket::ZeroToThreeMonths => "0-3m",
            MaturityBucket::ThreeToTwelveMonths => "3-12m",
            MaturityBucket::TwelveToThirtySixMonths => "12-36m",
            MaturityBucket::Other => "36m+",
        }
    }
}

/// Amounts (pence) per maturity bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketAmounts {
    pub zero_to_three: i64,
    pub three_to_twelve: i64,
    pub twelve_to_thirty_six: i64,
    pub other: i64,
}

impl BucketAmounts {
    pub fn get(&self, bucket: MaturityBucket) -> i64 {
        match bucket {
            MaturityBucket::ZeroToThreeMonths => self.zero_to_three,
            MaturityBucket::ThreeToTwelveMonths => self.three_to_twelve,
            MaturityBucket::TwelveToThirtySixMonths => self.twelve_to_thirty_six,
            MaturityBucket::Other => self.other,
        }
    }

    pub fn add(&mut self, bucket: MaturityBucket, amount: i64) {
        match bucket {
            MaturityBucket::ZeroToThreeMonths => self.zero_to_three += amount,
            MaturityBucket::ThreeToTwelveMonths => self.three_to_twelve += amount,
            MaturityBucket::TwelveToThirtySixMonths => self.twelve_to_thirty_six += amount,
            MaturityBucket::Other => self.other += amount,
        }
    }

    pub fn total(&self) -> i64 {
        self.zero_to_three + self.three_to_twelve + self.twelve_to_thirty_six + self.other
    }
}

/// Depositor savings product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Product {
    #[serde(rename = "current")]
    Current,
    #[serde(rename = "notice_3m")]
    Notice3m,
    #[serde(rename = "fixed_1y")]
    Fixed1y,
    #[serde(rename = "bond_3y")]
    Bond3y,
    /// Phase-2 upgrade only; never offered in phase 1
    #[serde(rename = "premier_142")]
    Premier142,
}

impl Product {
    pub const ALL: [Product; 5] = [
        Product::Current,
        Product::Notice3m,
        Product::Fixed1y,
        Product::Bond3y,
        Product::Premier142,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Product::Current => "current",
            Product::Notice3m => "notice_3m",
            Product::Fixed1y => "fixed_1y",
            Product::Bond3y => "bond_3y",
            Product::Premier142 => "premier_142",
        }
    }

    pub fn from_id(id: &str) -> Option<Product> {
        Product::ALL.into_iter().find(|p| p.id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            Product::Current => "Current Account",
            Product::Notice3m => "3-Month Notice",
            Product::Fixed1y => "1-Year Fixed",
            Product::Bond3y => "3-Year Premier Bond",
            Product::Premier142 => "Premier Bond 14.2%",
        }
    }

    /// Annual rate in percent
    pub fn rate_pct(self) -> f64 {
        match self {
            Product::Current => 2.1,
            Product::Notice3m => 5.4,
            Product::Fixed1y => 7.2,
            Product::Bond3y => 9.8,
            Product::Premier142 => 14.2,
        }
    }

    pub fn bucket(self) -> MaturityBucket {
        match self {
            Product::Current | Product::Notice3m => MaturityBucket::ZeroToThreeMonths,
            Product::Fixed1y => MaturityBucket::ThreeToTwelveMonths,
            Product::Bond3y | Product::Premier142 => MaturityBucket::TwelveToThirtySixMonths,
        }
    }

    pub fn lock_risk(self) -> &'static str {
        match self {
            Product::Current => "low",
            Product::Notice3m | Product::Fixed1y => "medium",
            Product::Bond3y => "high",
            Product::Premier142 => "extreme",
        }
    }

    /// Whether the product can be picked during phase-1 setup
    pub fn selectable_in_setup(self) -> bool {
        self != Product::Premier142
    }
}

/// Wholesale funding facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facility {
    #[serde(rename = "overnight")]
    Overnight,
    #[serde(rename = "week_1")]
    Week1,
    #[serde(rename = "month_3")]
    Month3,
    #[serde(rename = "year_1")]
    Year1,
}

impl Facility {
    pub const ALL: [Facility; 4] = [
        Facility::Overnight,
        Facility::Week1,
        Facility::Month3,
        Facility::Year1,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Facility::Overnight => "overnight",
            Facility::Week1 => "week_1",
            Facility::Month3 => "month_3",
            Facility::Year1 => "year_1",
        }
    }

    pub fn from_id(id: &str) -> Option<Facility> {
        Facility::ALL.into_iter().find(|f| f.id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            Facility::Overnight => "Overnight Repo",
            Facility::Week1 => "1-Week Facility",
            Facility::Month3 => "3-Month Facility",
            Facility::Year1 => "12-Month Facility",
        }
    }

    /// Spread over the reference rate, in basis points
    pub fn spread_bps(self) -> u32 {
        match self {
            Facility::Overnight => 8,
            Facility::Week1 => 12,
            Facility::Month3 => 18,
            Facility::Year1 => 28,
        }
    }

    pub fn bucket(self) -> MaturityBucket {
        match self {
            Facility::Year1 => MaturityBucket::ThreeToTwelveMonths,
            _ => MaturityBucket::ZeroToThreeMonths,
        }
    }
}

/// Hedge tier a depositor can buy in phase 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HedgeLevel {
    Basic,
    Full,
}

impl HedgeLevel {
    /// Premium as a fraction of principal
    pub fn premium_rate(self) -> f64 {
        match self {
            HedgeLevel::Basic => 0.005,
            HedgeLevel::Full => 0.012,
        }
    }
}
