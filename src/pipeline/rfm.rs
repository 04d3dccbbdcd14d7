//! RFM scoring and segment assignment
//!
//! Each axis is bucketed into quintiles independently (see [`crate::pipeline::quantile`]).
//! Recency is reversed so that recent customers score 5. The three scores
//! form a code `100*R + 10*F + M` that is looked up in a fixed table of all
//! 125 codes.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::quantile::quantile_scores;

/// Which signal drives the frequency score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrequencyAxis {
    /// Order count when it varies across customers, delivery speed otherwise
    #[default]
    Auto,
    Orders,
    DeliverySpeed,
}

impl fmt::Display for FrequencyAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrequencyAxis::Auto => write!(f, "auto"),
            FrequencyAxis::Orders => write!(f, "orders"),
            FrequencyAxis::DeliverySpeed => write!(f, "delivery-speed"),
        }
    }
}

impl FromStr for FrequencyAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(FrequencyAxis::Auto),
            "orders" | "order-count" => Ok(FrequencyAxis::Orders),
            "delivery-speed" | "delivery_speed" | "delivery" => Ok(FrequencyAxis::DeliverySpeed),
            _ => Err(format!(
                "Invalid frequency axis: '{}'. Use 'auto', 'orders' or 'delivery-speed'",
                s
            )),
        }
    }
}

/// The signal actually used for the frequency score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyBasis {
    OrderCount,
    DeliverySpeed,
}

/// Per-customer inputs to RFM scoring
#[derive(Debug, Clone, PartialEq)]
pub struct RfmInput {
    pub recency_days: i64,
    pub orders: usize,
    pub revenue: f64,
    pub avg_delivery_days: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RfmScore {
    pub recency: u8,
    pub frequency: u8,
    pub monetary: u8,
}

impl RfmScore {
    pub fn code(&self) -> u16 {
        u16::from(self.recency) * 100 + u16::from(self.frequency) * 10 + u16::from(self.monetary)
    }
}

const NEUTRAL_SCORE: u8 = 3;

/// Score every customer on the three axes
pub fn score_rfm(inputs: &[RfmInput], axis: FrequencyAxis) -> (Vec<RfmScore>, FrequencyBasis) {
    let recency: Vec<f64> = inputs.iter().map(|i| i.recency_days as f64).collect();
    let monetary: Vec<f64> = inputs.iter().map(|i| i.revenue).collect();
    let orders: Vec<f64> = inputs.iter().map(|i| i.orders as f64).collect();

    let basis = match axis {
        FrequencyAxis::Orders => FrequencyBasis::OrderCount,
        FrequencyAxis::DeliverySpeed => FrequencyBasis::DeliverySpeed,
        FrequencyAxis::Auto => {
            let varies = orders.windows(2).any(|w| w[0] != w[1]);
            if varies {
                FrequencyBasis::OrderCount
            } else {
                FrequencyBasis::DeliverySpeed
            }
        }
    };

    let recency_scores: Vec<u8> = quantile_scores(&recency, 5)
        .into_iter()
        .map(|b| 6 - b)
        .collect();
    let monetary_scores = quantile_scores(&monetary, 5);
    let frequency_scores = match basis {
        FrequencyBasis::OrderCount => quantile_scores(&orders, 5),
        FrequencyBasis::DeliverySpeed => delivery_speed_scores(inputs),
    };

    let scores = recency_scores
        .into_iter()
        .zip(frequency_scores)
        .zip(monetary_scores)
        .map(|((recency, frequency), monetary)| RfmScore {
            recency,
            frequency,
            monetary,
        })
        .collect();
    (scores, basis)
}

/// Faster average delivery scores higher; customers without deliveries get 3
fn delivery_speed_scores(inputs: &[RfmInput]) -> Vec<u8> {
    let known: Vec<f64> = inputs.iter().filter_map(|i| i.avg_delivery_days).collect();
    let known_scores = quantile_scores(&known, 5);
    let mut known_iter = known_scores.into_iter();
    inputs
        .iter()
        .map(|i| match i.avg_delivery_days {
            Some(_) => known_iter.next().map(|b| 6 - b).unwrap_or(NEUTRAL_SCORE),
            None => NEUTRAL_SCORE,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Segment {
    Champions,
    #[serde(rename = "Loyal Customers")]
    LoyalCustomers,
    #[serde(rename = "New Customers")]
    NewCustomers,
    #[serde(rename = "Potential Loyalists")]
    PotentialLoyalists,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(rename = "Cannot Lose Them")]
    CannotLoseThem,
    Promising,
    Lost,
    Others,
}

impl Segment {
    pub const ALL: [Segment; 9] = [
        Segment::Champions,
        Segment::LoyalCustomers,
        Segment::NewCustomers,
        Segment::PotentialLoyalists,
        Segment::AtRisk,
        Segment::CannotLoseThem,
        Segment::Promising,
        Segment::Lost,
        Segment::Others,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Segment::Champions => "Champions",
            Segment::LoyalCustomers => "Loyal Customers",
            Segment::NewCustomers => "New Customers",
            Segment::PotentialLoyalists => "Potential Loyalists",
            Segment::AtRisk => "At Risk",
            Segment::CannotLoseThem => "Cannot Lose Them",
            Segment::Promising => "Promising",
            Segment::Lost => "Lost",
            Segment::Others => "Others",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// First matching rule wins
const fn classify(r: u8, f: u8, m: u8) -> Segment {
    if r >= 4 && f >= 4 && m >= 4 {
        Segment::Champions
    } else if r >= 3 && f >= 3 && m >= 3 {
        Segment::LoyalCustomers
    } else if r >= 4 && f <= 2 {
        Segment::NewCustomers
    } else if r >= 3 && f >= 3 && m <= 2 {
        Segment::PotentialLoyalists
    } else if r <= 2 && f >= 3 && m >= 3 {
        Segment::AtRisk
    } else if r <= 2 && f <= 2 && m >= 3 {
        Segment::CannotLoseThem
    } else if r >= 3 && f <= 2 && m <= 2 {
        Segment::Promising
    } else if r <= 2 && f <= 2 && m <= 2 {
        Segment::Lost
    } else {
        Segment::Others
    }
}

const fn build_segment_table() -> [Segment; 125] {
    let mut table = [Segment::Others; 125];
    let mut i = 0;
    while i < 125 {
        let r = (i / 25) as u8 + 1;
        let f = ((i / 5) % 5) as u8 + 1;
        let m = (i % 5) as u8 + 1;
        table[i] = classify(r, f, m);
        i += 1;
    }
    table
}

/// Segment of every valid code, indexed by `(R-1)*25 + (F-1)*5 + (M-1)`
pub const SEGMENT_TABLE: [Segment; 125] = build_segment_table();

/// Look up the segment of a score; out-of-range scores fall to `Others`
pub fn segment_for(score: RfmScore) -> Segment {
    let valid = |s: u8| (1..=5).contains(&s);
    if !(valid(score.recency) && valid(score.frequency) && valid(score.monetary)) {
        return Segment::Others;
    }
    let index = usize::from(score.recency - 1) * 25
        + usize::from(score.frequency - 1) * 5
        + usize::from(score.monetary - 1);
    SEGMENT_TABLE[index]
}

/// Look up a three-digit code such as `545`
pub fn segment_for_code(code: u16) -> Segment {
    segment_for(RfmScore {
        recency: (code / 100) as u8,
        frequency: ((code / 10) % 10) as u8,
        monetary: (code % 10) as u8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_rules() {
        assert_eq!(segment_for_code(555), Segment::Champions);
        assert_eq!(segment_for_code(333), Segment::LoyalCustomers);
        assert_eq!(segment_for_code(515), Segment::NewCustomers);
        assert_eq!(segment_for_code(531), Segment::PotentialLoyalists);
        assert_eq!(segment_for_code(133), Segment::AtRisk);
        assert_eq!(segment_for_code(215), Segment::CannotLoseThem);
        assert_eq!(segment_for_code(311), Segment::Promising);
        assert_eq!(segment_for_code(111), Segment::Lost);
        assert_eq!(segment_for_code(231), Segment::Others);
    }

    #[test]
    fn test_invalid_codes_are_others() {
        assert_eq!(segment_for_code(0), Segment::Others);
        assert_eq!(segment_for_code(615), Segment::Others);
        assert_eq!(segment_for_code(506), Segment::Others);
    }

    #[test]
    fn test_code_layout() {
        let s = RfmScore {
            recency: 4,
            frequency: 2,
            monetary: 5,
        };
        assert_eq!(s.code(), 425);
    }

    #[test]
    fn test_frequency_axis_parse() {
        assert_eq!("auto".parse::<FrequencyAxis>().unwrap(), FrequencyAxis::Auto);
        assert_eq!("ORDERS".parse::<FrequencyAxis>().unwrap(), FrequencyAxis::Orders);
        assert_eq!(
            "delivery-speed".parse::<FrequencyAxis>().unwrap(),
            FrequencyAxis::DeliverySpeed
        );
        assert!("often".parse::<FrequencyAxis>().is_err());
    }
}
