//! # Pricing Engine
//!
//! Distance-zoned fare calculation.
//!
//! ## Zone Ladder
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  distance (km)   0 ──── 5 ──── 10 ──────── 20 ─────────────────► ∞     │
//! │  zone            │ ≤ 5  │ ≤ 10  │   ≤ 20    │      > 20 (catch-all)    │
//! │  fare (FCFA)     │ 100  │ 150   │   200     │      250                 │
//! │                                                                         │
//! │  Zones are scanned in ascending order; the first zone whose bound is    │
//! │  not exceeded wins. The last zone is unbounded, so every finite        │
//! │  distance matches exactly one zone.                                    │
//! │                                                                         │
//! │  Students pay a fixed fare whatever the distance.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A ladder is validated once when it is built. A malformed ladder is a
//! configuration error and the service refuses to start.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::PricingError;
use crate::money::Money;
use crate::types::Line;
use crate::DEFAULT_STUDENT_PRICE;

/// Zone label reported for student fares.
pub const STUDENT_ZONE_LABEL: &str = "student";

// =============================================================================
// Pricing Zone
// =============================================================================

/// One rung of the ladder. `max_km = None` marks the catch-all zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricingZone {
    pub max_km: Option<f64>,
    pub price: Money,
    /// Display label. Generated from the bounds when absent.
    #[serde(default)]
    pub label: Option<String>,
}

impl PricingZone {
    /// A bounded zone: distances up to and including `max_km`.
    pub fn up_to(max_km: f64, price: Money) -> Self {
        PricingZone {
            max_km: Some(max_km),
            price,
            label: None,
        }
    }

    /// The unbounded top zone.
    pub fn beyond(price: Money) -> Self {
        PricingZone {
            max_km: None,
            price,
            label: None,
        }
    }
}

/// Result of a fare lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceQuote {
    pub price: Money,
    pub zone_label: String,
}

// =============================================================================
// Zone Ladder
// =============================================================================

/// A validated, ascending list of pricing zones plus the student fare.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneLadder {
    zones: Vec<PricingZone>,
    student_price: Money,
}

impl ZoneLadder {
    /// Builds a ladder, checking every structural rule.
    ///
    /// Missing labels are filled in (`"<= 5 km"`, `"> 20 km"`).
    pub fn new(zones: Vec<PricingZone>, student_price: Money) -> Result<Self, PricingError> {
        if zones.is_empty() {
            return Err(PricingError::EmptyLadder);
        }
        if student_price.is_negative() {
            return Err(PricingError::NegativeStudentPrice);
        }

        let last = zones.len() - 1;
        let mut previous: Option<f64> = None;

        for (index, zone) in zones.iter().enumerate() {
            if zone.price.is_negative() {
                return Err(PricingError::NegativePrice { index });
            }

            match zone.max_km {
                Some(max_km) => {
                    if !max_km.is_finite() || max_km < 0.0 {
                        return Err(PricingError::InvalidBound { index });
                    }
                    if let Some(previous_km) = previous {
                        if max_km <= previous_km {
                            return Err(PricingError::NotIncreasing {
                                index,
                                max_km,
                                previous_km,
                            });
                        }
                    }
                    if index == last {
                        return Err(PricingError::MissingCatchAll);
                    }
                    previous = Some(max_km);
                }
                None if index != last => {
                    return Err(PricingError::CatchAllNotLast { index });
                }
                None => {}
            }
        }

        let zones = zones
            .into_iter()
            .scan(None, |lower: &mut Option<f64>, mut zone| {
                if zone.label.is_none() {
                    zone.label = Some(match (zone.max_km, *lower) {
                        (Some(max_km), _) => format!("<= {} km", max_km),
                        (None, Some(lower_km)) => format!("> {} km", lower_km),
                        (None, None) => "all distances".to_string(),
                    });
                }
                if zone.max_km.is_some() {
                    *lower = zone.max_km;
                }
                Some(zone)
            })
            .collect();

        Ok(ZoneLadder {
            zones,
            student_price,
        })
    }

    /// The SOTRAL urban ladder: 5 / 10 / 20 km bands plus catch-all.
    pub fn standard() -> Self {
        ZoneLadder {
            zones: vec![
                labelled(PricingZone::up_to(5.0, Money::fcfa(100)), "<= 5 km"),
                labelled(PricingZone::up_to(10.0, Money::fcfa(150)), "<= 10 km"),
                labelled(PricingZone::up_to(20.0, Money::fcfa(200)), "<= 20 km"),
                labelled(PricingZone::beyond(Money::fcfa(250)), "> 20 km"),
            ],
            student_price: Money::fcfa(DEFAULT_STUDENT_PRICE),
        }
    }

    pub fn zones(&self) -> &[PricingZone] {
        &self.zones
    }

    pub fn student_price(&self) -> Money {
        self.student_price
    }

    /// Fare for a distance.
    ///
    /// ## Example
    /// ```rust
    /// use transit_core::money::Money;
    /// use transit_core::pricing::ZoneLadder;
    ///
    /// let ladder = ZoneLadder::standard();
    /// assert_eq!(ladder.price_for_distance(3.0, false).unwrap().price, Money::fcfa(100));
    /// assert_eq!(ladder.price_for_distance(25.0, false).unwrap().price, Money::fcfa(250));
    /// assert_eq!(ladder.price_for_distance(25.0, true).unwrap().zone_label, "student");
    /// ```
    pub fn price_for_distance(
        &self,
        distance_km: f64,
        is_student: bool,
    ) -> Result<PriceQuote, PricingError> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(PricingError::InvalidDistance(distance_km));
        }

        if is_student {
            return Ok(PriceQuote {
                price: self.student_price,
                zone_label: STUDENT_ZONE_LABEL.to_string(),
            });
        }

        let zone = self
            .zones
            .iter()
            .find(|zone| zone.max_km.map_or(true, |max_km| distance_km <= max_km))
            // new() guarantees an unbounded last zone
            .ok_or(PricingError::MissingCatchAll)?;

        Ok(PriceQuote {
            price: zone.price,
            zone_label: zone.label.clone().unwrap_or_default(),
        })
    }

    /// Fare for riding `line`.
    pub fn calculate_price(&self, line: &Line, is_student: bool) -> Result<PriceQuote, PricingError> {
        self.price_for_distance(line.distance_km, is_student)
    }
}

fn labelled(mut zone: PricingZone, label: &str) -> PricingZone {
    zone.label = Some(label.to_string());
    zone
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LineCategory;
    use chrono::Utc;

    fn ladder() -> ZoneLadder {
        ZoneLadder::new(
            vec![
                PricingZone::up_to(5.0, Money::fcfa(100)),
                PricingZone::up_to(10.0, Money::fcfa(150)),
                PricingZone::up_to(20.0, Money::fcfa(200)),
                PricingZone::beyond(Money::fcfa(250)),
            ],
            Money::fcfa(100),
        )
        .unwrap()
    }

    #[test]
    fn test_distance_bands() {
        let ladder = ladder();
        let price = |km| ladder.price_for_distance(km, false).unwrap().price;

        assert_eq!(price(0.0), Money::fcfa(100));
        assert_eq!(price(3.0), Money::fcfa(100));
        assert_eq!(price(5.0), Money::fcfa(100));
        assert_eq!(price(5.1), Money::fcfa(150));
        assert_eq!(price(10.0), Money::fcfa(150));
        assert_eq!(price(12.0), Money::fcfa(200));
        assert_eq!(price(25.0), Money::fcfa(250));
        assert_eq!(price(400.0), Money::fcfa(250));
    }

    #[test]
    fn test_student_price_ignores_distance() {
        let quote = ladder().price_for_distance(25.0, true).unwrap();
        assert_eq!(quote.price, Money::fcfa(100));
        assert_eq!(quote.zone_label, STUDENT_ZONE_LABEL);
    }

    #[test]
    fn test_generated_labels() {
        let ladder = ladder();
        assert_eq!(
            ladder.price_for_distance(4.0, false).unwrap().zone_label,
            "<= 5 km"
        );
        assert_eq!(
            ladder.price_for_distance(30.0, false).unwrap().zone_label,
            "> 20 km"
        );
    }

    #[test]
    fn test_standard_matches_built_ladder() {
        assert_eq!(ZoneLadder::standard(), ladder());
    }

    #[test]
    fn test_invalid_distance() {
        let ladder = ladder();
        assert_eq!(
            ladder.price_for_distance(-1.0, false),
            Err(PricingError::InvalidDistance(-1.0))
        );
        assert!(ladder.price_for_distance(f64::NAN, false).is_err());
    }

    #[test]
    fn test_ladder_validation() {
        let fcfa = Money::fcfa;

        assert_eq!(
            ZoneLadder::new(vec![], fcfa(100)),
            Err(PricingError::EmptyLadder)
        );
        assert_eq!(
            ZoneLadder::new(vec![PricingZone::up_to(5.0, fcfa(100))], fcfa(100)),
            Err(PricingError::MissingCatchAll)
        );
        assert_eq!(
            ZoneLadder::new(
                vec![
                    PricingZone::beyond(fcfa(250)),
                    PricingZone::up_to(5.0, fcfa(100)),
                ],
                fcfa(100)
            ),
            Err(PricingError::CatchAllNotLast { index: 0 })
        );
        assert_eq!(
            ZoneLadder::new(
                vec![
                    PricingZone::up_to(10.0, fcfa(150)),
                    PricingZone::up_to(10.0, fcfa(200)),
                    PricingZone::beyond(fcfa(250)),
                ],
                fcfa(100)
            ),
            Err(PricingError::NotIncreasing {
                index: 1,
                max_km: 10.0,
                previous_km: 10.0
            })
        );
        assert_eq!(
            ZoneLadder::new(
                vec![
                    PricingZone::up_to(5.0, fcfa(-1)),
                    PricingZone::beyond(fcfa(250)),
                ],
                fcfa(100)
            ),
            Err(PricingError::NegativePrice { index: 0 })
        );
        assert_eq!(
            ZoneLadder::new(vec![PricingZone::beyond(fcfa(250))], fcfa(-5)),
            Err(PricingError::NegativeStudentPrice)
        );
        assert_eq!(
            ZoneLadder::new(
                vec![
                    PricingZone::up_to(f64::INFINITY, fcfa(100)),
                    PricingZone::beyond(fcfa(250)),
                ],
                fcfa(100)
            ),
            Err(PricingError::InvalidBound { index: 0 })
        );
    }

    #[test]
    fn test_single_catch_all_zone() {
        let ladder = ZoneLadder::new(vec![PricingZone::beyond(Money::fcfa(300))], Money::fcfa(100))
            .unwrap();
        let quote = ladder.price_for_distance(7.0, false).unwrap();
        assert_eq!(quote.price, Money::fcfa(300));
        assert_eq!(quote.zone_label, "all distances");
    }

    #[test]
    fn test_calculate_price_for_line() {
        let line = Line {
            id: 1,
            line_number: "12".to_string(),
            name: "Adidogomé - Marché".to_string(),
            origin: "Adidogomé".to_string(),
            destination: "Grand Marché".to_string(),
            distance_km: 12.0,
            category: LineCategory::Ordinary,
            is_active: true,
            created_at: Utc::now(),
        };
        let quote = ladder().calculate_price(&line, false).unwrap();
        assert_eq!(quote.price, Money::fcfa(200));
        assert_eq!(quote.zone_label, "<= 20 km");
    }
}
