//! Price multiples from current and trailing-quarter observations.

use serde::{Deserialize, Serialize};

use crate::{model::Price, utils::round2, utils::MovingAverage};

/// One (price, revenue, shares) observation, plus EPS when known.
#[derive(Default, Debug, Copy, Clone, PartialEq)]
pub struct MultipleObservation {
    pub price: Price,
    /// Annual revenue in raw currency units.
    pub revenue: Option<f64>,
    pub shares: f64,
    pub eps: Option<f64>,
}

impl MultipleObservation {
    fn has_price(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }

    /// `price × shares / revenue`, undefined for a non-positive price,
    /// revenue or share count.
    pub fn price_to_sales(&self) -> Option<f64> {
        let revenue = self.revenue.filter(|r| *r > 0.0)?;
        if !self.has_price() || self.shares <= 0.0 {
            return None;
        }

        Some(self.price * self.shares / revenue).filter(|ps| ps.is_finite())
    }

    /// `price / eps`, undefined for a non-positive price or EPS.
    pub fn price_to_earnings(&self) -> Option<f64> {
        let eps = self.eps.filter(|e| *e > 0.0)?;
        if !self.has_price() {
            return None;
        }

        Some(self.price / eps).filter(|pe| pe.is_finite())
    }
}

/// Candidates per observation (undefined ones kept as `None`) and their
/// averages. An average of 0 means no usable multiple.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleEstimate {
    pub ps_observations: Vec<Option<f64>>,
    pub ps_average: f64,
    #[serde(default)]
    pub pe_observations: Vec<Option<f64>>,
    #[serde(default)]
    pub pe_average: f64,
}

impl MultipleEstimate {
    pub fn has_ps(&self) -> bool {
        self.ps_average > 0.0
    }
}

/// Mean of the defined candidates, rounded to 2 decimals; 0 when none are defined.
fn average(candidates: &[Option<f64>]) -> f64 {
    let mut avg = MovingAverage::default();
    for candidate in candidates.iter().flatten() {
        avg.feed(*candidate, 1);
    }

    avg.avg().map(round2).unwrap_or_default()
}

/// Estimates the average P/S and, when `include_pe`, the average P/E.
pub fn estimate_multiple(observations: &[MultipleObservation], include_pe: bool) -> MultipleEstimate {
    let ps_observations: Vec<_> = observations
        .iter()
        .map(MultipleObservation::price_to_sales)
        .collect();
    let pe_observations: Vec<_> = if include_pe {
        observations
            .iter()
            .map(MultipleObservation::price_to_earnings)
            .collect()
    } else {
        Vec::new()
    };

    MultipleEstimate {
        ps_average: average(&ps_observations),
        pe_average: average(&pe_observations),
        ps_observations,
        pe_observations,
    }
}

#[cfg(test)]
mod tests {
    use super::{estimate_multiple, MultipleObservation};

    fn obs(price: f64, revenue: f64, shares: f64) -> MultipleObservation {
        MultipleObservation {
            price,
            revenue: Some(revenue),
            shares,
            eps: None,
        }
    }

    #[test]
    fn unittest_invalid_quarter_is_not_averaged() {
        // P/S candidates 20, undefined (zero revenue), 30
        let observations = [obs(20.0, 10.0, 10.0), obs(15.0, 0.0, 10.0), obs(30.0, 10.0, 10.0)];
        let estimate = estimate_multiple(&observations, false);

        assert_eq!(estimate.ps_observations, vec![Some(20.0), None, Some(30.0)]);
        assert_eq!(estimate.ps_average, 25.0);
        assert!(estimate.pe_observations.is_empty());
    }

    #[test]
    fn unittest_no_usable_multiple() {
        let observations = [obs(10.0, 0.0, 5.0), obs(10.0, 100.0, 0.0)];
        let estimate = estimate_multiple(&observations, true);

        assert_eq!(estimate.ps_average, 0.0);
        assert_eq!(estimate.pe_average, 0.0);
        assert!(!estimate.has_ps());
        assert!(estimate_multiple(&[], true).ps_average == 0.0);
    }

    #[test]
    fn unittest_priceless_observation_is_not_averaged() {
        let observations = [obs(0.0, 50.0, 10.0), obs(100.0, 50.0, 10.0), obs(f64::NAN, 50.0, 10.0)];
        let estimate = estimate_multiple(&observations, false);

        assert_eq!(estimate.ps_observations, vec![None, Some(20.0), None]);
        assert_eq!(estimate.ps_average, 20.0);
    }

    #[test]
    fn unittest_overflowing_candidate_is_undefined() {
        let estimate = estimate_multiple(&[obs(f64::MAX, 1e-300, 10.0)], false);

        assert_eq!(estimate.ps_observations, vec![None]);
        assert_eq!(estimate.ps_average, 0.0);
    }

    #[test]
    fn unittest_average_is_rounded() {
        let observations = [obs(10.0, 30.0, 1.0), obs(10.0, 30.0, 2.0), obs(10.0, 30.0, 2.0)];
        // 1/3, 2/3, 2/3
        assert_eq!(estimate_multiple(&observations, false).ps_average, 0.56);
    }

    #[test]
    fn unittest_price_to_earnings() {
        let observations = [
            MultipleObservation {
                price: 100.0,
                revenue: None,
                shares: 0.0,
                eps: Some(5.0),
            },
            MultipleObservation {
                price: 90.0,
                revenue: None,
                shares: 0.0,
                eps: Some(-1.0),
            },
            MultipleObservation {
                price: 90.0,
                revenue: None,
                shares: 0.0,
                eps: Some(3.0),
            },
        ];
        let estimate = estimate_multiple(&observations, true);

        assert_eq!(estimate.pe_observations, vec![Some(20.0), None, Some(30.0)]);
        assert_eq!(estimate.pe_average, 25.0);
        assert_eq!(estimate.ps_average, 0.0);
    }
}
