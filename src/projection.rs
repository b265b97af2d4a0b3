//! Revenue projection and per-share target prices.

use std::collections::BTreeMap;

use crate::{
    model::{GrowthSource, Price, Year},
    utils::round2,
};

/// Compounds `base_revenue` through `growth_rates`, one entry per year.
///
/// `revenue[i] = revenue[i - 1] × (1 + growth[i])` with `revenue[-1]` the base.
/// Nothing is rounded here. A year that overflows, or is otherwise not
/// finite, becomes 0 and stays 0 for the rest of the horizon.
pub fn project_revenue(base_revenue: f64, growth_rates: &[f64]) -> Vec<f64> {
    project_revenue_with(base_revenue, growth_rates, &[])
}

/// [`project_revenue`] where `fixed[i]`, when present, replaces the
/// compounded figure for year `i`; later years compound from it.
pub fn project_revenue_with(base_revenue: f64, growth_rates: &[f64], fixed: &[Option<f64>]) -> Vec<f64> {
    let fixed = fixed.iter().copied().chain(std::iter::repeat(None));

    growth_rates
        .iter()
        .zip(fixed)
        .scan(base_revenue, |revenue, (growth, fixed)| {
            let next = fixed.unwrap_or(*revenue * (1.0 + growth));
            *revenue = if next.is_finite() { next } else { 0.0 };
            Some(*revenue)
        })
        .collect()
}

fn usable(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// `(revenue / shares) × multiple`, rounded to 2 decimals.
///
/// Returns 0 whenever any input is zero, negative or not finite, and when
/// the product overflows.
pub fn target_price(revenue: f64, multiple: f64, shares_outstanding: f64) -> Price {
    if !usable(revenue) || !usable(multiple) || !usable(shares_outstanding) {
        return 0.0;
    }

    let target = revenue / shares_outstanding * multiple;
    if !target.is_finite() {
        return 0.0;
    }

    round2(target)
}

/// Growth implied by two consecutive revenue figures.
pub fn implied_growth(previous: f64, next: f64) -> Option<f64> {
    (usable(previous) && next.is_finite())
        .then(|| next / previous - 1.0)
        .filter(|growth| growth.is_finite())
}

/// Picks a growth rate per horizon year: the user's rate, else one implied
/// by analyst revenue estimates, else `default_growth`.
///
/// The estimate for year `Y` is compared with the estimate for `Y - 1`; the
/// first horizon year falls back to `base_revenue` when there is no
/// estimate for the year before it. Rates that are not finite are ignored.
pub fn resolve_growth(
    horizon: &[Year],
    base_revenue: f64,
    user: &BTreeMap<Year, f64>,
    estimates: &BTreeMap<Year, f64>,
    default_growth: f64,
) -> Vec<(f64, GrowthSource)> {
    horizon
        .iter()
        .enumerate()
        .map(|(ix, year)| {
            if let Some(growth) = user.get(year).filter(|g| g.is_finite()) {
                return (*growth, GrowthSource::User);
            }

            let previous = estimates
                .get(&(year - 1))
                .copied()
                .or_else(|| (ix == 0).then_some(base_revenue));
            let estimated = previous
                .zip(estimates.get(year).copied())
                .and_then(|(previous, next)| implied_growth(previous, next));

            match estimated {
                Some(growth) => (growth, GrowthSource::Estimate),
                None => (default_growth, GrowthSource::Default),
            }
        })
        .collect()
}
