use crate::model::Price;

/// Rounds to two decimals, the precision every reported figure uses.
///
/// Values too large to scale are returned unchanged.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }

    scaled.round() / 100.0
}

#[derive(Default)]
pub struct MovingAverage {
    value: Price,
    length: usize,
}

impl MovingAverage {
    pub fn feed(&mut self, value: Price, times: usize) {
        self.value += value * times as Price;
        self.length += times;
    }

    /// `None` until something has been fed.
    pub fn avg(&self) -> Option<f64> {
        if self.length == 0 {
            return None;
        }

        Some(self.value / self.length as Price)
    }
}

/// Trailing twelve months: the sum of the four most recent quarters.
///
/// `quarters` is chronological, oldest first. Fewer than four quarters is
/// not a TTM figure.
pub fn trailing_twelve_months(quarters: &[f64]) -> Option<f64> {
    if quarters.len() < 4 {
        return None;
    }

    Some(quarters[quarters.len() - 4..].iter().sum())
}
