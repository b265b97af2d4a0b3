use derive_more::Display;
use tracing::info;

use crate::{
    model::{Price, Ticker},
    navigator::BrowseSession,
    ranking::RankedView,
    utils::round2,
};

/// Purchase advice for the best-ranked company.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum Suggestion {
    #[display(fmt = "buy {} {} for {:.2}", quantity, ticker, cost)]
    Buy {
        ticker: Ticker,
        quantity: u64,
        cost: Price,
    },
    #[display(fmt = "{} is the best pick but needs at least {:.2}", ticker, required)]
    InsufficientCapital { ticker: Ticker, required: Price },
}

impl Suggestion {
    pub fn ticker(&self) -> &Ticker {
        match self {
            Suggestion::Buy { ticker, .. } | Suggestion::InsufficientCapital { ticker, .. } => {
                ticker
            }
        }
    }
}

/// Suggests how many shares of the top-ranked company `capital` buys.
///
/// Negative or non-finite capital counts as none. `None` for an empty view.
pub fn suggest_purchase(view: &RankedView, capital: f64) -> Option<Suggestion> {
    let best = view.get(0)?;
    let capital = if capital.is_finite() { capital.max(0.0) } else { 0.0 };
    let price = best.current_price;
    let ticker = best.company.ticker.clone();

    let suggestion = if price <= capital {
        let quantity = (capital / price).floor() as u64;
        Suggestion::Buy {
            ticker,
            quantity,
            cost: round2(quantity as f64 * price),
        }
    } else {
        Suggestion::InsufficientCapital {
            ticker,
            required: price,
        }
    };

    info!(%suggestion, "purchase suggestion");
    Some(suggestion)
}

/// Like [`suggest_purchase`], remembering the suggested ticker in `session`.
pub fn suggest_for_session(
    session: &mut BrowseSession,
    view: &RankedView,
    capital: f64,
) -> Option<Suggestion> {
    let suggestion = suggest_purchase(view, capital)?;
    session.remember_suggestion(suggestion.ticker().clone());
    Some(suggestion)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::{
        model::{CompanyRecord, Ticker, YearForecast},
        navigator::BrowseSession,
        ranking::rank_by_valuation,
    };

    use super::{suggest_for_session, suggest_purchase, Suggestion};

    fn companies() -> Vec<CompanyRecord> {
        [("low", 30.0, 33.0), ("best", 40.0, 60.0)]
            .into_iter()
            .map(|(ticker, price, target)| {
                let mut record = CompanyRecord::new(
                    Ticker::from(ticker),
                    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                );
                record.current_price = Some(price);
                record.forecasts.push(YearForecast {
                    year: 2025,
                    target_price: target,
                    ..Default::default()
                });
                record
            })
            .collect()
    }

    #[test]
    fn unittest_suggest_buy() {
        let companies = companies();
        let view = rank_by_valuation(&companies, 2025);

        assert_eq!(
            suggest_purchase(&view, 130.0),
            Some(Suggestion::Buy {
                ticker: Ticker::from("BEST"),
                quantity: 3,
                cost: 120.0,
            })
        );
    }

    #[test]
    fn unittest_suggest_insufficient_capital() {
        let companies = companies();
        let view = rank_by_valuation(&companies, 2025);

        for capital in [39.99, -5.0, f64::NAN] {
            let suggestion = suggest_purchase(&view, capital);
            assert_eq!(
                suggestion,
                Some(Suggestion::InsufficientCapital {
                    ticker: Ticker::from("BEST"),
                    required: 40.0,
                })
            );
        }
    }

    #[test]
    fn unittest_suggest_empty_view() {
        let view = rank_by_valuation(&[], 2025);
        let mut session = BrowseSession::default();

        assert_eq!(suggest_for_session(&mut session, &view, 1000.0), None);
        assert!(session.last_suggested().is_none());
    }

    #[test]
    fn unittest_session_remembers_suggestion() {
        let companies = companies();
        let view = rank_by_valuation(&companies, 2025);
        let mut session = BrowseSession::default();

        let suggestion = suggest_for_session(&mut session, &view, 100.0);

        assert_eq!(suggestion.map(|s| s.to_string()), Some("buy 2 BEST for 80.00".to_owned()));
        assert_eq!(session.last_suggested(), Some(&Ticker::from("BEST")));
    }
}
