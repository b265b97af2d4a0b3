//! Bounded one-company-at-a-time browsing over a ranked view.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    model::Ticker,
    ranking::{RankedEntry, RankedView, ViewIdentity},
};

/// Browsing state owned by one session. Sessions never share an instance.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseSession {
    cursor: usize,
    view: Option<ViewIdentity>,
    last_suggested: Option<Ticker>,
}

impl BrowseSession {
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn view(&self) -> Option<ViewIdentity> {
        self.view
    }

    pub fn last_suggested(&self) -> Option<&Ticker> {
        self.last_suggested.as_ref()
    }

    pub fn remember_suggestion(&mut self, ticker: Ticker) {
        self.last_suggested = Some(ticker);
    }
}

/// Cursor over a [`RankedView`]. Never wraps around.
pub struct Navigator<'s, 'v, 'a> {
    session: &'s mut BrowseSession,
    view: &'v RankedView<'a>,
}

impl<'s, 'v, 'a> Navigator<'s, 'v, 'a> {
    /// Binds `session` to `view`, bringing the cursor back in bounds.
    ///
    /// A view with a new identity restarts at 0 when the old cursor does not
    /// fit; a view with the same identity that shrank clamps to its last
    /// entry. Otherwise the cursor is kept.
    pub fn attach(session: &'s mut BrowseSession, view: &'v RankedView<'a>) -> Self {
        let identity = view.identity();
        let out_of_bounds = session.cursor >= view.len();

        if session.view != Some(identity) {
            if out_of_bounds {
                session.cursor = 0;
            }
            session.view = Some(identity);
        } else if out_of_bounds {
            session.cursor = view.len().saturating_sub(1);
        }

        debug!(cursor = session.cursor, len = view.len(), "navigator attached");
        Self { session, view }
    }

    pub fn position(&self) -> usize {
        self.session.cursor
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// `None` for an empty view.
    pub fn current(&self) -> Option<&'v RankedEntry<'a>> {
        self.view.get(self.session.cursor)
    }

    pub fn previous(&mut self) -> Option<&'v RankedEntry<'a>> {
        self.session.cursor = self.session.cursor.saturating_sub(1);
        self.current()
    }

    pub fn next(&mut self) -> Option<&'v RankedEntry<'a>> {
        if self.session.cursor + 1 < self.view.len() {
            self.session.cursor += 1;
        }
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::{
        model::{CompanyRecord, Ticker, YearForecast},
        ranking::{rank, rank_by_valuation, Upside},
    };

    use super::{BrowseSession, Navigator};

    fn companies(n: usize) -> Vec<CompanyRecord> {
        (0..n)
            .map(|ix| {
                let mut record = CompanyRecord::new(
                    Ticker::from(format!("t{ix}")),
                    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                );
                record.current_price = Some(10.0);
                record.forecasts.push(YearForecast {
                    year: 2025,
                    target_price: 20.0 - ix as f64,
                    ..Default::default()
                });
                record
            })
            .collect()
    }

    fn ticker_at(navigator: &Navigator) -> Option<String> {
        navigator.current().map(|e| e.company.ticker.to_string())
    }

    #[test]
    fn unittest_navigator_bounds() {
        let companies = companies(3);
        let view = rank_by_valuation(&companies, 2025);
        let mut session = BrowseSession::default();
        let mut navigator = Navigator::attach(&mut session, &view);

        assert_eq!(navigator.position(), 0);
        navigator.previous();
        assert_eq!(navigator.position(), 0);

        navigator.next();
        navigator.next();
        assert_eq!(navigator.position(), 2);
        assert_eq!(ticker_at(&navigator), Some("T2".to_owned()));

        navigator.next();
        assert_eq!(navigator.position(), 2);
        assert_eq!(navigator.previous().map(|e| e.company.ticker.as_str()), Some("T1"));
    }

    #[test]
    fn unittest_navigator_empty_view() {
        let view = rank_by_valuation(&[], 2025);
        let mut session = BrowseSession::default();
        let mut navigator = Navigator::attach(&mut session, &view);

        assert!(navigator.is_empty());
        assert!(navigator.current().is_none());
        assert!(navigator.next().is_none());
        assert!(navigator.previous().is_none());
        assert_eq!(navigator.position(), 0);
    }

    #[test]
    fn unittest_cursor_persists_for_same_view() {
        let companies = companies(4);
        let mut session = BrowseSession::default();

        let view = rank_by_valuation(&companies, 2025);
        let mut navigator = Navigator::attach(&mut session, &view);
        navigator.next();
        navigator.next();

        let again = rank_by_valuation(&companies, 2025);
        assert_eq!(Navigator::attach(&mut session, &again).position(), 2);

        // Same identity, fewer rows: clamp to the last one.
        let shrunk = rank_by_valuation(&companies[..2], 2025);
        let navigator = Navigator::attach(&mut session, &shrunk);
        assert_eq!(navigator.position(), 1);
        assert_eq!(navigator.len(), 2);
    }

    #[test]
    fn unittest_cursor_resets_for_new_view() {
        let companies = companies(4);
        let mut session = BrowseSession::default();

        let view = rank_by_valuation(&companies, 2025);
        let mut navigator = Navigator::attach(&mut session, &view);
        navigator.next();
        assert_eq!(navigator.position(), 1);

        // New identity, cursor still fits: kept.
        let by_upside = rank(&companies, 2025, &Upside);
        assert_eq!(Navigator::attach(&mut session, &by_upside).position(), 1);

        // New identity, cursor does not fit: restart.
        let other_year = rank_by_valuation(&companies, 2026);
        let navigator = Navigator::attach(&mut session, &other_year);
        assert_eq!(navigator.position(), 0);
        assert!(navigator.current().is_none());
        assert_eq!(session.view().map(|v| v.year), Some(2026));
    }

    #[test]
    fn unittest_sessions_are_independent() {
        let companies = companies(3);
        let view = rank_by_valuation(&companies, 2025);
        let mut first = BrowseSession::default();
        let mut second = BrowseSession::default();

        Navigator::attach(&mut first, &view).next();
        assert_eq!(first.cursor(), 1);
        assert_eq!(Navigator::attach(&mut second, &view).position(), 0);
    }
}
