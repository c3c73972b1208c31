use chrono::{Datelike, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CrmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarView {
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalendarAction {
    SetView { view: CalendarView },
    Next,
    Previous,
    Focus { date: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarSlice {
    pub view: CalendarView,
    pub focus: NaiveDate,
}

impl Default for CalendarSlice {
    fn default() -> Self {
        Self::new(Utc::now().date_naive())
    }
}

impl CalendarSlice {
    pub fn new(focus: NaiveDate) -> Self {
        Self { view: CalendarView::Week, focus }
    }

    pub fn reduce(&mut self, action: CalendarAction) -> Result<(), CrmError> {
        match action {
            CalendarAction::SetView { view } => self.view = view,
            CalendarAction::Focus { date } => self.focus = date,
            CalendarAction::Next => self.focus = self.step(true)?,
            CalendarAction::Previous => self.focus = self.step(false)?,
        }
        Ok(())
    }

    fn step(&self, forward: bool) -> Result<NaiveDate, CrmError> {
        let moved = match (self.view, forward) {
            (CalendarView::Day, true) => self.focus.checked_add_signed(Duration::days(1)),
            (CalendarView::Day, false) => self.focus.checked_sub_signed(Duration::days(1)),
            (CalendarView::Week, true) => self.focus.checked_add_signed(Duration::days(7)),
            (CalendarView::Week, false) => self.focus.checked_sub_signed(Duration::days(7)),
            (CalendarView::Month, true) => self.focus.checked_add_months(Months::new(1)),
            (CalendarView::Month, false) => self.focus.checked_sub_months(Months::new(1)),
        };
        moved.ok_or_else(|| CrmError::validation("Calendar date out of range"))
    }

    /// First and last day shown; weeks start on Sunday
    pub fn visible_range(&self) -> (NaiveDate, NaiveDate) {
        match self.view {
            CalendarView::Day => (self.focus, self.focus),
            CalendarView::Week => {
                let start = self.focus - Duration::days(self.focus.weekday().num_days_from_sunday() as i64);
                (start, start + Duration::days(6))
            }
            CalendarView::Month => {
                let start = self.focus.with_day(1).unwrap_or(self.focus);
                let end = start
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .unwrap_or(start);
                (start, end)
            }
        }
    }
}
