//! Bounded day-by-day scan for the first bookable slot.
//!
//! Attempt `n` looks at `reference_date + (n - 1)` days. The first date with
//! at least one slot wins and its lowest-index slot is selected. Errors on a
//! single date are logged and the scan moves on; running out of attempts is
//! `NoSlotAvailable`.

use chrono::{Duration, NaiveDate};
use log::{debug, info, warn};

use crate::driver::traits::{SlotCalendar, SlotView};
use crate::error::StepError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSearchState {
    /// 1-based; 0 before the first attempt
    pub attempt: u32,
    pub candidate_date: NaiveDate,
    pub found: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSelection {
    pub date: NaiveDate,
    pub index: usize,
    pub available: usize,
    pub attempt: u32,
}

#[derive(Debug, Clone)]
pub struct SlotSearch {
    reference_date: NaiveDate,
    max_attempts: u32,
    state: SlotSearchState,
}

impl SlotSearch {
    pub fn new(reference_date: NaiveDate, max_attempts: u32) -> Self {
        Self {
            reference_date,
            max_attempts,
            state: SlotSearchState {
                attempt: 0,
                candidate_date: reference_date,
                found: false,
            },
        }
    }

    pub fn state(&self) -> SlotSearchState {
        self.state
    }

    fn advance(&mut self) -> bool {
        if self.state.found || self.state.attempt >= self.max_attempts {
            return false;
        }
        self.state.attempt += 1;
        self.state.candidate_date =
            self.reference_date + Duration::days(i64::from(self.state.attempt - 1));
        true
    }

    pub async fn run<C>(&mut self, calendar: &C) -> Result<SlotSelection, StepError>
    where
        C: SlotCalendar + ?Sized,
    {
        while self.advance() {
            let date = self.state.candidate_date;
            debug!("Slot search attempt {}: {}", self.state.attempt, date);

            let available = match calendar.open_date(date).await {
                Ok(SlotView::NoSlots) => {
                    info!("No slots available for {}", date);
                    continue;
                }
                Ok(SlotView::Slots(0)) => {
                    info!("No time slots listed for {}", date);
                    continue;
                }
                Ok(SlotView::Slots(n)) => n,
                Err(e) => {
                    warn!("Error on attempt {} ({}): {:#}", self.state.attempt, date, e);
                    continue;
                }
            };

            if let Err(e) = calendar.select_slot(date, 0).await {
                warn!(
                    "Could not select slot on attempt {} ({}): {:#}",
                    self.state.attempt, date, e
                );
                continue;
            }

            info!("Found {} available slots for {}", available, date);
            self.state.found = true;
            return Ok(SlotSelection {
                date,
                index: 0,
                available,
                attempt: self.state.attempt,
            });
        }

        Err(StepError::NoSlotAvailable {
            attempts: self.state.attempt,
        })
    }
}

/// Run a fresh search from `reference_date`.
pub async fn find_first_slot<C>(
    calendar: &C,
    reference_date: NaiveDate,
    max_attempts: u32,
) -> Result<SlotSelection, StepError>
where
    C: SlotCalendar + ?Sized,
{
    SlotSearch::new(reference_date, max_attempts)
        .run(calendar)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::ScriptedCalendar;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, d).unwrap()
    }

    #[tokio::test]
    async fn test_first_slot_on_fifth_date() {
        let calendar = ScriptedCalendar::new(vec![
            Ok(SlotView::NoSlots),
            Ok(SlotView::NoSlots),
            Ok(SlotView::NoSlots),
            Ok(SlotView::NoSlots),
            Ok(SlotView::Slots(2)),
        ]);

        let mut search = SlotSearch::new(day(1), DEFAULT_MAX_ATTEMPTS);
        let selection = search.run(&calendar).await.unwrap();

        assert_eq!(search.state().attempt, 5);
        assert!(search.state().found);
        assert_eq!(selection.date, day(5));
        assert_eq!(selection.index, 0);
        assert_eq!(selection.available, 2);
        assert_eq!(calendar.opened(), vec![day(1), day(2), day(3), day(4), day(5)]);
        assert_eq!(calendar.selected(), vec![(day(5), 0)]);
    }

    #[tokio::test]
    async fn test_exhausts_exactly_max_attempts() {
        let calendar = ScriptedCalendar::new(vec![Ok(SlotView::NoSlots); 40]);

        let mut search = SlotSearch::new(day(1), 30);
        let err = search.run(&calendar).await.unwrap_err();

        assert_eq!(err, StepError::NoSlotAvailable { attempts: 30 });
        assert_eq!(search.state().attempt, 30);
        assert!(!search.state().found);
        assert_eq!(calendar.opened().len(), 30);
        assert!(calendar.selected().is_empty());
    }

    #[tokio::test]
    async fn test_transient_errors_do_not_abort() {
        let calendar = ScriptedCalendar::new(vec![
            Err("date cell not clickable".to_string()),
            Ok(SlotView::Slots(0)),
            Err("timeout".to_string()),
            Ok(SlotView::Slots(3)),
        ]);

        let selection = find_first_slot(&calendar, day(10), 30).await.unwrap();
        assert_eq!(selection.attempt, 4);
        assert_eq!(selection.date, day(13));
    }

    #[tokio::test]
    async fn test_candidate_dates_cross_month_boundary() {
        let calendar = ScriptedCalendar::new(vec![Ok(SlotView::NoSlots), Ok(SlotView::Slots(1))]);
        let selection = find_first_slot(&calendar, day(31), 5).await.unwrap();
        assert_eq!(selection.date, NaiveDate::from_ymd_opt(2025, 8, 1).unwrap());
    }

    #[tokio::test]
    async fn test_zero_budget_never_queries() {
        let calendar = ScriptedCalendar::new(vec![Ok(SlotView::Slots(1))]);
        let err = find_first_slot(&calendar, day(1), 0).await.unwrap_err();
        assert_eq!(err, StepError::NoSlotAvailable { attempts: 0 });
        assert!(calendar.opened().is_empty());
    }
}
