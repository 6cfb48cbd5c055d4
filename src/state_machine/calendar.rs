//! Inline-keyboard date picker
//!
//! Drill-down years → months → days. Each picker instance is tagged in its
//! callback payloads, so a press on a stale keyboard of the other instance
//! is never taken for this one. Dates before the picker's minimum are
//! rendered as inert blanks and rejected if they arrive anyway.

use super::effect::{Button, Keyboard};
use super::event::CallbackAction;
use chrono::{Datelike, NaiveDate};

const PAYLOAD_PREFIX: &str = "cal:";
const YEARS_PER_PAGE: i32 = 4;
const MONTHS_PER_ROW: usize = 3;
const BLANK: &str = " ";

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const WEEKDAYS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarInstance {
    CheckIn,
    CheckOut,
}

impl CalendarInstance {
    fn tag(self) -> &'static str {
        match self {
            CalendarInstance::CheckIn => "in",
            CalendarInstance::CheckOut => "out",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "in" => Some(CalendarInstance::CheckIn),
            "out" => Some(CalendarInstance::CheckOut),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CalendarInstance::CheckIn => "check-in date",
            CalendarInstance::CheckOut => "check-out date",
        }
    }
}

/// What a calendar button asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarAction {
    /// Year page starting at `start`
    Years { start: i32 },
    /// Month grid of a year
    Months { year: i32 },
    /// Day grid of a month
    Days { year: i32, month: u32 },
    /// A concrete date was pressed
    Pick(NaiveDate),
    /// Inert cell (weekday header, blank, label)
    Noop,
}

impl CalendarAction {
    fn encode(&self) -> String {
        match self {
            CalendarAction::Years { start } => format!("y:{start}"),
            CalendarAction::Months { year } => format!("m:{year}"),
            CalendarAction::Days { year, month } => format!("d:{year}:{month}"),
            CalendarAction::Pick(date) => format!("p:{}", date.format("%Y-%m-%d")),
            CalendarAction::Noop => "n".to_string(),
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        if raw == "n" {
            return Some(CalendarAction::Noop);
        }
        let (kind, value) = raw.split_once(':')?;
        match kind {
            "y" => value.parse().ok().map(|start| CalendarAction::Years { start }),
            "m" => value.parse().ok().map(|year| CalendarAction::Months { year }),
            "d" => {
                let (year, month) = value.split_once(':')?;
                let year = year.parse().ok()?;
                let month: u32 = month.parse().ok()?;
                (1..=12)
                    .contains(&month)
                    .then_some(CalendarAction::Days { year, month })
            }
            "p" => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(CalendarAction::Pick),
            _ => None,
        }
    }
}

/// Decoded `cal:<instance>:<action>` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarPayload {
    pub instance: CalendarInstance,
    pub action: CalendarAction,
}

impl CalendarPayload {
    pub fn encode(&self) -> String {
        format!(
            "{PAYLOAD_PREFIX}{}:{}",
            self.instance.tag(),
            self.action.encode()
        )
    }

    pub fn parse(payload: &str) -> Option<Self> {
        let rest = payload.strip_prefix(PAYLOAD_PREFIX)?;
        let (tag, action) = rest.split_once(':')?;
        Some(Self {
            instance: CalendarInstance::from_tag(tag)?,
            action: CalendarAction::parse(action)?,
        })
    }
}

// ============================================================================
// Picker
// ============================================================================

/// A rendered calendar message
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarView {
    pub prompt: String,
    pub keyboard: Keyboard,
}

/// Result of feeding one press into a picker
#[derive(Debug, Clone, PartialEq)]
pub enum CalendarOutcome {
    /// Drill-down or paging; re-render in place
    Navigate(CalendarView),
    /// A date below the minimum; re-render the day grid with a hint
    Rejected(CalendarView),
    /// A valid date was chosen
    Resolved(NaiveDate),
    /// Inert cell or a press meant for the other instance
    Ignored,
}

/// Date picker bounded below by `min_date`.
///
/// Holds no navigation state: every view is derived from the pressed
/// payload, so a picker can be rebuilt from the session on each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarPicker {
    pub instance: CalendarInstance,
    pub min_date: NaiveDate,
}

impl CalendarPicker {
    pub fn check_in(today: NaiveDate) -> Self {
        Self {
            instance: CalendarInstance::CheckIn,
            min_date: today,
        }
    }

    /// Check-out picker; the earliest date is the day after check-in
    pub fn check_out(check_in: NaiveDate) -> Option<Self> {
        Some(Self {
            instance: CalendarInstance::CheckOut,
            min_date: check_in.succ_opt()?,
        })
    }

    /// First view shown when the picker opens
    pub fn start(&self) -> CalendarView {
        self.years_view(self.min_date.year())
    }

    pub fn process(&self, payload: &CalendarPayload) -> CalendarOutcome {
        if payload.instance != self.instance {
            return CalendarOutcome::Ignored;
        }

        match payload.action {
            CalendarAction::Noop => CalendarOutcome::Ignored,
            CalendarAction::Years { start } => CalendarOutcome::Navigate(self.years_view(start)),
            CalendarAction::Months { year } => CalendarOutcome::Navigate(self.months_view(year)),
            CalendarAction::Days { year, month } => self
                .days_view(year, month, None)
                .map_or(CalendarOutcome::Ignored, CalendarOutcome::Navigate),
            CalendarAction::Pick(date) if date < self.min_date => {
                let hint = format!(
                    "⚠️ {} is not available, the earliest {} is {}.",
                    date.format("%d.%m.%Y"),
                    self.instance.label(),
                    self.min_date.format("%d.%m.%Y"),
                );
                self.days_view(date.year(), date.month(), Some(&hint))
                    .map_or(CalendarOutcome::Ignored, CalendarOutcome::Rejected)
            }
            CalendarAction::Pick(date) => CalendarOutcome::Resolved(date),
        }
    }

    fn min_month(&self) -> (i32, u32) {
        (self.min_date.year(), self.min_date.month())
    }

    fn prompt(&self, unit: &str) -> String {
        format!("📅 Select the {}: {unit}", self.instance.label())
    }

    fn button(&self, text: impl Into<String>, action: CalendarAction) -> Button {
        Button::callback(
            text,
            &CallbackAction::Calendar(CalendarPayload {
                instance: self.instance,
                action,
            }),
        )
    }

    fn blank(&self) -> Button {
        self.button(BLANK, CalendarAction::Noop)
    }

    fn years_view(&self, start: i32) -> CalendarView {
        let start = start.max(self.min_date.year());
        let years = (0..YEARS_PER_PAGE)
            .map(|offset| start.saturating_add(offset))
            .map(|year| self.button(year.to_string(), CalendarAction::Months { year }))
            .collect();

        let previous = if start > self.min_date.year() {
            self.button(
                "«",
                CalendarAction::Years {
                    start: start.saturating_sub(YEARS_PER_PAGE),
                },
            )
        } else {
            self.blank()
        };
        let next = self.button(
            "»",
            CalendarAction::Years {
                start: start.saturating_add(YEARS_PER_PAGE),
            },
        );

        CalendarView {
            prompt: self.prompt("year"),
            keyboard: Keyboard::new()
                .row(years)
                .row(vec![previous, next])
                .with_main_menu(),
        }
    }

    fn months_view(&self, year: i32) -> CalendarView {
        let year = year.max(self.min_date.year());
        let min = self.min_month();
        let cells: Vec<Button> = (1..=12u32)
            .map(|month| {
                if (year, month) < min {
                    self.blank()
                } else {
                    self.button(
                        MONTH_NAMES[month as usize - 1],
                        CalendarAction::Days { year, month },
                    )
                }
            })
            .collect();

        let mut keyboard = Keyboard::new();
        for row in cells.chunks(MONTHS_PER_ROW) {
            keyboard = keyboard.row(row.to_vec());
        }

        let previous = if year > self.min_date.year() {
            self.button(
                "«",
                CalendarAction::Months {
                    year: year.saturating_sub(1),
                },
            )
        } else {
            self.blank()
        };
        let nav = vec![
            previous,
            self.button(year.to_string(), CalendarAction::Years { start: year }),
            self.button(
                "»",
                CalendarAction::Months {
                    year: year.saturating_add(1),
                },
            ),
        ];

        CalendarView {
            prompt: self.prompt("month"),
            keyboard: keyboard.row(nav).with_main_menu(),
        }
    }

    fn days_view(&self, year: i32, month: u32, hint: Option<&str>) -> Option<CalendarView> {
        let (year, month) = (year, month).max(self.min_month());
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;

        let leading = first.weekday().num_days_from_monday();
        let mut cells: Vec<Button> = (0..leading).map(|_| self.blank()).collect();
        for day in first.iter_days().take_while(|d| d.month() == month) {
            if day < self.min_date {
                cells.push(self.blank());
            } else {
                cells.push(self.button(day.day().to_string(), CalendarAction::Pick(day)));
            }
        }
        while cells.len() % WEEKDAYS.len() != 0 {
            cells.push(self.blank());
        }

        let header = WEEKDAYS
            .iter()
            .map(|d| self.button(*d, CalendarAction::Noop))
            .collect();
        let mut keyboard = Keyboard::new().row(header);
        for week in cells.chunks(WEEKDAYS.len()) {
            keyboard = keyboard.row(week.to_vec());
        }

        let (prev_year, prev_month) = shift_month(year, month, false);
        let (next_year, next_month) = shift_month(year, month, true);
        let previous = if (prev_year, prev_month) >= self.min_month() {
            self.button(
                "«",
                CalendarAction::Days {
                    year: prev_year,
                    month: prev_month,
                },
            )
        } else {
            self.blank()
        };
        let nav = vec![
            previous,
            self.button(
                format!("{} {year}", MONTH_NAMES[month as usize - 1]),
                CalendarAction::Months { year },
            ),
            self.button(
                "»",
                CalendarAction::Days {
                    year: next_year,
                    month: next_month,
                },
            ),
        ];

        let prompt = match hint {
            Some(hint) => format!("{hint}\n{}", self.prompt("day")),
            None => self.prompt("day"),
        };
        Some(CalendarView {
            prompt,
            keyboard: keyboard.row(nav).with_main_menu(),
        })
    }
}

fn shift_month(year: i32, month: u32, forward: bool) -> (i32, u32) {
    match (forward, month) {
        (true, 12) => (year.saturating_add(1), 1),
        (true, m) => (year, m + 1),
        (false, 1) => (year.saturating_sub(1), 12),
        (false, m) => (year, m - 1),
    }
}
