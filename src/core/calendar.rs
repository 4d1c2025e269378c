//! Month grid for the calendar tab.
//!
//! Everything here is a pure function of the displayed month, the selected
//! day, today's date and the todo list.

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};

use super::todo::Todo;

/// Which month is on screen and which day is picked for the detail list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthView {
    /// Always the first of the displayed month.
    pub month: NaiveDate,
    pub selected: NaiveDate,
}

impl MonthView {
    pub fn new(selected: NaiveDate) -> Self {
        Self {
            month: first_of_month(selected),
            selected,
        }
    }

    pub fn today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }

    /// Shift by whole months; the selected day moves along, clamped to the
    /// length of the new month.
    pub fn shift_months(&mut self, delta: i32) {
        let months = Months::new(delta.unsigned_abs());
        let shifted = if delta >= 0 {
            self.selected.checked_add_months(months)
        } else {
            self.selected.checked_sub_months(months)
        };
        if let Some(selected) = shifted {
            self.selected = selected;
            self.month = first_of_month(selected);
        }
    }

    pub fn prev_month(&mut self) {
        self.shift_months(-1);
    }

    pub fn next_month(&mut self) {
        self.shift_months(1);
    }

    pub fn select_day(&mut self, date: NaiveDate) {
        self.selected = date;
        self.month = first_of_month(date);
    }

    pub fn title(&self) -> String {
        self.month.format("%B %Y").to_string()
    }
}

/// One square of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub in_month: bool,
    pub is_today: bool,
    pub is_weekend: bool,
    pub is_selected: bool,
    pub todos: Vec<Todo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthGrid {
    pub month: NaiveDate,
    pub cells: Vec<DayCell>,
}

impl MonthGrid {
    pub fn start(&self) -> Option<NaiveDate> {
        self.cells.first().map(|c| c.date)
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.cells.last().map(|c| c.date)
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[DayCell]> {
        self.cells.chunks(7)
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

/// Monday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Sunday on or after `date`.
pub fn week_end(date: NaiveDate) -> NaiveDate {
    date + Duration::days(6 - date.weekday().num_days_from_monday() as i64)
}

/// Todos due exactly on `date`.
pub fn day_detail(date: NaiveDate, todos: &[Todo]) -> Vec<Todo> {
    todos.iter().filter(|t| t.is_on(date)).cloned().collect()
}

/// Build the grid from the Monday on/before the 1st through the Sunday
/// on/after the last day of the displayed month.
pub fn month_grid(view: &MonthView, today: NaiveDate, todos: &[Todo]) -> MonthGrid {
    let first = view.month;
    let start = week_start(first);
    let end = week_end(last_of_month(first));

    let mut cells = Vec::new();
    let mut date = start;
    while date <= end {
        cells.push(DayCell {
            date,
            in_month: date.month() == first.month() && date.year() == first.year(),
            is_today: date == today,
            is_weekend: matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
            is_selected: date == view.selected,
            todos: day_detail(date, todos),
        });
        date += Duration::days(1);
    }

    MonthGrid { month: first, cells }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::todo::{NewTodo, TodoKind};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn todo(text: &str, date: NaiveDate) -> Todo {
        let mut t = Todo::from_draft(
            &NewTodo {
                text: text.into(),
                date,
                kind: TodoKind::Calendar,
                repeating: false,
            },
            "u",
        );
        t.id = text.to_string();
        t
    }

    #[test]
    fn every_month_spans_monday_to_sunday() {
        for year in [2023, 2024, 2026] {
            for month in 1..=12 {
                let view = MonthView::new(day(year, month, 15));
                let grid = month_grid(&view, day(year, month, 1), &[]);
                assert_eq!(grid.start().unwrap().weekday(), Weekday::Mon);
                assert_eq!(grid.end().unwrap().weekday(), Weekday::Sun);
                assert_eq!(grid.cells.len() % 7, 0);
                assert!((28..=42).contains(&grid.cells.len()));

                let last = last_of_month(view.month).day();
                let in_month: Vec<u32> = grid
                    .cells
                    .iter()
                    .filter(|c| c.in_month)
                    .map(|c| c.date.day())
                    .collect();
                assert_eq!(in_month, (1..=last).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn february_2021_fits_four_weeks() {
        // 2021-02-01 is a Monday and 2021-02-28 a Sunday.
        let grid = month_grid(&MonthView::new(day(2021, 2, 10)), day(2021, 2, 10), &[]);
        assert_eq!(grid.cells.len(), 28);
        assert_eq!(grid.weeks().count(), 4);
    }

    #[test]
    fn todos_land_on_their_exact_day() {
        let todos = vec![
            todo("milk", day(2024, 3, 1)),
            todo("dentist", day(2024, 3, 14)),
            todo("april", day(2024, 4, 1)),
        ];
        let grid = month_grid(&MonthView::new(day(2024, 3, 1)), day(2024, 3, 2), &todos);

        let first = grid.cells.iter().find(|c| c.date == day(2024, 3, 1)).unwrap();
        assert_eq!(first.todos.len(), 1);
        assert_eq!(first.todos[0].text, "milk");
        assert!(first.is_selected);

        let today = grid.cells.iter().find(|c| c.is_today).unwrap();
        assert_eq!(today.date, day(2024, 3, 2));
        assert!(today.is_weekend);

        // The grid ends on Sunday 2024-03-31, so April todos are absent.
        assert!(grid.cells.iter().all(|c| c.todos.iter().all(|t| t.text != "april")));
    }

    #[test]
    fn leading_days_belong_to_previous_month() {
        let grid = month_grid(&MonthView::new(day(2024, 3, 1)), day(2024, 3, 1), &[]);
        assert_eq!(grid.start(), Some(day(2024, 2, 26)));
        assert!(!grid.cells[0].in_month);
    }

    #[test]
    fn navigation_moves_whole_months() {
        let mut view = MonthView::new(day(2024, 1, 31));
        view.next_month();
        assert_eq!(view.month, day(2024, 2, 1));
        assert_eq!(view.selected, day(2024, 2, 29));
        view.prev_month();
        view.prev_month();
        assert_eq!(view.month, day(2023, 12, 1));
        assert_eq!(view.title(), "December 2023");
    }

    #[test]
    fn selecting_a_day_updates_detail() {
        let todos = vec![todo("a", day(2024, 3, 5)), todo("b", day(2024, 3, 6))];
        let mut view = MonthView::new(day(2024, 3, 1));
        view.select_day(day(2024, 3, 6));
        let detail = day_detail(view.selected, &todos);
        assert_eq!(detail.len(), 1);
        assert_eq!(detail[0].text, "b");
    }
}
