pub mod hobby_grid;
pub mod month_calendar;
pub mod todo_row;
