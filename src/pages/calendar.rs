use chrono::NaiveDate;
use cosmic::iced::Length;
use cosmic::widget::{column, container, scrollable, text, text_input};
use cosmic::Element;

use crate::components::month_calendar::month_calendar;
use crate::components::todo_row::todo_row;
use crate::core::calendar::{MonthGrid, MonthView};
use crate::core::todo::Todo;
use crate::fl;
use crate::message::Message;
use crate::pages::todos::{TodoForm, todo_form};

pub fn calendar_view<'a>(
    view: &MonthView,
    grid: &MonthGrid,
    detail: &[Todo],
    form: &TodoForm<'_>,
    date_input: &str,
    today: NaiveDate,
) -> Element<'a, Message> {
    let date_field = text_input::text_input(fl!("calendar-date-placeholder"), date_input.to_string())
        .on_input(Message::TodoDateChanged)
        .width(Length::Fixed(160.0));

    let mut content = column()
        .spacing(12)
        .push(todo_form(form))
        .push(date_field)
        .push(month_calendar(view, grid))
        .push(text::title4(fl!(
            "calendar-day-title",
            date = view.selected.format("%B %-d, %Y").to_string()
        )));

    if detail.is_empty() {
        content = content.push(text::caption(fl!("calendar-day-empty")));
    } else {
        for todo in detail {
            content = content.push(todo_row(todo, today));
        }
    }

    container(scrollable(content.padding(16).width(Length::Fill)))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
