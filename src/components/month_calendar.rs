use chrono::Datelike;
use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, column, container, icon, row, text};
use cosmic::Element;

use crate::core::calendar::{DayCell, MonthGrid, MonthView};
use crate::fl;
use crate::message::Message;

/// Titles shown per cell before collapsing into a "+n" count.
const MAX_TITLES_PER_CELL: usize = 2;

/// Render a month grid, Monday first, with each day's todos listed inside
/// its cell.
pub fn month_calendar<'a>(view: &MonthView, grid: &MonthGrid) -> Element<'a, Message> {
    let header = row()
        .spacing(8)
        .align_y(Alignment::Center)
        .push(
            button::icon(icon::from_name("go-previous-symbolic"))
                .on_press(Message::CalendarPrevMonth),
        )
        .push(text::title4(view.title()).width(Length::Fill).center())
        .push(
            button::icon(icon::from_name("go-next-symbolic"))
                .on_press(Message::CalendarNextMonth),
        );

    let mut day_labels = row().spacing(0);
    for label in [
        fl!("weekday-mon"),
        fl!("weekday-tue"),
        fl!("weekday-wed"),
        fl!("weekday-thu"),
        fl!("weekday-fri"),
        fl!("weekday-sat"),
        fl!("weekday-sun"),
    ] {
        day_labels = day_labels.push(day_label(label));
    }

    let mut content = column().spacing(2).push(header).push(day_labels);
    for week in grid.weeks() {
        let mut week_row = row().spacing(2);
        for cell in week {
            week_row = week_row.push(day_cell(cell));
        }
        content = content.push(week_row);
    }

    container(content).width(Length::Fill).padding(8).into()
}

fn day_cell<'a>(cell: &DayCell) -> Element<'a, Message> {
    let number = cell.date.day().to_string();
    let number = if cell.is_today {
        text::body(number).font(cosmic::iced::Font {
            weight: cosmic::iced::font::Weight::Bold,
            ..Default::default()
        })
    } else {
        text::body(number)
    };

    let mut body = column().spacing(2).push(number);
    for todo in cell.todos.iter().take(MAX_TITLES_PER_CELL) {
        let title = if todo.completed {
            format!("✓ {}", todo.text)
        } else {
            todo.text.clone()
        };
        body = body.push(text::caption(title));
    }
    if cell.todos.len() > MAX_TITLES_PER_CELL {
        let more = (cell.todos.len() - MAX_TITLES_PER_CELL).to_string();
        body = body.push(text::caption(fl!("calendar-more", count = more)));
    }

    let class = if cell.is_selected {
        cosmic::theme::Button::Suggested
    } else if !cell.in_month || cell.is_weekend {
        cosmic::theme::Button::Text
    } else {
        cosmic::theme::Button::Standard
    };

    button::custom(
        container(body)
            .width(Length::Fill)
            .height(Length::Fixed(72.0)),
    )
    .class(class)
    .on_press(Message::CalendarSelectDay(cell.date))
    .width(Length::FillPortion(1))
    .into()
}

fn day_label<'a>(label: String) -> Element<'a, Message> {
    container(text::caption(label).center())
        .width(Length::FillPortion(1))
        .center_x(Length::FillPortion(1))
        .into()
}
