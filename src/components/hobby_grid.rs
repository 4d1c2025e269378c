use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, column, container, icon, row, text};
use cosmic::Element;

use crate::core::hobby::{Day, Hobby};
use crate::fl;
use crate::message::Message;

/// Header row of the weekly grid: an empty name column, then Mon..Sun.
pub fn hobby_grid_header<'a>(today: Day) -> Element<'a, Message> {
    let mut header = row()
        .spacing(4)
        .align_y(Alignment::Center)
        .push(container(text::caption(fl!("hobbies-name"))).width(Length::FillPortion(3)));
    for day in Day::ALL {
        let label = if day == today {
            text::caption(day.label()).font(cosmic::iced::Font {
                weight: cosmic::iced::font::Weight::Bold,
                ..Default::default()
            })
        } else {
            text::caption(day.label())
        };
        header = header.push(
            container(label.center())
                .width(Length::FillPortion(1))
                .center_x(Length::FillPortion(1)),
        );
    }
    header
        .push(container(text::caption(" ")).width(Length::Fixed(40.0)))
        .into()
}

/// One hobby: its name, seven toggle cells and a delete button.
pub fn hobby_grid_row(hobby: &Hobby) -> Element<'static, Message> {
    let name = column()
        .spacing(2)
        .push(text::body(hobby.name.clone()))
        .push(text::caption(fl!(
            "hobbies-week-count",
            count = hobby.done_count().to_string()
        )));

    let mut cells = row()
        .spacing(4)
        .align_y(Alignment::Center)
        .push(container(name).width(Length::FillPortion(3)));

    for day in Day::ALL {
        let done = hobby.is_done(day);
        let mark = if done { "\u{25CF}" } else { "\u{25CB}" };
        let class = if done {
            cosmic::theme::Button::Suggested
        } else {
            cosmic::theme::Button::Text
        };
        cells = cells.push(
            button::custom(container(text::body(mark).center()).center_x(Length::Fill))
                .class(class)
                .on_press(Message::ToggleHobbyDay(hobby.id.clone(), day))
                .width(Length::FillPortion(1)),
        );
    }

    cells
        .push(
            button::icon(icon::from_name("edit-delete-symbolic"))
                .on_press(Message::DeleteHobby(hobby.id.clone())),
        )
        .into()
}
