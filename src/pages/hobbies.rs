use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, column, container, icon, row, scrollable, text, text_input};
use cosmic::Element;

use crate::components::hobby_grid::{hobby_grid_header, hobby_grid_row};
use crate::core::hobby::{Day, Hobby};
use crate::fl;
use crate::message::Message;

pub fn hobbies_view<'a>(hobbies: &[Hobby], hobby_input: &str, today: Day) -> Element<'a, Message> {
    let mut content = column().spacing(12);

    let input = text_input::text_input(fl!("hobbies-new-placeholder"), hobby_input.to_string())
        .on_input(Message::HobbyInputChanged)
        .on_submit(|_| Message::AddHobby)
        .width(Length::Fill);

    content = content.push(
        row()
            .spacing(8)
            .align_y(Alignment::Center)
            .push(input)
            .push(
                button::icon(icon::from_name("list-add-symbolic"))
                    .on_press(Message::AddHobby),
            ),
    );

    if hobbies.is_empty() {
        content = content.push(
            container(text::body(fl!("hobbies-empty")))
                .padding(32)
                .center_x(Length::Fill)
                .width(Length::Fill),
        );
    } else {
        content = content.push(hobby_grid_header(today));
        for hobby in hobbies {
            content = content.push(hobby_grid_row(hobby));
        }
    }

    container(scrollable(content.padding(16).width(Length::Fill)))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
