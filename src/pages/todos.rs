use chrono::NaiveDate;
use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, checkbox, column, container, icon, row, scrollable, text, text_input};
use cosmic::Element;

use crate::components::todo_row::todo_row;
use crate::core::todo::Todo;
use crate::fl;
use crate::message::Message;

/// What the add-todo form currently holds.
pub struct TodoForm<'a> {
    pub input: &'a str,
    pub date: NaiveDate,
    pub repeating: bool,
}

/// Input row shared by the todo tabs and the calendar tab.
pub fn todo_form<'a>(form: &TodoForm<'_>) -> Element<'a, Message> {
    let input = text_input::text_input(fl!("todo-placeholder"), form.input.to_string())
        .on_input(Message::TodoInputChanged)
        .on_submit(|_| Message::AddTodo)
        .width(Length::Fill);

    column()
        .spacing(8)
        .push(
            row()
                .spacing(8)
                .align_y(Alignment::Center)
                .push(input)
                .push(
                    button::icon(icon::from_name("list-add-symbolic"))
                        .on_press(Message::AddTodo),
                ),
        )
        .push(
            row()
                .spacing(16)
                .align_y(Alignment::Center)
                .push(
                    checkbox(fl!("todo-repeating"), form.repeating)
                        .on_toggle(Message::TodoRepeatingToggled),
                )
                .push(text::caption(fl!(
                    "todo-for-date",
                    date = form.date.format("%Y-%m-%d").to_string()
                ))),
        )
        .into()
}

pub fn todos_view<'a>(
    title: String,
    todos: &[&Todo],
    form: &TodoForm<'_>,
    orphaned: usize,
    today: NaiveDate,
) -> Element<'a, Message> {
    let mut content = column()
        .spacing(12)
        .push(text::title4(title))
        .push(todo_form(form));

    if orphaned > 0 {
        content = content.push(text::caption(fl!(
            "todo-orphaned",
            count = orphaned.to_string()
        )));
    }

    if todos.is_empty() {
        content = content.push(
            container(text::body(fl!("todo-empty")))
                .padding(32)
                .center_x(Length::Fill),
        );
    } else {
        let mut list = column().spacing(4);
        for todo in todos {
            list = list.push(todo_row(todo, today));
        }
        content = content.push(list);
    }

    container(scrollable(content.padding(16).width(Length::Fill)))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
