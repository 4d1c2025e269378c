use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, checkbox, column, icon, row, text};
use cosmic::Element;

use crate::core::todo::Todo;
use crate::fl;
use crate::message::Message;

/// Checkbox, text and delete button for one todo. Recurring todos get a
/// caption with their interval and when they next come around.
pub fn todo_row(todo: &Todo, today: chrono::NaiveDate) -> Element<'static, Message> {
    let id = todo.id.clone();

    let check = checkbox("", todo.completed).on_toggle({
        let id = id.clone();
        move |_| Message::ToggleTodo(id.clone())
    });

    let mut body = column().spacing(2).push(text::body(todo.text.clone()));

    let mut details = Vec::new();
    if let Some(label) = todo.repeat_label() {
        details.push(label);
    }
    if let Some(next) = todo.next_occurrence(today) {
        details.push(fl!("todo-next", date = next.format("%Y-%m-%d").to_string()));
    }
    if todo.completed {
        if let Some(done) = todo.last_completed_date {
            let local = done.with_timezone(&chrono::Local);
            details.push(fl!("todo-done-at", date = local.format("%Y-%m-%d %H:%M").to_string()));
        }
    }
    if !details.is_empty() {
        body = body.push(text::caption(details.join("  ·  ")));
    }

    row()
        .spacing(8)
        .align_y(Alignment::Center)
        .push(check)
        .push(body.width(Length::Fill))
        .push(
            button::icon(icon::from_name("edit-delete-symbolic"))
                .on_press(Message::DeleteTodo(id)),
        )
        .into()
}
