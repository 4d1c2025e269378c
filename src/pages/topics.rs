use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, checkbox, column, container, icon, row, scrollable, text, text_input};
use cosmic::Element;

use crate::board::topics::TopicDraft;
use crate::core::topic::Topic;
use crate::fl;
use crate::message::Message;

pub fn topics_view<'a>(topics: &[Topic]) -> Element<'a, Message> {
    let mut content = column().spacing(12).push(
        row()
            .spacing(8)
            .align_y(Alignment::Center)
            .push(text::title4(fl!("topics-title")).width(Length::Fill))
            .push(
                button::suggested(fl!("topics-new"))
                    .on_press(Message::OpenTopicEditor(None)),
            ),
    );

    if topics.is_empty() {
        content = content.push(
            container(text::body(fl!("topics-empty")))
                .padding(32)
                .center_x(Length::Fill),
        );
    }

    for topic in topics {
        content = content.push(topic_card(topic));
    }

    container(scrollable(content.padding(16).width(Length::Fill)))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn topic_card(topic: &Topic) -> Element<'static, Message> {
    let progress = fl!(
        "topics-progress",
        done = topic.completed_count().to_string(),
        total = topic.subtasks.len().to_string()
    );

    let header = row()
        .spacing(8)
        .align_y(Alignment::Center)
        .push(
            column()
                .spacing(2)
                .push(text::title4(topic.title.clone()))
                .push(text::caption(progress))
                .width(Length::Fill),
        )
        .push(
            button::icon(icon::from_name("document-edit-symbolic"))
                .on_press(Message::OpenTopicEditor(Some(topic.id.clone()))),
        )
        .push(
            button::icon(icon::from_name("edit-delete-symbolic"))
                .on_press(Message::DeleteTopic(topic.id.clone())),
        );

    let mut card = column().spacing(4).push(header);
    for subtask in &topic.subtasks {
        let topic_id = topic.id.clone();
        let subtask_id = subtask.id;
        card = card.push(
            checkbox(subtask.text.clone(), subtask.completed)
                .on_toggle(move |_| Message::ToggleSubtask(topic_id.clone(), subtask_id)),
        );
    }

    container(card).padding(12).width(Length::Fill).into()
}

/// The add / edit popup, shown in the context drawer.
pub fn topic_editor<'a>(draft: &TopicDraft, subtask_input: &str) -> Element<'a, Message> {
    let title = text_input::text_input(fl!("topics-title-placeholder"), draft.title().to_string())
        .on_input(Message::DraftTitleChanged)
        .width(Length::Fill);

    let add_row = row()
        .spacing(8)
        .align_y(Alignment::Center)
        .push(
            text_input::text_input(fl!("topics-subtask-placeholder"), subtask_input.to_string())
                .on_input(Message::DraftSubtaskInputChanged)
                .on_submit(|_| Message::DraftAddSubtask)
                .width(Length::Fill),
        )
        .push(
            button::icon(icon::from_name("list-add-symbolic"))
                .on_press(Message::DraftAddSubtask),
        );

    let mut content = column().spacing(12).push(title).push(add_row);

    for subtask in draft.subtasks() {
        let id = subtask.id;
        content = content.push(
            row()
                .spacing(8)
                .align_y(Alignment::Center)
                .push(
                    checkbox(subtask.text.clone(), subtask.completed)
                        .on_toggle(move |_| Message::DraftToggleSubtask(id))
                        .width(Length::Fill),
                )
                .push(
                    button::icon(icon::from_name("edit-delete-symbolic"))
                        .on_press(Message::DraftRemoveSubtask(id)),
                ),
        );
    }

    content = content.push(
        row()
            .spacing(8)
            .push(button::standard(fl!("topics-cancel")).on_press(Message::CloseTopicEditor))
            .push(button::suggested(fl!("topics-save")).on_press(Message::SaveTopic)),
    );

    content.into()
}
