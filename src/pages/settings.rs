use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, column, container, row, scrollable, text, text_input};
use cosmic::Element;

use crate::config::KeepUpConfig;
use crate::core::tab::Tab;
use crate::fl;
use crate::message::Message;

pub fn settings_view<'a>(
    config: &'a KeepUpConfig,
    signed_in_as: Option<&str>,
) -> Element<'a, Message> {
    let mut content = column().spacing(12);

    // --- Account ---
    if let Some(email) = signed_in_as {
        content = content.push(text::title4(fl!("settings-account")));
        content = content.push(
            row()
                .spacing(8)
                .align_y(Alignment::Center)
                .push(text::body(fl!("settings-signed-in-as", email = email.to_string())).width(Length::Fill))
                .push(button::standard(fl!("settings-sign-out")).on_press(Message::SignOut)),
        );
    }

    // --- Database ---
    content = content.push(text::title4(fl!("settings-database")));
    content = content.push(
        text_input::text_input(fl!("settings-database-url"), &config.database_url)
            .on_input(Message::SetDatabaseUrl)
            .width(Length::Fill),
    );
    content = content.push(
        text_input::secure_input(
            fl!("settings-api-key"),
            config.api_key.clone(),
            None::<Message>,
            true,
        )
        .on_input(Message::SetApiKey)
        .width(Length::Fill),
    );
    let note = if config.is_offline() {
        fl!("settings-offline-note")
    } else {
        fl!("settings-online-note")
    };
    content = content.push(text::caption(note));
    if signed_in_as.is_some() {
        content = content.push(text::caption(fl!("settings-backend-after-sign-out")));
    }

    // --- Session ---
    content = content.push(
        row()
            .spacing(8)
            .align_y(Alignment::Center)
            .push(text::body(fl!("settings-remember-session")).width(Length::Fill))
            .push(
                cosmic::widget::toggler(config.remember_session)
                    .on_toggle(|_| Message::ToggleRememberSession),
            ),
    );

    // --- Start tab ---
    let tab_names: Vec<String> = Tab::ALL.iter().map(|tab| tab_name(*tab)).collect();
    let selected = Tab::ALL.iter().position(|tab| *tab == config.start_tab());
    content = content.push(
        row()
            .spacing(8)
            .align_y(Alignment::Center)
            .push(text::body(fl!("settings-start-tab")).width(Length::Fill))
            .push(
                cosmic::widget::dropdown(tab_names, selected, Message::SetStartTab)
                    .width(Length::Fixed(160.0)),
            ),
    );

    // --- Debug logging ---
    content = content.push(
        row()
            .spacing(8)
            .align_y(Alignment::Center)
            .push(text::body(fl!("settings-debug-logging")).width(Length::Fill))
            .push(
                cosmic::widget::toggler(config.debug_logging)
                    .on_toggle(|_| Message::ToggleDebugLogging),
            ),
    );

    content = content.push(
        container(button::standard(fl!("settings-close")).on_press(Message::CloseSettings))
            .padding([8, 0]),
    );

    container(scrollable(content.padding(16).width(Length::Fill)))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

/// Label of a tab in the nav bar and the start-tab picker.
pub fn tab_name(tab: Tab) -> String {
    match tab {
        Tab::Hobby => fl!("tab-hobby"),
        Tab::Daily => fl!("tab-daily"),
        Tab::Weekly => fl!("tab-weekly"),
        Tab::Monthly => fl!("tab-monthly"),
        Tab::Calendar => fl!("tab-calendar"),
        Tab::Topics => fl!("tab-topics"),
    }
}
