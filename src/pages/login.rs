use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, column, container, row, text, text_input};
use cosmic::Element;

use crate::application::LoginForm;
use crate::fl;
use crate::message::Message;

pub fn login_view<'a>(form: &'a LoginForm, offline: bool) -> Element<'a, Message> {
    let mut content = column()
        .spacing(12)
        .width(Length::Fixed(360.0))
        .push(text::title3(fl!("app-title")));

    if offline {
        content = content.push(text::caption(fl!("login-offline-note")));
    }

    let email = text_input::text_input(fl!("login-email"), &form.email)
        .on_input(Message::LoginEmailChanged)
        .on_submit(|_| Message::SignIn)
        .width(Length::Fill);
    let password = text_input::secure_input(
        fl!("login-password"),
        form.password.clone(),
        None::<Message>,
        true,
    )
    .on_input(Message::LoginPasswordChanged)
    .on_submit(|_| Message::SignIn)
    .width(Length::Fill);

    let sign_in = if form.busy {
        button::suggested(fl!("login-signing-in"))
    } else {
        button::suggested(fl!("login-sign-in")).on_press(Message::SignIn)
    };

    content = content
        .push(email)
        .push(password)
        .push(sign_in.width(Length::Fill));

    if let Some(error) = &form.error {
        content = content.push(text::body(error.clone()));
    }

    if form.offer_create {
        let yes = if form.busy {
            button::suggested(fl!("login-create-yes"))
        } else {
            button::suggested(fl!("login-create-yes")).on_press(Message::CreateAccount)
        };
        content = content.push(
            column()
                .spacing(8)
                .push(text::body(fl!("login-create-prompt")))
                .push(
                    row()
                        .spacing(8)
                        .align_y(Alignment::Center)
                        .push(
                            button::standard(fl!("login-create-no"))
                                .on_press(Message::DismissCreatePrompt),
                        )
                        .push(yes),
                ),
        );
    }

    container(content)
        .padding(32)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}
