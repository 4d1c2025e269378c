pub mod calendar;
pub mod hobbies;
pub mod login;
pub mod settings;
pub mod todos;
pub mod topics;
