pub mod calendar;
pub mod hobby;
pub mod session;
pub mod tab;
pub mod todo;
pub mod topic;
