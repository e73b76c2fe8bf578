pub mod calendar;
pub mod credential;
