mod abuse_report;
mod advice;
mod appointment;
mod user;

pub use abuse_report::*;
pub use advice::*;
pub use appointment::*;
pub use user::*;
