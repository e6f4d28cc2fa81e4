pub mod recommendations;
pub mod statistics;
pub mod uploads;
