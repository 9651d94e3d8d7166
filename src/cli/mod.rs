//! Terminal rendering of the dashboard data. Nothing outside this module prints.

pub mod chart;
pub mod market;
pub mod portfolio;
pub mod ui;
pub mod watch;
