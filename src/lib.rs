pub mod accessor;
pub mod category;
pub mod cli;
pub mod config;
pub mod endorsement;
pub mod logging;
