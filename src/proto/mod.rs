pub mod command;
pub mod power;
