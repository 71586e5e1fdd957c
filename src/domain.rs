pub mod completion;
pub mod consent;
pub mod models;
pub mod ports;
