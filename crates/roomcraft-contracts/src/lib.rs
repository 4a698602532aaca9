pub mod commands;
pub mod context;
pub mod events;
pub mod records;
pub mod settings;
pub mod storage;
pub mod wire;
