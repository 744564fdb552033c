pub mod core;
pub mod files;
pub mod message;
pub mod roster;
