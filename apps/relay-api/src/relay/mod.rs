pub mod events;
pub mod fanout;
pub mod registry;
pub mod rooms;
pub mod server;
pub mod service;
