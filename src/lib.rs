pub mod config;
pub mod connection;
pub mod controller;
pub mod device;
pub mod messages;
pub mod motor;
pub mod runtime;
