pub mod commands;
pub mod config;
pub mod engine;
pub mod export;
pub mod i18n;
pub mod installation;
pub mod output;
pub mod project;
pub mod tables;
