pub mod archive;
pub mod cli;
pub mod config;
pub mod engine;
pub mod game;
pub mod library;
pub mod manifest;
pub mod package;
pub mod patch;
