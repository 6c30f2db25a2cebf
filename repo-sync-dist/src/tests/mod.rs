mod config;
mod package;
mod targets;
