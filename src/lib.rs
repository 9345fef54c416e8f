pub mod browser;
pub mod cli;
pub mod config;
pub mod controller;
pub mod detect;
pub mod heuristics;
pub mod injector;
pub mod loader;
pub mod logging;
pub mod models;
pub mod next_episode;
pub mod overlay;
pub mod page;
pub mod panel;
pub mod report;
pub mod scheduler;
pub mod settings;
pub mod storage;
pub mod ui;
