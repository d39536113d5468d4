pub mod app;
pub mod cli;
pub mod dialog;
pub mod logging;
pub mod model;
pub mod paths;
pub mod reminder;
pub mod settings;
pub mod store;
pub mod types;
