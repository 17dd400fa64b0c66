#[macro_use]
extern crate rust_i18n;

// Load all translations from the locales directory
i18n!("locales", fallback = "en");

pub mod api;
pub mod board;
pub mod config;
pub mod dashboard;
pub mod datafile;
pub mod error;
pub mod logging;
pub mod refresher;
pub mod timeago;
pub mod toast;
pub mod version;
