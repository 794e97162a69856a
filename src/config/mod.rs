//! Configuration module for Lectern.
//!
//! Handles loading the API endpoint, credential and transport tuning.

mod settings;

pub use settings::{
    ApiSettings, DownloadSettings, GeneralSettings, Settings, TransportSettings, ENV_API_TOKEN,
    ENV_API_URL,
};
