use std::{error::Error, fs, io};

use serde::Deserialize;

const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default = "default_binding")]
    pub tcp_socket_binding: String,
    #[serde(default = "default_port")]
    pub tcp_socket_port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_binding() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_database_url() -> String {
    "sqlite://todos.db".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tcp_socket_binding: default_binding(),
            tcp_socket_port: default_port(),
            database_url: default_database_url(),
        }
    }
}

impl Settings {
    /// Reads settings.json from the working directory; a missing file
    /// just means defaults.
    pub fn load() -> Result<Settings, Box<dyn Error>> {
        match fs::read_to_string(SETTINGS_FILENAME) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(err) => Err(err.into()),
        }
    }
}
