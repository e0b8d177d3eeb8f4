use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("PARLEY_BIND").unwrap_or_else(|_| "0.0.0.0".to_owned()),
            port: env::var("PARLEY_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        }
    }
}
