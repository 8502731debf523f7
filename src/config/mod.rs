//! Configuration: built-in defaults overlaid by ~/.config/wasmpad/.wasmpadrc
//! and environment variables.

use std::{
    collections::HashMap,
    env, fs,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let mut map = default_map();
        let config_path = default_config_path();

        // Read .wasmpadrc if exists
        if config_path.exists() {
            if let Ok(file) = fs::File::open(&config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        // ENV first
        if let Ok(v) = env::var(key) {
            return Some(v);
        }
        self.inner.get(key).cloned()
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse::<u64>().ok())
    }

    /// Base URL of the compile service; artifact references resolve
    /// against it too.
    pub fn compile_url(&self) -> String {
        self.get("COMPILE_URL")
            .unwrap_or_else(|| "http://127.0.0.1:8000".into())
    }

    pub fn request_timeout(&self) -> u64 {
        self.get_u64("REQUEST_TIMEOUT").unwrap_or(60)
    }
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &["COMPILE_URL", "REQUEST_TIMEOUT", "DEFAULT_PACKAGE"];

    KEYS.contains(&k) || k.starts_with("WASMPAD_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("wasmpad").join(".wasmpadrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    m.insert("COMPILE_URL".into(), "http://127.0.0.1:8000".into());
    m.insert("REQUEST_TIMEOUT".into(), "60".into());
    m.insert("DEFAULT_PACKAGE".into(), "demo_code".into());

    m
}
