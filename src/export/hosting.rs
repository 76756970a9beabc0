//! Static hosting configuration for the generated site.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::error::ExportError;

pub const HOSTING_CONFIG_FILE: &str = "firebase.json";

/// `max-age` applied to every HTML page, in seconds.
const HTML_MAX_AGE: u32 = 3600;

/// Hosting config serving `site/` (relative to the output root) with clean
/// URLs, so `/e/PA107/` resolves to `e/PA107/index.html`.
#[must_use]
pub fn hosting_config() -> Value {
    json!({
        "hosting": {
            "public": "site",
            "cleanUrls": true,
            "trailingSlash": true,
            "ignore": ["firebase.json", "**/.*"],
            "headers": [
                {
                    "source": "**/*.html",
                    "headers": [
                        {
                            "key": "Cache-Control",
                            "value": format!("public, max-age={HTML_MAX_AGE}")
                        }
                    ]
                }
            ]
        }
    })
}

/// Writes `firebase.json` into `output_root`; returns its path.
pub fn write_hosting_config<P: AsRef<Path>>(output_root: P) -> Result<PathBuf, ExportError> {
    let output_root = output_root.as_ref();
    let json = serde_json::to_string_pretty(&hosting_config())?;

    std::fs::create_dir_all(output_root).map_err(|source| ExportError::DirCreate {
        path: output_root.to_path_buf(),
        source,
    })?;
    let path = output_root.join(HOSTING_CONFIG_FILE);
    std::fs::write(&path, format!("{json}\n")).map_err(|source| ExportError::FileWrite {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hosting_config_shape() {
        let config = hosting_config();
        assert_eq!(config["hosting"]["public"], "site");
        assert_eq!(config["hosting"]["cleanUrls"], true);
        assert_eq!(
            config["hosting"]["headers"][0]["headers"][0]["value"],
            "public, max-age=3600"
        );
    }

    #[test]
    fn test_write_hosting_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_hosting_config(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("firebase.json"));

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, hosting_config());
    }
}
