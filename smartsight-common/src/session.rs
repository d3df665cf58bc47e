use zenoh::Session;

use crate::config::ZenohConfig;
use crate::error::{Error, Result};

/// Open a Zenoh session from the bridge's connection settings.
pub async fn connect(config: &ZenohConfig) -> Result<Session> {
    let zenoh_config = build_zenoh_config(config)?;

    tracing::info!(
        mode = %config.mode,
        connect = ?config.connect,
        listen = ?config.listen,
        "Connecting to Zenoh"
    );

    let session = zenoh::open(zenoh_config).await?;

    tracing::info!(zid = %session.zid(), "Connected to Zenoh");

    Ok(session)
}

fn build_zenoh_config(config: &ZenohConfig) -> Result<zenoh::Config> {
    let mut zenoh_config = zenoh::Config::default();

    let mode = match config.mode.as_str() {
        "client" | "peer" | "router" => format!("\"{}\"", config.mode),
        other => {
            return Err(Error::Config(format!(
                "Invalid Zenoh mode: '{}'. Expected 'client', 'peer', or 'router'",
                other
            )));
        }
    };
    zenoh_config
        .insert_json5("mode", &mode)
        .map_err(|e| Error::Config(format!("Failed to set mode: {}", e)))?;

    insert_endpoints(&mut zenoh_config, "connect/endpoints", &config.connect)?;
    insert_endpoints(&mut zenoh_config, "listen/endpoints", &config.listen)?;

    Ok(zenoh_config)
}

fn insert_endpoints(zenoh_config: &mut zenoh::Config, key: &str, endpoints: &[String]) -> Result<()> {
    if endpoints.is_empty() {
        return Ok(());
    }
    let json = serde_json::to_string(endpoints)?;
    zenoh_config
        .insert_json5(key, &json)
        .map_err(|e| Error::Config(format!("Failed to set {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_mode() {
        let config = ZenohConfig {
            mode: "satellite".to_string(),
            ..Default::default()
        };
        assert!(matches!(build_zenoh_config(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_accepts_client_with_endpoints() {
        let config = ZenohConfig {
            mode: "client".to_string(),
            connect: vec!["tcp/localhost:7447".to_string()],
            listen: Vec::new(),
        };
        assert!(build_zenoh_config(&config).is_ok());
    }
}
