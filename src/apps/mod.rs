//! Applications shipped with the binary.

mod heartbeat;

pub use self::heartbeat::Heartbeat;

use anyhow::Result;

use crate::api::{http::HttpApi, ApiRegistry};
use crate::config::WolfConfig;
use crate::registry::{Method, Registration, Registry};

/// Registry holding the built-in applications enabled in `config`.
pub fn builtin(config: &WolfConfig) -> Result<Registry> {
    let mut registry = Registry::new();

    if config.heartbeat.enabled {
        let recurrence = config.heartbeat.recurrence()?;
        registry.register(
            Registration::new("Heartbeat", move || Heartbeat::new(recurrence.clone()))
                .defines([Method::Job, Method::Shutdown]),
        );
    }

    Ok(registry)
}

/// API bindings for every `[[apis]]` entry in `config`.
pub fn apis(config: &WolfConfig) -> Result<ApiRegistry> {
    let mut registry = ApiRegistry::new();
    for api in &config.apis {
        let api = HttpApi::from_config(api)?;
        registry.register(move || api.clone());
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_respects_config() {
        let mut config = WolfConfig::default();
        assert_eq!(builtin(&config).unwrap().len(), 1);

        config.heartbeat.enabled = false;
        assert!(builtin(&config).unwrap().is_empty());
    }

    #[test]
    fn test_apis_from_config() {
        let mut config = WolfConfig::default();
        config.apis.push(crate::config::ApiConfig {
            name: "Tracker".to_string(),
            url: "https://tracker.example.com".to_string(),
            test_url: None,
            token: None,
            test: false,
            timeout_secs: 5,
        });
        let table = apis(&config).unwrap().build();
        assert!(table.get("Tracker").is_ok());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_builtin_rejects_bad_cron() {
        let mut config = WolfConfig::default();
        config.heartbeat.cron = Some("nope".to_string());
        assert!(builtin(&config).is_err());
    }
}
