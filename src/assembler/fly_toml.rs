//! Platform deployment descriptor (`fly.toml`)

use crate::discovery::HEALTH_PATH;
use crate::env::EnvEntry;
use serde::Serialize;

pub const FLY_TOML: &str = "fly.toml";

#[derive(Debug, Clone, Serialize)]
pub struct FlyConfig {
    pub app: String,
    pub primary_region: String,
    pub env: toml::Table,
    pub http_service: HttpService,
    pub vm: Vec<VmSize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpService {
    pub internal_port: u16,
    pub force_https: bool,
    pub auto_stop_machines: bool,
    pub auto_start_machines: bool,
    pub min_machines_running: u32,
    pub processes: Vec<String>,
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub interval: String,
    pub grace_period: String,
    pub method: String,
    pub path: String,
    pub protocol: String,
    pub timeout: String,
    pub tls_skip_verify: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VmSize {
    pub memory: String,
    pub cpu_kind: String,
    pub cpus: u32,
}

impl FlyConfig {
    /// Builds the descriptor; only PLAIN entries are accepted into `[env]`
    pub fn new(app: &str, region: &str, port: u16, plain: &[EnvEntry]) -> Self {
        let mut env = toml::Table::new();
        env.insert("PORT".to_string(), toml::Value::String(port.to_string()));
        for entry in plain.iter().filter(|e| !e.is_secret()) {
            if entry.key.eq_ignore_ascii_case("PORT") {
                continue;
            }
            env.insert(entry.key.clone(), toml::Value::String(entry.value.clone()));
        }

        Self {
            app: app.to_string(),
            primary_region: region.to_string(),
            env,
            http_service: HttpService {
                internal_port: port,
                force_https: true,
                auto_stop_machines: true,
                auto_start_machines: true,
                min_machines_running: 0,
                processes: vec!["app".to_string()],
                checks: vec![HealthCheck {
                    interval: "10s".to_string(),
                    grace_period: "5s".to_string(),
                    method: "GET".to_string(),
                    path: HEALTH_PATH.to_string(),
                    protocol: "http".to_string(),
                    timeout: "5s".to_string(),
                    tls_skip_verify: false,
                }],
            },
            vm: vec![VmSize {
                memory: "512mb".to_string(),
                cpu_kind: "shared".to_string(),
                cpus: 1,
            }],
        }
    }

    pub fn render(&self) -> Result<String, toml::ser::Error> {
        let body = toml::to_string(self)?;
        Ok(format!("# fly.toml generated by getmethatdawg\n{}", body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::classify_text;

    #[test]
    fn test_render_parses_back() {
        let buckets = classify_text("DEBUG=false\nPORT=8080\nGREETING=say \"hi\"\nAPI_TOKEN=x\n").unwrap();
        let rendered = FlyConfig::new("hello-app", "iad", 5000, &buckets.plain)
            .render()
            .unwrap();
        let value: toml::Value = toml::from_str(&rendered).unwrap();

        assert_eq!(value["app"].as_str(), Some("hello-app"));
        assert_eq!(value["primary_region"].as_str(), Some("iad"));
        assert_eq!(value["env"]["PORT"].as_str(), Some("5000"));
        assert_eq!(value["env"]["DEBUG"].as_str(), Some("false"));
        assert_eq!(value["env"]["GREETING"].as_str(), Some("say \"hi\""));
        assert!(value["env"].get("API_TOKEN").is_none());

        let service = &value["http_service"];
        assert_eq!(service["internal_port"].as_integer(), Some(5000));
        assert_eq!(service["force_https"].as_bool(), Some(true));
        assert_eq!(service["min_machines_running"].as_integer(), Some(0));
        assert_eq!(service["checks"][0]["path"].as_str(), Some("/"));
        assert_eq!(service["checks"][0]["method"].as_str(), Some("GET"));
        assert_eq!(value["vm"][0]["memory"].as_str(), Some("512mb"));
    }

    #[test]
    fn test_env_order_follows_input() {
        let buckets = classify_text("ZETA=1\nALPHA=2\n").unwrap();
        let config = FlyConfig::new("a", "iad", 5000, &buckets.plain);
        let keys: Vec<_> = config.env.keys().cloned().collect();
        assert_eq!(keys, vec!["PORT", "ZETA", "ALPHA"]);
    }
}
