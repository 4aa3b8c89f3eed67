//! RKE2 config-file and install-script generation (§4.5 step 1 & 3).

/// Canonical on-disk path RKE2 writes the shared join token to once the
/// first master's server is up.
pub const NODE_TOKEN_PATH: &str = "/var/lib/rancher/rke2/server/node-token";

const CONFIG_PATH: &str = "/etc/rancher/rke2/config.yaml";
const STATE_MARKER: &str = "/etc/rancher/rke2/.fleetwright-bootstrapped";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub node_ip: String,
    pub node_external_ip: String,
    pub advertise_address: String,
    pub tls_san: Vec<String>,
    pub token: String,
    pub cni: String,
    pub disabled_components: Vec<String>,
    pub secrets_encryption: bool,
    pub snapshot_schedule: Option<String>,
    /// `None` for the first master; `Some("https://<first-master-overlay-ip>:9345")`
    /// for every additional master (§4.5 step 3).
    pub server_url: Option<String>,
}

impl ServerConfig {
    pub fn to_yaml(&self) -> String {
        let mut lines = vec![
            format!("node-ip: \"{}\"", self.node_ip),
            format!("node-external-ip: \"{}\"", self.node_external_ip),
            format!("advertise-address: \"{}\"", self.advertise_address),
            format!(
                "tls-san:\n{}",
                self.tls_san
                    .iter()
                    .map(|s| format!("  - \"{s}\""))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
            format!("token: \"{}\"", self.token),
            format!("cni: \"{}\"", self.cni),
            "write-kubeconfig-mode: \"0644\"".to_string(),
            format!("secrets-encryption: {}", self.secrets_encryption),
        ];
        if !self.disabled_components.is_empty() {
            lines.push(format!(
                "disable:\n{}",
                self.disabled_components
                    .iter()
                    .map(|c| format!("  - \"{c}\""))
                    .collect::<Vec<_>>()
                    .join("\n")
            ));
        }
        if let Some(schedule) = &self.snapshot_schedule {
            lines.push(format!("etcd-snapshot-schedule-cron: \"{schedule}\""));
        }
        if let Some(url) = &self.server_url {
            lines.push(format!("server: \"{url}\""));
        }
        lines.join("\n")
    }
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub node_ip: String,
    pub server_url: String,
    pub token: String,
}

impl AgentConfig {
    pub fn to_yaml(&self) -> String {
        format!(
            "node-ip: \"{}\"\nserver: \"{}\"\ntoken: \"{}\"",
            self.node_ip, self.server_url, self.token
        )
    }
}

/// Writes `config_yaml` to the canonical path, installs the release, and
/// enables/starts the service — idempotently: a marker file guards the
/// install/start so re-running a completed bootstrap is a no-op (§4.5
/// "re-running a completed bootstrap is a no-op").
pub fn server_install_script(config_yaml: &str, version: &str) -> String {
    install_and_start_script(config_yaml, version, "server", "rke2-server")
}

pub fn agent_install_script(config_yaml: &str, version: &str) -> String {
    install_and_start_script(config_yaml, version, "agent", "rke2-agent")
}

fn install_and_start_script(config_yaml: &str, version: &str, install_type: &str, service: &str) -> String {
    format!(
        "set -e\n\
         mkdir -p /etc/rancher/rke2\n\
         cat > {CONFIG_PATH} <<'FLEETWRIGHT_CONFIG'\n\
         {config_yaml}\n\
         FLEETWRIGHT_CONFIG\n\
         if [ ! -f {STATE_MARKER} ]; then\n\
         \tcurl -sfL https://get.rke2.io | INSTALL_RKE2_VERSION={version} INSTALL_RKE2_TYPE={install_type} sh -\n\
         \ttouch {STATE_MARKER}\n\
         fi\n\
         systemctl enable {service}\n\
         systemctl start {service}\n"
    )
}

pub fn readiness_script(service: &str) -> String {
    format!("systemctl is-active {service}")
}

pub fn token_read_script() -> String {
    format!("cat {NODE_TOKEN_PATH}")
}

pub fn recent_log_script(service: &str) -> String {
    format!("journalctl -u {service} -n 200 --no-pager")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_yaml_carries_every_required_field() {
        let cfg = ServerConfig {
            node_ip: "10.8.0.10".to_string(),
            node_external_ip: "203.0.113.10".to_string(),
            advertise_address: "10.8.0.10".to_string(),
            tls_san: vec!["203.0.113.10".to_string(), "10.8.0.10".to_string()],
            token: "shared-token".to_string(),
            cni: "canal".to_string(),
            disabled_components: vec!["rke2-ingress-nginx".to_string()],
            secrets_encryption: true,
            snapshot_schedule: Some("0 */6 * * *".to_string()),
            server_url: None,
        };
        let yaml = cfg.to_yaml();
        assert!(yaml.contains("node-ip: \"10.8.0.10\""));
        assert!(yaml.contains("write-kubeconfig-mode: \"0644\""));
        assert!(yaml.contains("secrets-encryption: true"));
        assert!(yaml.contains("rke2-ingress-nginx"));
        assert!(!yaml.contains("server:"));
    }

    #[test]
    fn additional_master_config_points_at_first_master_server_url() {
        let cfg = ServerConfig {
            node_ip: "10.8.0.11".to_string(),
            node_external_ip: "203.0.113.11".to_string(),
            advertise_address: "10.8.0.11".to_string(),
            tls_san: vec![],
            token: "shared-token".to_string(),
            cni: "canal".to_string(),
            disabled_components: vec![],
            secrets_encryption: false,
            snapshot_schedule: None,
            server_url: Some("https://10.8.0.10:9345".to_string()),
        };
        assert!(cfg.to_yaml().contains("server: \"https://10.8.0.10:9345\""));
    }

    #[test]
    fn install_script_is_idempotent_via_marker_file() {
        let script = server_install_script("node-ip: x", "v1.30.0+rke2r1");
        assert!(script.contains(STATE_MARKER));
        assert!(script.contains("systemctl enable rke2-server"));
    }
}
