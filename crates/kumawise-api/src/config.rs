use clap::Args;
use ipnetwork::IpNetwork;
use kumawise_engine::config::ConfigError;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

// Webhook listener and its access controls
#[derive(Clone, Args)]
pub struct ApiConfig {
    #[arg(long = "bind-addr", env = "BIND_ADDR", default_value = "0.0.0.0:5000")]
    pub bind_addr: SocketAddr,

    // shared secret expected in X-Webhook-Token; empty disables the check
    #[arg(long = "webhook-token", env = "WEBHOOK_TOKEN", hide_env_values = true)]
    pub webhook_token: Option<String>,

    // comma separated IPs or CIDRs; empty allows everyone
    #[arg(long = "allowed-ips", env = "ALLOWED_IPS", default_value = "")]
    pub allowed_ips: String,

    // take the client address from the first X-Forwarded-For hop
    #[arg(long = "trust-forwarded-for", env = "TRUST_FORWARDED_FOR")]
    pub trust_forwarded_for: bool,
}

impl ApiConfig {
    pub fn webhook_token(&self) -> Option<&str> {
        self.webhook_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn allow_list(&self) -> Result<AllowList, ConfigError> {
        AllowList::parse(&self.allowed_ips, self.trust_forwarded_for)
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("webhook_token", &self.webhook_token().map(|_| "<redacted>"))
            .field("allowed_ips", &self.allowed_ips)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish()
    }
}

/// Source networks allowed to call the webhook.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    networks: Vec<IpNetwork>,
    trust_forwarded_for: bool,
}

impl AllowList {
    pub fn parse(list: &str, trust_forwarded_for: bool) -> Result<Self, ConfigError> {
        let networks = list
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(parse_network)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            networks,
            trust_forwarded_for,
        })
    }

    /// An empty list admits every caller.
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn trusts_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    pub fn permits(&self, ip: IpAddr) -> bool {
        if self.is_empty() {
            return true;
        }
        // IPv4 peers show up as ::ffff:a.b.c.d on dual-stack sockets
        let ip = ip.to_canonical();
        self.networks.iter().any(|network| network.contains(ip))
    }
}

fn parse_network(entry: &str) -> Result<IpNetwork, ConfigError> {
    if !entry.contains('/') {
        return entry
            .parse::<IpAddr>()
            .map(IpNetwork::from)
            .map_err(|e| ConfigError::InvalidNetwork(entry.to_string(), e.to_string()));
    }
    entry
        .parse::<IpNetwork>()
        .map_err(|e| ConfigError::InvalidNetwork(entry.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        api: ApiConfig,
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::try_parse_from(["kumawise-api"]).unwrap();
        assert_eq!(cli.api.bind_addr.port(), 5000);
        assert_eq!(cli.api.webhook_token(), None);
        assert!(cli.api.allow_list().unwrap().is_empty());
        assert!(!cli.api.trust_forwarded_for);
    }

    #[test]
    fn test_empty_token_disables_auth() {
        let cli = TestCli::try_parse_from(["kumawise-api", "--webhook-token", ""]).unwrap();
        assert_eq!(cli.api.webhook_token(), None);
    }

    #[test]
    fn test_allow_list_matching() {
        let list = AllowList::parse("10.0.0.0/8, 192.168.1.7 ,2001:db8::/32", false).unwrap();

        assert!(list.permits(ip("10.20.30.40")));
        assert!(list.permits(ip("192.168.1.7")));
        assert!(!list.permits(ip("192.168.1.8")));
        assert!(list.permits(ip("2001:db8::1")));
        assert!(list.permits(ip("::ffff:10.1.1.1")));
        assert!(!list.permits(ip("8.8.8.8")));
    }

    #[test]
    fn test_empty_list_permits_everyone() {
        let list = AllowList::parse(" , ", false).unwrap();
        assert!(list.is_empty());
        assert!(list.permits(ip("8.8.8.8")));
    }

    #[test]
    fn test_bad_entry_is_rejected() {
        let err = AllowList::parse("10.0.0.0/8,not-an-ip", false).unwrap_err();
        assert!(err.to_string().contains("not-an-ip"));
    }
}
