//! Local resolver list from the host's resolv.conf.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

pub const DEFAULT_PATH: &str = "/etc/resolv.conf";

#[derive(Debug, thiserror::Error)]
pub enum ResolvConfError {
    #[error("Cannot read resolver configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The nameservers listed in resolv.conf, in file order. `options` lines are
/// not read: retries and timeout come from the command line or config only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvConf {
    pub servers: Vec<IpAddr>,
}

impl ResolvConf {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ResolvConfError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|source| ResolvConfError::Io { path: path.to_path_buf(), source })?;
        let conf = Self::parse(&content);
        debug!("Loaded {} nameservers from {}", conf.servers.len(), path.display());
        Ok(conf)
    }

    pub fn parse(content: &str) -> Self {
        let mut conf = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let mut words = line.split_whitespace();
            // domain, search, options and friends do not affect the check
            if words.next() == Some("nameserver") {
                conf.parse_nameserver(words.next());
            }
        }
        conf
    }

    fn parse_nameserver(&mut self, word: Option<&str>) {
        let Some(word) = word else {
            warn!("resolv.conf: nameserver line without an address");
            return;
        };
        // fe80::1%eth0 - the scope is meaningless once we hold an IpAddr
        let addr = word.split('%').next().unwrap_or(word);
        match addr.parse::<IpAddr>() {
            Ok(ip) => self.servers.push(ip),
            Err(_) => warn!("resolv.conf: ignoring invalid nameserver '{}'", word),
        }
    }
}

/// An extra local resolver given as `ip`, `ip:port`, `[v6]:port` or a host
/// name. Host names go through the system resolver once, first address wins.
pub async fn resolve_nameserver(server: &str, default_port: u16) -> anyhow::Result<SocketAddr> {
    let server = server.trim();
    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = server.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }

    let (host, port) = match server.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>()
            .map_err(|_| anyhow::anyhow!("Invalid port in nameserver '{}'", server))?),
        None => (server, default_port),
    };
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| anyhow::anyhow!("Cannot resolve nameserver '{}': {}", server, e))?
        .next()
        .ok_or_else(|| anyhow::anyhow!("Nameserver '{}' has no addresses", server))
}

/// The ordered local resolver list: resolv.conf servers at `port`, then each
/// extra server as given. Extras that cannot be resolved are skipped.
pub async fn local_resolvers(conf: &ResolvConf, extra: &[String], port: u16) -> anyhow::Result<Vec<SocketAddr>> {
    let mut resolvers: Vec<SocketAddr> = conf.servers.iter().map(|ip| SocketAddr::new(*ip, port)).collect();
    for server in extra {
        match resolve_nameserver(server, port).await {
            Ok(addr) => resolvers.push(addr),
            Err(e) => warn!("Ignoring nameserver: {:#}", e),
        }
    }
    if resolvers.is_empty() {
        anyhow::bail!("No local resolvers configured");
    }
    Ok(resolvers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolv_conf() {
        let conf = ResolvConf::parse(
            "# generated\n\
             search example.com\n\
             nameserver 192.0.2.1\n\
             nameserver   2001:db8::53\n\
             ; comment\n\
             nameserver fe80::1%eth0\n\
             options rotate timeout:0 attempts:0 ndots:1\n",
        );
        assert_eq!(
            conf.servers,
            vec![
                "192.0.2.1".parse::<IpAddr>().unwrap(),
                "2001:db8::53".parse().unwrap(),
                "fe80::1".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn test_invalid_lines_are_skipped() {
        let conf = ResolvConf::parse("nameserver\nnameserver not-an-ip\noptions timeout:x\nnameserver 198.51.100.7\n");
        assert_eq!(conf.servers, vec!["198.51.100.7".parse::<IpAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn test_resolve_nameserver_forms() {
        assert_eq!(resolve_nameserver("192.0.2.1", 53).await.unwrap(), "192.0.2.1:53".parse().unwrap());
        assert_eq!(resolve_nameserver("192.0.2.1:5353", 53).await.unwrap(), "192.0.2.1:5353".parse().unwrap());
        assert_eq!(resolve_nameserver("2001:db8::1", 53).await.unwrap(), "[2001:db8::1]:53".parse().unwrap());
        assert_eq!(resolve_nameserver("[2001:db8::1]:54", 53).await.unwrap(), "[2001:db8::1]:54".parse().unwrap());
        assert_eq!(resolve_nameserver("localhost:5300", 53).await.unwrap().port(), 5300);
        assert!(resolve_nameserver("localhost:notaport", 53).await.is_err());
    }

    #[tokio::test]
    async fn test_local_resolvers_order_and_skips() {
        let conf = ResolvConf::parse("nameserver 192.0.2.1\nnameserver 2001:db8::53\n");
        let extra = vec![
            "198.51.100.1:5353".to_string(),
            "localhost:notaport".to_string(),
            "203.0.113.9".to_string(),
        ];

        let resolvers = local_resolvers(&conf, &extra, 5300).await.unwrap();
        let expected: Vec<SocketAddr> = ["192.0.2.1:5300", "[2001:db8::53]:5300", "198.51.100.1:5353", "203.0.113.9:5300"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(resolvers, expected);
    }

    #[tokio::test]
    async fn test_local_resolvers_extras_only() {
        let resolvers = local_resolvers(&ResolvConf::default(), &["192.0.2.53".to_string()], 53).await.unwrap();
        assert_eq!(resolvers, vec!["192.0.2.53:53".parse::<SocketAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn test_no_local_resolvers_is_an_error() {
        assert!(local_resolvers(&ResolvConf::default(), &[], 53).await.is_err());

        let conf = ResolvConf::parse("# empty\noptions attempts:2\n");
        assert!(local_resolvers(&conf, &["localhost:notaport".to_string()], 53).await.is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ResolvConf::load("/nonexistent/resolv.conf").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/resolv.conf"));
    }
}
