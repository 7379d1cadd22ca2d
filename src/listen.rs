//! `listen` directive addresses.

use std::fmt;

/// Ports assumed for a `server` block without a `listen` directive.
pub const DEFAULT_LISTEN: &[&str] = &["80", "8000"];

const DEFAULT_PORT: &str = "80";

/// An address and port a server block listens on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenAddr {
    pub addr: String,
    pub port: String,
}

impl ListenAddr {
    /// Parses the first token of a `listen` value.
    ///
    /// Returns `None` for unix sockets and IPv6 literals that do not parse.
    ///
    /// ```
    /// use nginx_agent::ListenAddr;
    ///
    /// let listen = ListenAddr::parse("[::]:8080 ipv6only=on").unwrap();
    /// assert_eq!((listen.addr.as_str(), listen.port.as_str()), ("[::]", "8080"));
    ///
    /// let listen = ListenAddr::parse("443 ssl").unwrap();
    /// assert_eq!((listen.addr.as_str(), listen.port.as_str()), ("*", "443"));
    /// ```
    pub fn parse(value: &str) -> Option<Self> {
        let first = value.split_whitespace().next().unwrap_or_default();
        if first.is_empty() || first.starts_with("unix:") {
            return None;
        }

        if first.contains('[') {
            let (head, tail) = first.rsplit_once(']')?;
            let addr = format!("{head}]");
            if tail.is_empty() {
                return Some(Self::new(addr, DEFAULT_PORT));
            }
            let port = tail.strip_prefix(':')?;
            if port.is_empty() || port.contains(':') {
                return None;
            }
            return Some(Self::new(addr, port));
        }

        match first.rsplit_once(':') {
            Some((addr, port)) if !addr.is_empty() && !port.is_empty() => {
                Some(Self::new(addr, port))
            }
            Some((addr, "")) => Some(Self::new(addr, DEFAULT_PORT)),
            Some(("", port)) => Some(Self::new("*", port)),
            _ if first.chars().all(|c| c.is_ascii_digit()) => Some(Self::new("*", first)),
            _ => Some(Self::new(first, DEFAULT_PORT)),
        }
    }

    fn new(addr: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            port: port.into(),
        }
    }

    /// Maps wildcard addresses to the matching loopback address.
    pub fn reachable(self) -> Self {
        let addr = match self.addr.as_str() {
            "*" | "0.0.0.0" => "127.0.0.1".to_string(),
            "[::]" => "[::1]".to_string(),
            _ => self.addr,
        };
        Self { addr, ..self }
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}
