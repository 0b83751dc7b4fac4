//! Parsing `host[:port]` strings and the DNS lookups behind them.
//!
//! Lookups never fail the caller: a missing record or a resolver error is
//! logged and reported as `None`, and the caller falls back to the literal
//! host and default port.

use std::net::{IpAddr, Ipv6Addr};

use hickory_resolver::TokioResolver;
use tracing::debug;

use crate::{
    Error,
    tokio::{new_resolver, resolver},
};

const SRV_PREFIX: &str = "_minecraft._tcp.";

/// Split an address into its host and optional port.
///
/// Accepts `host`, `host:port`, `[v6]`, `[v6]:port` and bare IPv6 literals.
///
/// ```
/// use craftping::address::parse_address;
///
/// assert_eq!(parse_address("mc.example.org:25566")?, ("mc.example.org".into(), Some(25566)));
/// assert_eq!(parse_address("[::1]")?, ("::1".into(), None));
/// # Ok::<(), craftping::Error>(())
/// ```
///
/// # Errors
/// If the host is empty or the port is not a valid `u16`.
pub fn parse_address(address: &str) -> Result<(String, Option<u16>), Error> {
    let address = address.trim();
    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, rest) = rest.split_once(']').ok_or(Error::InvalidAddress)?;
        if host.parse::<Ipv6Addr>().is_err() {
            return Err(Error::InvalidAddress);
        }
        match rest {
            "" => (host, None),
            _ => (host, Some(rest.strip_prefix(':').ok_or(Error::InvalidAddress)?)),
        }
    } else if address.parse::<Ipv6Addr>().is_ok() {
        (address, None)
    } else {
        match address.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (address, None),
        }
    };

    if host.is_empty() || (host.contains(':') && host.parse::<Ipv6Addr>().is_err()) {
        return Err(Error::InvalidAddress);
    }
    let port = port
        .map(|port| port.parse::<u16>().map_err(|_| Error::InvalidAddress))
        .transpose()?;
    Ok((host.to_string(), port))
}

/// Look up the `_minecraft._tcp` SRV record for `host`, returning the first
/// target and its port.
pub async fn srv_lookup(host: &str) -> Option<(String, u16)> {
    srv_lookup_with(resolver(), host).await
}

/// Resolve `host` to its first IP address.
pub async fn ip_lookup(host: &str) -> Option<IpAddr> {
    ip_lookup_with(resolver(), host).await
}

async fn srv_lookup_with(resolver: &TokioResolver, host: &str) -> Option<(String, u16)> {
    if host.parse::<IpAddr>().is_ok() {
        return None;
    }
    let name = format!("{SRV_PREFIX}{host}");
    match resolver.srv_lookup(name.as_str()).await {
        Ok(lookup) => {
            let record = lookup.iter().next()?;
            let target = record.target().to_utf8();
            let target = target.trim_end_matches('.').to_string();
            debug!(%name, %target, port = record.port(), "found srv record");
            Some((target, record.port()))
        }
        Err(e) => {
            debug!(%name, error = %e, "no srv record");
            None
        }
    }
}

async fn ip_lookup_with(resolver: &TokioResolver, host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }
    match resolver.lookup_ip(host).await {
        Ok(lookup) => {
            let ip = lookup.iter().next()?;
            debug!(%host, %ip, "resolved host");
            Some(ip)
        }
        Err(e) => {
            debug!(%host, error = %e, "ip lookup failed");
            None
        }
    }
}

/// Run a lookup on a throwaway single-threaded runtime with its own resolver.
fn block_on_lookup<T, F, Fut>(lookup: F) -> Option<T>
where
    F: FnOnce(TokioResolver) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let runtime = match ::tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            debug!(error = %e, "could not start a runtime for dns");
            return None;
        }
    };
    runtime.block_on(async { lookup(new_resolver()).await })
}

/// Blocking form of [`srv_lookup`]. Must not be called from an async context.
#[must_use]
pub fn srv_lookup_blocking(host: &str) -> Option<(String, u16)> {
    if host.parse::<IpAddr>().is_ok() {
        return None;
    }
    block_on_lookup(|resolver| async move { srv_lookup_with(&resolver, host).await })
}

/// Blocking form of [`ip_lookup`]. Must not be called from an async context.
#[must_use]
pub fn ip_lookup_blocking(host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }
    block_on_lookup(|resolver| async move { ip_lookup_with(&resolver, host).await })
}
