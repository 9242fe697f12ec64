//! 客户端 IP 提取
//!
//! 只有当连接来自 `auth.trusted_proxies` 中的地址时才信任
//! `X-Forwarded-For`，否则使用 TCP 连接地址，防止伪造。

use std::net::{IpAddr, SocketAddr};

use actix_web::dev::ConnectionInfo;
use tracing::debug;

/// 解析 `ip` 或 `ip:port`
fn parse_ip(value: &str) -> Option<IpAddr> {
    value
        .parse::<SocketAddr>()
        .map(|s| s.ip())
        .or_else(|_| value.parse::<IpAddr>())
        .ok()
}

/// 检查 IP 是否在可信代理列表中（单 IP 或 CIDR）
pub fn is_trusted_proxy(ip: &str, trusted_proxies: &[String]) -> bool {
    let Some(ip_addr) = parse_ip(ip) else {
        return false;
    };

    trusted_proxies.iter().any(|proxy| {
        if proxy.contains('/') {
            ip_in_cidr(&ip_addr, proxy)
        } else {
            proxy.parse::<IpAddr>().is_ok_and(|p| p == ip_addr)
        }
    })
}

/// CIDR 检查
pub fn ip_in_cidr(ip: &IpAddr, cidr: &str) -> bool {
    let Some((network, prefix_len)) = cidr.split_once('/') else {
        return false;
    };
    let Ok(prefix_len) = prefix_len.parse::<u32>() else {
        return false;
    };
    let Ok(network_addr) = network.parse::<IpAddr>() else {
        return false;
    };

    match (ip, network_addr) {
        (IpAddr::V4(ip), IpAddr::V4(net)) if prefix_len <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix_len).unwrap_or(0);
            (u32::from(*ip) & mask) == (u32::from(net) & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) if prefix_len <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix_len).unwrap_or(0);
            (u128::from(*ip) & mask) == (u128::from(net) & mask)
        }
        _ => false,
    }
}

/// 返回用于限流的客户端地址
///
/// 无法获得连接地址时（例如测试请求）返回 `None`。
pub fn client_ip(conn_info: &ConnectionInfo, trusted_proxies: &[String]) -> Option<String> {
    let peer = conn_info.peer_addr()?;
    let peer_ip = parse_ip(peer).map(|ip| ip.to_string()).unwrap_or_else(|| peer.to_string());

    if !trusted_proxies.is_empty() && is_trusted_proxy(peer, trusted_proxies) {
        let real_ip = conn_info
            .realip_remote_addr()
            .and_then(parse_ip)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| peer_ip.clone());
        debug!("Client IP via trusted proxy {}: {}", peer_ip, real_ip);
        return Some(real_ip);
    }

    Some(peer_ip)
}
