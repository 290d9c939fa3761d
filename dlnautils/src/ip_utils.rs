use get_if_addrs::get_if_addrs;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tracing::warn;

/// Devine l'adresse IP locale de la machine.
///
/// Un socket UDP est "connecté" vers `8.8.8.8:80` : aucun paquet n'est émis,
/// mais le système choisit l'interface de sortie, dont on lit l'adresse.
/// Retourne `127.0.0.1` en cas d'échec.
pub fn guess_local_ip() -> String {
    match UdpSocket::bind("0.0.0.0:0") {
        Ok(socket) => {
            if socket.connect("8.8.8.8:80").is_ok() {
                if let Ok(local_addr) = socket.local_addr() {
                    return local_addr.ip().to_string();
                }
            }
            "127.0.0.1".to_string()
        }
        Err(_) => "127.0.0.1".to_string(),
    }
}

/// Liste les adresses IPv4 non-loopback des interfaces réseau.
///
/// Utilisé pour rejoindre le groupe multicast SSDP sur chaque interface.
pub fn ipv4_interfaces() -> Vec<Ipv4Addr> {
    match get_if_addrs() {
        Ok(interfaces) => interfaces
            .into_iter()
            .filter_map(|iface| match iface.ip() {
                IpAddr::V4(ip) if !ip.is_loopback() => Some(ip),
                _ => None,
            })
            .collect(),
        Err(e) => {
            warn!("Failed to list network interfaces: {}", e);
            Vec::new()
        }
    }
}

/// Indique si deux adresses appartiennent au même sous-réseau pour `netmask`.
pub fn same_subnet(local: Ipv4Addr, peer: Ipv4Addr, netmask: Ipv4Addr) -> bool {
    let mask = u32::from(netmask);
    (u32::from(local) & mask) == (u32::from(peer) & mask)
}
