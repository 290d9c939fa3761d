//! Mise en forme des datagrammes SSDP.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};

use super::{SSDP_MULTICAST_ADDR, SSDP_PORT};

/// Date au format RFC 1123 (en-tête DATE).
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// NOTIFY ssdp:alive
pub fn alive(max_age: u32, location: &str, nt: &str, server: &str, usn: &str) -> String {
    format!(
        "NOTIFY * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         CACHE-CONTROL: max-age={}\r\n\
         LOCATION: {}\r\n\
         NT: {}\r\n\
         NTS: ssdp:alive\r\n\
         SERVER: {}\r\n\
         USN: {}\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR, SSDP_PORT, max_age, location, nt, server, usn
    )
}

/// NOTIFY ssdp:byebye
pub fn byebye(nt: &str, usn: &str) -> String {
    format!(
        "NOTIFY * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         NT: {}\r\n\
         NTS: ssdp:byebye\r\n\
         USN: {}\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR, SSDP_PORT, nt, usn
    )
}

/// Réponse unicast à un M-SEARCH.
pub fn search_reply(
    max_age: u32,
    date: &str,
    location: &str,
    server: &str,
    st: &str,
    usn: &str,
) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age={}\r\n\
         CONTENT-LENGTH: 0\r\n\
         DATE: {}\r\n\
         EXT:\r\n\
         LOCATION: {}\r\n\
         SERVER: {}\r\n\
         ST: {}\r\n\
         USN: {}\r\n\
         \r\n",
        max_age, date, location, server, st, usn
    )
}

/// Requête de découverte émise par un point de contrôle ; MX est ramené
/// dans `1..=5`.
pub fn msearch(host: SocketAddr, st: &str, mx: u32) -> String {
    let mx = mx.clamp(1, 5);
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         \r\n",
        host, mx, st
    )
}

/// Abonnement GENA transporté en datagramme.
pub fn subscribe(path: &str, host: SocketAddr, callback_url: &str, timeout_sec: u32) -> String {
    format!(
        "SUBSCRIBE {} HTTP/1.1\r\n\
         HOST: {}\r\n\
         CALLBACK: <{}>\r\n\
         NT: upnp:event\r\n\
         TIMEOUT: Second-{}\r\n\
         \r\n",
        path, host, callback_url, timeout_sec
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_http_date() {
        let t = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(http_date(t), "Tue, 05 Mar 2024 07:08:09 GMT");
    }

    #[test]
    fn test_alive_layout() {
        let msg = alive(
            1800,
            "http://10.0.0.2:8080/device.xml",
            "upnp:rootdevice",
            "Linux/6 UPnP/1.0 dlnakit/0.1",
            "uuid:abc::upnp:rootdevice",
        );
        assert!(msg.starts_with("NOTIFY * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\n"));
        assert!(msg.contains("CACHE-CONTROL: max-age=1800\r\n"));
        assert!(msg.contains("NTS: ssdp:alive\r\n"));
        assert!(msg.ends_with("USN: uuid:abc::upnp:rootdevice\r\n\r\n"));
    }

    #[test]
    fn test_msearch_layout() {
        let msg = msearch(super::super::multicast_addr(), "ssdp:all", 3);
        assert_eq!(
            msg,
            "M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\n\
             MAN: \"ssdp:discover\"\r\nMX: 3\r\nST: ssdp:all\r\n\r\n"
        );
    }

    #[test]
    fn test_search_reply_headers() {
        let msg = search_reply(
            1800,
            "Tue, 05 Mar 2024 07:08:09 GMT",
            "http://10.0.0.2:8080/device.xml",
            "Linux/6 UPnP/1.0 dlnakit/0.1",
            "upnp:rootdevice",
            "uuid:abc::upnp:rootdevice",
        );
        assert_eq!(
            msg,
            "HTTP/1.1 200 OK\r\n\
             CACHE-CONTROL: max-age=1800\r\n\
             CONTENT-LENGTH: 0\r\n\
             DATE: Tue, 05 Mar 2024 07:08:09 GMT\r\n\
             EXT:\r\n\
             LOCATION: http://10.0.0.2:8080/device.xml\r\n\
             SERVER: Linux/6 UPnP/1.0 dlnakit/0.1\r\n\
             ST: upnp:rootdevice\r\n\
             USN: uuid:abc::upnp:rootdevice\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_msearch_mx_clamped() {
        let host = super::super::multicast_addr();
        assert!(msearch(host, "ssdp:all", 0).contains("\r\nMX: 1\r\n"));
        assert!(msearch(host, "ssdp:all", 120).contains("\r\nMX: 5\r\n"));
    }

    #[test]
    fn test_subscribe_layout() {
        let host: SocketAddr = "10.0.0.5:49152".parse().unwrap();
        let msg = subscribe("/AVT/event", host, "http://10.0.0.2:8080/cb", 300);
        assert!(msg.starts_with("SUBSCRIBE /AVT/event HTTP/1.1\r\n"));
        assert!(msg.contains("CALLBACK: <http://10.0.0.2:8080/cb>\r\n"));
        assert!(msg.contains("TIMEOUT: Second-300\r\n"));
    }
}
