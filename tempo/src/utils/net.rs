use std::net::IpAddr;

use tokio::net::UdpSocket;

/// Returns the address of the interface used for outbound traffic.
///
/// Connecting a UDP socket only selects a route, no packet is sent.
pub async fn local_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect("8.8.8.8:80").await?;
    Ok(socket.local_addr()?.ip())
}
