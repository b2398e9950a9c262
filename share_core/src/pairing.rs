//! Pairing helper: derive the URL other devices should open, and render it
//! as a scannable code. Consumes only the bound port; takes no part in
//! request handling.

use anyhow::{Context, Result};
use qrcode::QrCode;
use qrcode::render::unicode;

/// Best local IPv4 for other devices on the network, preferring private LAN
/// ranges; loopback when nothing better exists.
pub fn local_ip() -> String {
    local_ip_address::list_afinet_netifas()
        .ok()
        .and_then(|ips| {
            let mut best_ip = None;
            for (_name, ip) in ips {
                if ip.is_loopback() || !ip.is_ipv4() {
                    continue;
                }
                let ip_str = ip.to_string();
                if ip_str.starts_with("192.168.") {
                    return Some(ip_str); // Best match
                }
                if ip_str.starts_with("10.") {
                    best_ip = Some(ip_str);
                    continue;
                }
                if ip_str.starts_with("172.") && best_ip.is_none() {
                    best_ip = Some(ip_str);
                    continue;
                }
                if best_ip.is_none() {
                    best_ip = Some(ip_str);
                }
            }
            best_ip
        })
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

/// Connectable URL for the given port on this host.
pub fn share_url(port: u16) -> String {
    format!("http://{}:{}/", local_ip(), port)
}

/// Render `url` as a PNG for the pairing image endpoint.
pub fn qr_png(url: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(url.as_bytes()).context("cannot encode QR payload")?;

    let qr_image = code
        .render::<image::Luma<u8>>()
        .min_dimensions(240, 240)
        .max_dimensions(480, 480)
        .build();

    let mut png = Vec::new();
    qr_image
        .write_to(
            &mut std::io::Cursor::new(&mut png),
            image::ImageFormat::Png,
        )
        .context("cannot encode QR image as PNG")?;
    Ok(png)
}

/// Render `url` as half-block characters for the startup banner. Colors are
/// inverted so the code stays scannable on dark terminals.
pub fn qr_terminal(url: &str) -> Result<String> {
    let code = QrCode::new(url.as_bytes()).context("cannot encode QR payload")?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}
