use std::fmt::Write as _;
use std::net::UdpSocket;

use anyhow::{Context, Result, bail};

use kibble_core::error::LedgerError;
use kibble_core::service::Ledger;
use kibble_core::store::Store;

/// Print a QR code that opens the web frontend already logged in.
///
/// Without `url`, points at this machine's LAN address on `port`. The
/// password must match the stored one; this never claims the tracker.
pub(crate) fn cmd_qr<S: Store>(
    ledger: &Ledger<S>,
    url: Option<String>,
    port: u16,
    password: &str,
) -> Result<()> {
    ensure_password(ledger, password)?;
    let base = match url {
        Some(u) => u,
        None => {
            let ip = detect_local_ip().context(
                "Could not detect a local network address. Pass the frontend URL explicitly",
            )?;
            format!("http://{ip}:{port}")
        }
    };
    let link = build_login_link(&base, password);
    print_qr_code(&link)?;
    eprintln!("{base}");
    Ok(())
}

fn ensure_password<S: Store>(ledger: &Ledger<S>, password: &str) -> Result<()> {
    if !ledger.password_set()? {
        bail!("No password set yet. Run `kibble status` once to set it");
    }
    if !ledger.password_matches(password)? {
        return Err(LedgerError::AuthInvalid.into());
    }
    Ok(())
}

/// LAN address a phone on the same network can reach the server at.
///
/// Routing a UDP socket towards a public address makes the OS pick the
/// outgoing interface without sending a packet.
fn detect_local_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_loopback() {
        None
    } else {
        Some(ip.to_string())
    }
}

/// `<base>/?p=<password>`; the frontend reads `p` and strips it from the address bar.
fn build_login_link(base: &str, password: &str) -> String {
    let base = base.trim_end_matches('/');
    format!("{base}/?p={}", encode_query_value(password))
}

/// Escape a password for the `p` query value. Passwords may hold spaces,
/// `&` or `#`, any of which would cut the value short on the phone.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

/// Render `data` with Unicode half blocks, two module rows per text line.
fn render_qr(data: &str) -> Result<String> {
    use qrcode::QrCode;

    let code = QrCode::new(data.as_bytes()).context("Failed to generate QR code")?;
    let width = code.width();
    let dark: Vec<bool> = code
        .into_colors()
        .into_iter()
        .map(|c| c == qrcode::Color::Dark)
        .collect();

    let quiet = 1;
    let total = width + 2 * quiet;
    let is_dark = |row: usize, col: usize| {
        (quiet..quiet + width).contains(&row)
            && (quiet..quiet + width).contains(&col)
            && dark[(row - quiet) * width + (col - quiet)]
    };

    let mut out = String::new();
    for row in (0..total).step_by(2) {
        for col in 0..total {
            out.push(match (is_dark(row, col), is_dark(row + 1, col)) {
                (true, true) => '\u{2588}',
                (true, false) => '\u{2580}',
                (false, true) => '\u{2584}',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }
    Ok(out)
}

fn print_qr_code(data: &str) -> Result<()> {
    let rendered = render_qr(data)?;
    eprintln!();
    eprintln!("Scan to open kibble:");
    eprint!("{rendered}");
    eprintln!();
    Ok(())
}
