//! Human-readable output.

use std::fmt::Write;

use mailprobe_core::{ProbeResult, WELL_KNOWN_PORTS};

/// Renders a probe result for the terminal.
pub fn render(result: &ProbeResult) -> String {
    let mut out = String::new();

    if result.success() {
        let _ = writeln!(out, "{}", result.summary());
    } else {
        let _ = writeln!(
            out,
            "Probe of {}:{} failed: {}",
            result.hostname,
            result.port,
            result.summary()
        );
    }
    out.push('\n');

    let _ = writeln!(out, "{:<14}{}", "Protocol:", result.protocol);
    if let Some(upgraded) = result.tls_upgraded() {
        let _ = writeln!(out, "{:<14}{}", "TLS:", if upgraded { "yes" } else { "no" });
    }
    if let Some(greeting) = result.greeting() {
        for (i, line) in greeting.lines().enumerate() {
            let label = if i == 0 { "Greeting:" } else { "" };
            let _ = writeln!(out, "{label:<14}{line}");
        }
    }

    if let Some(capabilities) = result.capabilities() {
        let _ = writeln!(out, "Capabilities:");
        for cap in capabilities {
            let _ = writeln!(out, "  {cap}");
        }

        let mechanisms = capabilities.auth_mechanisms();
        if !mechanisms.is_empty() {
            let names: Vec<_> = mechanisms.iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "{:<14}{}", "Auth:", names.join(", "));
        }
        if let Some(size) = capabilities.max_message_size() {
            let _ = writeln!(out, "{:<14}{size} bytes", "Max size:");
        }
    }

    out.push_str("\nTranscript:\n");
    out.push_str(&result.render_transcript());
    out
}

/// Renders the well-known port table.
pub fn render_ports() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<6} {:<12} {:<14} DESCRIPTION", "PORT", "NAME", "TLS");
    let _ = writeln!(out, "{}", "-".repeat(64));
    for entry in WELL_KNOWN_PORTS {
        let _ = writeln!(
            out,
            "{:<6} {:<12} {:<14} {}",
            entry.port,
            entry.name,
            entry.protocol().label(),
            entry.description
        );
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailprobe_core::{Capabilities, ErrorKind, Failure, Outcome, ProtocolVariant, Transcript};

    fn starttls_success() -> ProbeResult {
        let mut logs = Transcript::new();
        logs.info("Connecting to smtp.example.com:587...");
        logs.received("220 smtp.example.com ESMTP");
        logs.sent("EHLO test.local");
        ProbeResult {
            protocol: ProtocolVariant::StartTls,
            hostname: "smtp.example.com".into(),
            port: 587,
            outcome: Outcome::Success {
                greeting: "220-smtp.example.com ESMTP\n220 welcome".into(),
                capabilities: Capabilities::from(vec![
                    "PIPELINING".to_string(),
                    "AUTH PLAIN LOGIN".to_string(),
                    "SIZE 52428800".to_string(),
                ]),
                tls_upgraded: true,
            },
            logs,
        }
    }

    #[test]
    fn success_report() {
        let text = render(&starttls_success());
        assert!(
            text.starts_with("Successfully connected to smtp.example.com:587 using STARTTLS\n")
        );
        assert!(text.contains("TLS:          yes\n"));
        assert!(text.contains(
            "Greeting:     220-smtp.example.com ESMTP\n              220 welcome\n"
        ));
        assert!(text.contains("  AUTH PLAIN LOGIN\n"));
        assert!(text.contains("Auth:         PLAIN, LOGIN\n"));
        assert!(text.contains("Max size:     52428800 bytes\n"));
        assert!(text.contains(">>> EHLO test.local\n"));
        assert!(text.contains("<<< 220 smtp.example.com ESMTP\n"));
    }

    #[test]
    fn failure_report() {
        let mut logs = Transcript::new();
        logs.info("Connecting to smtp.example.com:465 with implicit TLS...");
        logs.error("Connection refused (os error 111)");
        let result = ProbeResult {
            protocol: ProtocolVariant::ImplicitTls,
            hostname: "smtp.example.com".into(),
            port: 465,
            outcome: Outcome::Failure(Failure {
                error: "Connection refused (os error 111)".into(),
                kind: ErrorKind::Connect,
                greeting: None,
                capabilities: None,
                tls_upgraded: None,
            }),
            logs,
        };

        let text = render(&result);
        assert!(text.starts_with(
            "Probe of smtp.example.com:465 failed: Connection refused (os error 111)\n"
        ));
        assert!(text.contains("Protocol:     Implicit TLS\n"));
        assert!(!text.contains("Capabilities:"));
        assert!(!text.contains("TLS:"));
        assert!(text.contains("ERR Connection refused (os error 111)\n"));
    }

    #[test]
    fn ports_table() {
        let text = render_ports();
        let rows: Vec<_> = text.lines().skip(2).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].starts_with("465"));
        assert!(rows[1].contains("Implicit TLS"));
        assert!(rows[2].contains("STARTTLS"));
    }
}
