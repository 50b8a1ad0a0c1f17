//! Summary metrics over a JSON analysis result.
//!
//! Counts the elements a report viewer charts: hosts, external IPs, IOCs,
//! MITRE techniques, and how many findings fall in each severity bucket.

use serde::Serialize;
use serde_json::Value;

use crate::response::Severity;

/// Sections whose entries may carry a per-item `severity`.
const SEVERITY_SECTIONS: &[&str] = &["events", "observed_activity", "ioc"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub mode: Option<String>,
    pub internal_hosts: usize,
    pub external_ips: usize,
    pub iocs: usize,
    pub mitre: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl Dashboard {
    pub fn from_value(value: &Value) -> Self {
        let mut dash = Dashboard {
            mode: value.get("mode").and_then(Value::as_str).map(String::from),
            internal_hosts: list_len(value, "internal_hosts"),
            external_ips: list_len(value, "external_ips"),
            iocs: list_len(value, "ioc"),
            mitre: list_len(value, "mitre"),
            ..Dashboard::default()
        };

        for section in SEVERITY_SECTIONS {
            let Some(items) = value.get(*section).and_then(Value::as_array) else {
                continue;
            };
            for item in items {
                if let Some(sev) = severity_of(item) {
                    dash.count(sev);
                }
            }
        }

        if let Some(sev) = severity_of(value) {
            dash.count(sev);
        }

        dash
    }

    fn count(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn has_severity(&self) -> bool {
        self.high + self.medium + self.low > 0
    }

    /// Plain-text table for terminal output.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "mode: {}\n",
            self.mode.as_deref().unwrap_or("Unknown")
        ));
        out.push_str(&format!("  internal hosts: {}\n", self.internal_hosts));
        out.push_str(&format!("  external IPs:   {}\n", self.external_ips));
        out.push_str(&format!("  IOCs:           {}\n", self.iocs));
        out.push_str(&format!("  MITRE:          {}\n", self.mitre));
        if self.has_severity() {
            out.push_str(&format!(
                "  severity:       High {} / Medium {} / Low {}\n",
                self.high, self.medium, self.low
            ));
        }
        out
    }
}

fn list_len(value: &Value, key: &str) -> usize {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

fn severity_of(value: &Value) -> Option<Severity> {
    value.get("severity")?.as_str()?.parse().ok()
}
