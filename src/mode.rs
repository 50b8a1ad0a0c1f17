//! Analysis mode and keyword-based mode detection.
//!
//! A [`Mode`] picks the prompt template and is echoed back by the model so the
//! caller can show which lens was applied. The display name ("Threat Intel")
//! and the template lookup key (`threat_intel`) are kept separate.
//!
//! Keywords match at word starts, not as bare substrings: a URL such as
//! `GET http://host/` does not count as "ttp" and stays [`Mode::Hybrid`],
//! where a plain substring test would call it Threat Intel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Markers of live host/network activity. Checked first.
const IR_KEYWORDS: &[&str] = &[
    "failed login",
    "failed password",
    "connection attempt",
    "nc -e",
    "reverse shell",
    "outbound traffic",
    "/tmp/",
    "bruteforce",
    "brute force",
    "brute-force",
];

/// Markers of adversary and campaign reporting.
const THREAT_INTEL_KEYWORDS: &[&str] = &[
    "apt",
    "malware",
    "ttp",
    "mitre",
    "campaign",
    "threat actor",
    "phishing",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "IR")]
    Ir,
    #[serde(rename = "Threat Intel")]
    ThreatIntel,
    #[serde(rename = "Hybrid")]
    Hybrid,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Ir, Mode::ThreatIntel, Mode::Hybrid];

    /// Human-facing name, also the value the model is asked to echo.
    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Ir => "IR",
            Mode::ThreatIntel => "Threat Intel",
            Mode::Hybrid => "Hybrid",
        }
    }

    /// Template lookup key: display name lower-cased, spaces to underscores.
    pub fn template_key(&self) -> &'static str {
        match self {
            Mode::Ir => "ir",
            Mode::ThreatIntel => "threat_intel",
            Mode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Mode {
    type Err = String;

    /// Accepts display names, lookup keys, and common CLI spellings
    /// (`ir`, `threat-intel`, `Threat Intel`, `IR (Incident Response)`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "ir" | "incident_response" | "ir_(incident_response)" => Ok(Mode::Ir),
            "threat_intel" | "threatintel" | "ti" | "intel" => Ok(Mode::ThreatIntel),
            "hybrid" => Ok(Mode::Hybrid),
            _ => Err(format!(
                "unknown mode '{}': expected ir, threat-intel, or hybrid",
                s
            )),
        }
    }
}

/// Classify text into an analysis mode.
///
/// IR keywords win over Threat Intel keywords; text matching neither set
/// (including empty text) is [`Mode::Hybrid`]. Pure and total.
pub fn detect_mode(text: &str) -> Mode {
    let lowered = text.to_lowercase();

    if IR_KEYWORDS.iter().any(|k| contains_keyword(&lowered, k)) {
        Mode::Ir
    } else if THREAT_INTEL_KEYWORDS
        .iter()
        .any(|k| contains_keyword(&lowered, k))
    {
        Mode::ThreatIntel
    } else {
        Mode::Hybrid
    }
}

/// Substring match anchored at a word start.
///
/// A keyword beginning with a letter or digit must not be preceded by one, so
/// "apt" matches "apt29" but not "capture", and "ttp" does not match "http".
/// The keyword may run into a longer word ("campaigns", "ttps").
fn contains_keyword(haystack: &str, keyword: &str) -> bool {
    let anchored = keyword
        .chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric());

    haystack.match_indices(keyword).any(|(pos, _)| {
        !anchored
            || haystack[..pos]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric())
    })
}
