// ── Alert domain types ──

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Alert severity, ordered from least to most urgent.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Title used when the caller doesn't supply one.
    pub fn default_title(self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Critical => "Critical",
        }
    }
}

/// Unique alert identifier: `<unix-millis>-<seq>-<random8>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(String);

impl AlertId {
    /// Build a fresh id. `seq` makes ids unique within one queue even when
    /// two alerts share a millisecond; the random suffix keeps them unique
    /// across queues.
    pub(crate) fn generate(created_at: DateTime<Utc>, seq: u64) -> Self {
        let random = Uuid::new_v4().simple().to_string();
        let suffix = random.get(..8).unwrap_or(&random);
        Self(format!("{}-{seq}-{suffix}", created_at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AlertId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for AlertId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

/// One notification in the alert queue.
///
/// Everything except `acknowledged` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    /// Insertion sequence within the owning queue; strictly increasing.
    pub seq: u64,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// Originating subsystem, used for grouping only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub acknowledged: bool,
    /// Exempt from auto-dismiss.
    pub persistent: bool,
    #[serde(
        default,
        rename = "autoDismissSeconds",
        with = "opt_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub auto_dismiss: Option<Duration>,
}

impl Alert {
    /// Not yet acknowledged.
    pub fn is_active(&self) -> bool {
        !self.acknowledged
    }

    /// Unacknowledged and critical.
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical && !self.acknowledged
    }

    /// When the auto-dismiss timer removes this alert, if it has one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let delay = self.dismiss_after()?;
        let delay = chrono::Duration::from_std(delay).ok()?;
        self.created_at.checked_add_signed(delay)
    }

    /// Effective auto-dismiss delay: `None` for persistent alerts and for
    /// zero delays.
    pub(crate) fn dismiss_after(&self) -> Option<Duration> {
        if self.persistent {
            return None;
        }
        self.auto_dismiss.filter(|d| !d.is_zero())
    }
}

/// Optional overrides for [`AlertQueue::add_alert`](super::AlertQueue::add_alert).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertOptions {
    pub title: Option<String>,
    pub source: Option<String>,
    /// Ignored for `Critical`, which is always persistent.
    pub persistent: Option<bool>,
    pub auto_dismiss: Option<Duration>,
}

impl AlertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    pub fn auto_dismiss(mut self, delay: Duration) -> Self {
        self.auto_dismiss = Some(delay);
        self
    }

    /// Apply the per-severity defaults and build the alert.
    pub(crate) fn resolve(
        self,
        message: String,
        severity: Severity,
        seq: u64,
        info_auto_dismiss: Duration,
    ) -> Alert {
        let created_at = Utc::now();
        let persistent = match severity {
            Severity::Critical => true,
            _ => self.persistent.unwrap_or(false),
        };
        let auto_dismiss = match (severity, self.auto_dismiss) {
            (_, Some(delay)) => Some(delay),
            (Severity::Info, None) => Some(info_auto_dismiss),
            _ => None,
        };

        Alert {
            id: AlertId::generate(created_at, seq),
            seq,
            severity,
            title: self
                .title
                .unwrap_or_else(|| severity.default_title().to_owned()),
            message,
            created_at,
            source: self.source,
            acknowledged: false,
            persistent,
            auto_dismiss,
        }
    }
}

/// Serde adapter: `Option<Duration>` as fractional seconds.
mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        secs.map(|s| Duration::try_from_secs_f64(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    const INFO_DEFAULT: Duration = Duration::from_secs(5);

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!(Severity::from_str("critical").unwrap(), Severity::Critical);
        assert_eq!(Severity::from_str("WARNING").unwrap(), Severity::Warning);
        assert!(Severity::from_str("fatal").is_err());
        assert_eq!(Severity::Error.to_string(), "error");
    }

    #[test]
    fn severity_orders_by_urgency() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn critical_is_forced_persistent() {
        let alert = AlertOptions::new()
            .persistent(false)
            .auto_dismiss(Duration::from_secs(2))
            .resolve("Pump offline".into(), Severity::Critical, 1, INFO_DEFAULT);

        assert!(alert.persistent);
        assert_eq!(alert.auto_dismiss, Some(Duration::from_secs(2)));
        assert_eq!(alert.dismiss_after(), None);
        assert_eq!(alert.expires_at(), None);
    }

    #[test]
    fn info_defaults_to_auto_dismiss() {
        let alert = AlertOptions::new().resolve("Info msg".into(), Severity::Info, 1, INFO_DEFAULT);

        assert!(!alert.persistent);
        assert_eq!(alert.dismiss_after(), Some(INFO_DEFAULT));
        assert_eq!(
            alert.expires_at().unwrap() - alert.created_at,
            chrono::Duration::seconds(5)
        );
        assert_eq!(alert.title, "Info");
    }

    #[test]
    fn warning_and_error_default_to_no_timer() {
        for severity in [Severity::Warning, Severity::Error] {
            let alert = AlertOptions::new().resolve("x".into(), severity, 1, INFO_DEFAULT);
            assert!(!alert.persistent);
            assert_eq!(alert.dismiss_after(), None);
        }
    }

    #[test]
    fn persistent_override_disables_timer() {
        let alert = AlertOptions::new()
            .persistent(true)
            .resolve("x".into(), Severity::Info, 1, INFO_DEFAULT);
        assert_eq!(alert.dismiss_after(), None);
    }

    #[test]
    fn zero_delay_means_no_timer() {
        let alert = AlertOptions::new()
            .auto_dismiss(Duration::ZERO)
            .resolve("x".into(), Severity::Warning, 1, INFO_DEFAULT);
        assert_eq!(alert.dismiss_after(), None);
    }

    #[test]
    fn id_embeds_sequence() {
        let now = Utc::now();
        let id = AlertId::generate(now, 42);
        let parts: Vec<&str> = id.as_str().split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], now.timestamp_millis().to_string());
        assert_eq!(parts[1], "42");
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn alert_serializes_to_camel_case() {
        let alert = AlertOptions::new()
            .source("process")
            .resolve("Temp high".into(), Severity::Warning, 3, INFO_DEFAULT);
        let json = serde_json::to_value(&alert).unwrap();

        assert_eq!(json["severity"], "warning");
        assert_eq!(json["source"], "process");
        assert_eq!(json["acknowledged"], false);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("autoDismissSeconds").is_none());

        let back: Alert = serde_json::from_value(json).unwrap();
        assert_eq!(back, alert);
    }
}
