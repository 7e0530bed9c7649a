//! `opsfeed alerts`: exercise the alert queue locally.

use std::fmt::Write as _;
use std::time::Duration;

use serde_json::Value;
use strum::IntoEnumIterator;

use opsfeed_core::{Alert, AlertConfig, AlertOptions, AlertQueue, Severity};

use crate::cli::{AlertsArgs, AlertsCommand, GlobalOpts, SeverityArg};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output::{self, severity_label, should_color};
use crate::rules;

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
            SeverityArg::Critical => Severity::Critical,
        }
    }
}

pub async fn handle(args: AlertsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let color = should_color(&global.color);

    match args.command {
        AlertsCommand::Demo {
            count,
            max_alerts,
            wait,
        } => {
            let mut alert_config = alert_config(&cfg);
            if let Some(max) = max_alerts {
                alert_config.max_alerts = max;
            }
            let queue = AlertQueue::new(alert_config);

            for severity in Severity::iter() {
                for n in 1..=count {
                    queue.add_alert(
                        format!("Sample {severity} alert #{n}"),
                        severity,
                        AlertOptions::new().source("demo"),
                    );
                }
            }
            print_queue(&queue, global, color)?;

            if let Some(wait) = wait {
                tokio::time::sleep(wait).await;
                if !global.quiet {
                    eprintln!("after {}:", humantime::format_duration(wait));
                }
                print_queue(&queue, global, color)?;
            }
            queue.shutdown();
            Ok(())
        }

        AlertsCommand::Check { json } => {
            let payload: Value = serde_json::from_str(&json)?;
            let queue = AlertQueue::new(alert_config(&cfg));

            for trigger in cfg.rules.iter().filter_map(|rule| rules::evaluate(rule, &payload)) {
                trigger.raise(&queue);
            }
            if queue.is_empty() {
                if !global.quiet {
                    eprintln!("no rules triggered ({} checked)", cfg.rules.len());
                }
            } else {
                print_queue(&queue, global, color)?;
            }
            queue.shutdown();
            Ok(())
        }

        AlertsCommand::Raise {
            message,
            severity,
            title,
            source,
        } => {
            let queue = AlertQueue::new(alert_config(&cfg));
            let mut opts = AlertOptions::new();
            if let Some(title) = title {
                opts = opts.title(title);
            }
            if let Some(source) = source {
                opts = opts.source(source);
            }

            let id = queue.add_alert(message, severity.into(), opts);
            if let Some(alert) = queue.get(&id) {
                let out = output::render_single(
                    &global.output,
                    alert.as_ref(),
                    |a| detail(a, color),
                    |a| a.id.to_string(),
                )?;
                output::print_output(&out, global.quiet);
            }
            queue.shutdown();
            Ok(())
        }
    }
}

fn alert_config(cfg: &Config) -> AlertConfig {
    AlertConfig {
        max_alerts: cfg.alerts.max_alerts,
        info_auto_dismiss: Duration::from_secs(cfg.alerts.info_auto_dismiss_secs),
    }
}

fn print_queue(queue: &AlertQueue, global: &GlobalOpts, color: bool) -> Result<(), CliError> {
    let out = output::render_alerts(&global.output, &queue.alerts(), color)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(alert: &Alert, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ID:        {}", alert.id);
    let _ = writeln!(out, "Severity:  {}", severity_label(alert.severity, color));
    let _ = writeln!(out, "Title:     {}", alert.title);
    let _ = writeln!(out, "Message:   {}", alert.message);
    if let Some(source) = &alert.source {
        let _ = writeln!(out, "Source:    {source}");
    }
    let _ = writeln!(out, "Created:   {}", alert.created_at.to_rfc3339());
    let _ = write!(
        out,
        "Dismiss:   {}",
        match alert.auto_dismiss {
            Some(delay) if !alert.persistent && !delay.is_zero() => {
                format!("after {}", humantime::format_duration(delay))
            }
            _ => "manual".to_owned(),
        }
    );
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn severity_arg_maps_one_to_one() {
        assert_eq!(Severity::from(SeverityArg::Info), Severity::Info);
        assert_eq!(Severity::from(SeverityArg::Critical), Severity::Critical);
    }

    #[test]
    fn detail_shows_dismiss_policy() {
        let queue = AlertQueue::default();
        let id = queue.add_alert("Disk full", Severity::Critical, AlertOptions::new().source("node-3"));
        let alert = queue.get(&id).unwrap();

        let text = detail(&alert, false);
        assert!(text.contains("Severity:  critical"));
        assert!(text.contains("Source:    node-3"));
        assert!(text.ends_with("Dismiss:   manual"));
    }
}
