//! `opsfeed watch`: stream live updates and raise alerts from rules.

use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, warn};

use opsfeed_core::{Hub, LiveFeed};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, render_update, severity_label, should_color, state_label};
use crate::rules::RuleSet;

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let hub = Hub::new(config::hub_config(global, &cfg)?);
    let connection = hub.connection()?;
    let alerts = hub.alerts()?;
    let color = should_color(&global.color);

    let mut rules = if args.no_rules {
        RuleSet::default()
    } else {
        RuleSet::new(cfg.rules.clone())
    };

    let mut topics = cfg.connection.topics.clone();
    for topic in args.topics {
        if !topics.contains(&topic) {
            topics.push(topic);
        }
    }

    let mut root = connection.watch(None)?;
    let feeds = topics
        .iter()
        .map(|topic| connection.watch(Some(topic)))
        .collect::<Result<Vec<LiveFeed>, _>>()?;
    debug!(topics = ?topics, rules = !rules.is_empty(), "watching");

    let mut updates = root.messages();
    let deadline = args.duration.map(|d| Instant::now() + d);
    let mut seen = 0usize;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            () = wait_until(deadline) => break,
            status = root.status_changed() => {
                let Some(status) = status else { break };
                if !global.quiet {
                    eprintln!("connection {}", state_label(status, color));
                }
            }
            update = updates.recv() => match update {
                Ok(payload) => {
                    output::print_output(&render_update(&global.output, &payload)?, global.quiet);
                    for trigger in rules.check(&payload) {
                        trigger.raise(alerts);
                        if !global.quiet {
                            eprintln!("{} {}", severity_label(trigger.severity, color), trigger.message);
                        }
                    }
                    seen += 1;
                    if args.count.is_some_and(|limit| seen >= limit) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "output fell behind, updates dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    drop(feeds);
    let active = alerts.active_alerts();
    hub.shutdown();

    if !active.is_empty() && !global.quiet {
        eprintln!();
        eprintln!("{}", output::render_alerts(&OutputFormat::Table, &active, color)?);
    }
    Ok(())
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
