use tracker_core::{TrackerError, UserId};

use crate::engine::TrackingEngine;
use crate::messages;

/// Inbound chat command, transport independent.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Welcome,
    Track,
    Stop,
    Price,
    /// Raw argument text after `/setalert`.
    SetAlert(String),
    Alerts,
    Trend,
    Stats,
    Unknown(String),
}

impl Command {
    /// Parse a chat message. Returns `None` for text that is not a slash command.
    ///
    /// Accepts the `/cmd@BotName` form used in group chats.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;

        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_lowercase();

        let command = match name.as_str() {
            "start" | "help" => Command::Welcome,
            "track" => Command::Track,
            "stop" => Command::Stop,
            "price" => Command::Price,
            "setalert" => Command::SetAlert(args.to_string()),
            "alerts" => Command::Alerts,
            "trend" => Command::Trend,
            "stats" => Command::Stats,
            _ => Command::Unknown(name),
        };
        Some(command)
    }
}

/// Execute a command for `user` and produce its single reply.
pub async fn handle_command(engine: &TrackingEngine, user: UserId, command: &Command) -> String {
    let asset = engine.asset_name();
    let registry = engine.registry();

    match command {
        Command::Welcome => messages::welcome(asset),
        Command::Track => {
            if registry.start_tracking(user).await {
                format!(
                    "Price tracking started! You'll receive notifications when {} price increases by $1.",
                    asset
                )
            } else if registry.is_tracking(user) {
                format!("You are already tracking {} prices.", asset)
            } else {
                "Sorry, I couldn't start tracking prices right now. Please try again later."
                    .to_string()
            }
        }
        Command::Stop => {
            if registry.stop_tracking(user) {
                "Price tracking stopped.".to_string()
            } else {
                "You are not currently tracking prices.".to_string()
            }
        }
        Command::Price => match engine.current_price().await {
            Ok(price) => format!("Current {} Price: ${}", asset, messages::format_price(price)),
            Err(_) => "Unable to fetch current price.".to_string(),
        },
        Command::SetAlert(args) => set_alert(engine, user, args).await,
        Command::Alerts => match registry.snapshot(user) {
            Ok(state) => messages::alert_list(&state.alerts),
            Err(TrackerError::NotTracking(_)) => messages::alert_list(&[]),
            Err(e) => {
                tracing::error!("List alerts error: {}", e);
                "An error occurred while listing your alerts.".to_string()
            }
        },
        Command::Trend => messages::trend(asset, engine.trend().await),
        Command::Stats => messages::stats(asset, engine.stats().await),
        Command::Unknown(name) => format!(
            "Unknown command /{}. Use /start to see the available commands.",
            name
        ),
    }
}

async fn set_alert(engine: &TrackingEngine, user: UserId, args: &str) -> String {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let [raw] = parts.as_slice() else {
        return "Usage: /setalert <price>\nExample: /setalert 10.50".to_string();
    };

    let target = match parse_target(raw) {
        Ok(target) => target,
        Err(TrackerError::Validation(msg)) => return msg,
        Err(e) => return e.to_string(),
    };

    match engine.registry().add_alert(user, target).await {
        Ok(()) => format!(
            "✅ Alert set! You'll be notified when {} reaches ${}",
            engine.asset_name(),
            messages::format_price(target)
        ),
        Err(TrackerError::Validation(msg)) => msg,
        Err(e) => {
            tracing::error!("Set alert error for user {}: {}", user, e);
            "Sorry, I couldn't set the alert right now. Please try again later.".to_string()
        }
    }
}

/// Parse a target price argument. Only positive, finite numbers are accepted.
pub fn parse_target(raw: &str) -> Result<f64, TrackerError> {
    let target: f64 = raw.trim().parse().map_err(|_| {
        TrackerError::Validation("Invalid price value. Please enter a number.".to_string())
    })?;
    crate::registry::validate_target(target)?;
    Ok(target)
}
