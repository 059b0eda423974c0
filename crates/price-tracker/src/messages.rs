use tracker_core::{Alert, Notification, NotificationKind, PriceStats, Trend, TrendDirection};

/// Shortest round-trip form of a price, keeping one decimal on whole numbers
/// (`50.0`, not `50`).
pub fn format_price(price: f64) -> String {
    if price.is_finite() && price.fract() == 0.0 && price.abs() < 1e16 {
        format!("{:.1}", price)
    } else {
        price.to_string()
    }
}

pub fn render_notification(asset: &str, notification: &Notification) -> String {
    match notification.kind {
        NotificationKind::PriceIncrease { price } => format!(
            "🚨 {asset} Price Alert 🚨\n\n\
             Current Price: ${}\n\
             Price has increased by $1 since last check!",
            format_price(price)
        ),
        NotificationKind::TargetReached { price, target } => format!(
            "🎯 Price Alert: {asset} has reached ${}\n\
             Your target price was: ${}",
            format_price(price),
            format_price(target)
        ),
    }
}

pub fn welcome(asset: &str) -> String {
    format!(
        "Welcome to the {asset} Price Tracker Bot! 🚀\n\n\
         Available commands:\n\
         /start - Show this welcome message\n\
         /track - Start tracking {asset} price\n\
         /stop - Stop tracking {asset} price\n\
         /price - Get current {asset} price\n\
         /setalert <price> - Set custom price alert\n\
         /alerts - List your active alerts\n\
         /trend - Get price trend analysis\n\
         /stats - Get price statistics"
    )
}

pub fn trend(asset: &str, trend: Option<Trend>) -> String {
    let body = match trend {
        None => "Insufficient data for trend analysis".to_string(),
        Some(t) => {
            let icon = match t.direction {
                TrendDirection::StrongUp => "📈",
                TrendDirection::SlightUp => "↗️",
                TrendDirection::Stable => "➡️",
                TrendDirection::SlightDown => "↘️",
                TrendDirection::StrongDown => "📉",
            };
            match t.direction {
                TrendDirection::Stable => format!("{} {}", icon, t.direction.to_label()),
                _ => format!("{} {} ({:+.2}%)", icon, t.direction.to_label(), t.change_percent),
            }
        }
    };
    format!("{asset} Price Trend:\n{body}")
}

pub fn stats(asset: &str, stats: Option<PriceStats>) -> String {
    match stats {
        None => "No price data available".to_string(),
        Some(s) => format!(
            "📊 {asset} Price Statistics:\n\
             Current: ${:.2}\n\
             High: ${:.2}\n\
             Low: ${:.2}\n\
             Average: ${:.2}",
            s.current, s.high, s.low, s.average
        ),
    }
}

pub fn alert_list(alerts: &[Alert]) -> String {
    if alerts.is_empty() {
        return "You have no active price alerts".to_string();
    }

    let mut text = String::from("Your Active Price Alerts:\n\n");
    for (idx, alert) in alerts.iter().enumerate() {
        let status = if alert.triggered {
            "✅ Triggered"
        } else {
            "⏳ Waiting"
        };
        text.push_str(&format!(
            "{}. ${} - {}\n",
            idx + 1,
            format_price(alert.target),
            status
        ));
    }
    text
}
