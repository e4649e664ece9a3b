//! Duration and window rendering.

use std::time::Duration;

use riptide_core::query::WindowSpec;

const UNITS: &[(u128, &str)] = &[
    (86_400_000, "DAYS"),
    (3_600_000, "HOURS"),
    (60_000, "MINUTES"),
    (1_000, "SECONDS"),
    (1, "MILLISECONDS"),
];

/// Render a duration as `n UNIT`.
///
/// The unit is chosen by magnitude tier (sub-second milliseconds,
/// sub-minute seconds, sub-hour minutes, sub-day hours, else days),
/// then stepped down within the tier until the numeric value is
/// integral. `90s` therefore renders as `90 SECONDS`, not `1.5
/// MINUTES`; exactly one hour renders as `1 HOURS`.
#[must_use]
pub fn render_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms == 0 {
        return "0 MILLISECONDS".to_string();
    }

    // Largest unit the magnitude admits.
    let cap = match ms {
        0..=999 => 1,
        1_000..=59_999 => 1_000,
        60_000..=3_599_999 => 60_000,
        3_600_000..=86_399_999 => 3_600_000,
        _ => 86_400_000,
    };

    for (divisor, unit) in UNITS {
        if *divisor <= cap && ms % divisor == 0 {
            return format!("{} {unit}", ms / divisor);
        }
    }
    // ms % 1 == 0 always holds, so the loop cannot fall through.
    unreachable!("millisecond unit always divides")
}

/// Render a window specification clause body.
#[must_use]
pub fn render_window(spec: &WindowSpec) -> String {
    match spec {
        WindowSpec::Tumbling { size } => {
            format!("TUMBLING (SIZE {})", render_duration(*size))
        }
        WindowSpec::Hopping { size, advance } => format!(
            "HOPPING (SIZE {}, ADVANCE BY {})",
            render_duration(*size),
            render_duration(*advance)
        ),
        WindowSpec::Session { gap } => {
            format!("SESSION ({})", render_duration(*gap))
        }
    }
}
