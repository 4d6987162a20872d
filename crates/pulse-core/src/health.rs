//! Health arithmetic
//!
//! Components score each event with an honest signed impact (the "TRUE
//! score"). A component declares the total its fully successful run would
//! sum to, and every record carries the running sum normalized onto the
//! -100..=100 display scale.

/// Lower and upper bound of the normalized scale.
pub const HEALTH_MIN: i64 = -100;
pub const HEALTH_MAX: i64 = 100;

const BAR_WIDTH: i64 = 40;

/// Clamp a value onto the normalized scale.
pub fn clamp_health(value: i64) -> i64 {
    value.clamp(HEALTH_MIN, HEALTH_MAX)
}

/// Normalize a running sum against a declared total.
///
/// Integer division truncates toward zero. With no declared total the raw
/// sum itself is clamped.
pub fn normalize(raw: i64, declared_total: i64) -> i64 {
    if declared_total == 0 {
        return clamp_health(raw);
    }
    clamp_health(raw.saturating_mul(100).saturating_div(declared_total))
}

/// Replay a sequence of impacts, yielding the normalized value after each one.
pub fn trajectory(impacts: &[i64], declared_total: i64) -> Vec<i64> {
    let mut raw = 0i64;
    impacts
        .iter()
        .map(|impact| {
            raw = raw.saturating_add(*impact);
            normalize(raw, declared_total)
        })
        .collect()
}

/// Display band for a normalized health value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthBand {
    pub threshold: i64,
    pub symbol: &'static str,
    pub description: &'static str,
}

const BANDS: &[HealthBand] = &[
    HealthBand { threshold: 90, symbol: "💚", description: "Excellent - all systems healthy" },
    HealthBand { threshold: 80, symbol: "💙", description: "Very Good - minor issues only" },
    HealthBand { threshold: 70, symbol: "💛", description: "Good - some concerns" },
    HealthBand { threshold: 60, symbol: "🧡", description: "Above Average - noticeable issues" },
    HealthBand { threshold: 50, symbol: "❤️", description: "Average - mixed results" },
    HealthBand { threshold: 40, symbol: "🤍", description: "Below Average - attention needed" },
    HealthBand { threshold: 30, symbol: "💔", description: "Fair - significant problems" },
    HealthBand { threshold: 20, symbol: "🩹", description: "Poor - major issues" },
    HealthBand { threshold: 10, symbol: "⚠️", description: "Warning - critical attention needed" },
    HealthBand { threshold: 1, symbol: "☠️", description: "Critical - near failure" },
    HealthBand { threshold: 0, symbol: "⚫", description: "Neutral - balanced state" },
    HealthBand { threshold: -9, symbol: "🔴", description: "Slight Negative - minor damage" },
    HealthBand { threshold: -19, symbol: "🟠", description: "Negative - noticeable degradation" },
    HealthBand { threshold: -29, symbol: "🟡", description: "Declining - system weakening" },
    HealthBand { threshold: -39, symbol: "🟢", description: "Degraded - significant damage" },
    HealthBand { threshold: -49, symbol: "🔵", description: "Damaged - major problems" },
    HealthBand { threshold: -59, symbol: "🟣", description: "Severe - critical damage" },
    HealthBand { threshold: -69, symbol: "🟤", description: "Critical - near failure" },
    HealthBand { threshold: -79, symbol: "⚫", description: "Failing - barely functional" },
    HealthBand { threshold: -89, symbol: "⬛", description: "Near Death - almost gone" },
    HealthBand { threshold: -100, symbol: "💀", description: "Dead - complete failure" },
];

/// First band whose threshold the value reaches.
pub fn band(health: i64) -> &'static HealthBand {
    let health = clamp_health(health);
    BANDS
        .iter()
        .find(|b| health >= b.threshold)
        .unwrap_or(&BANDS[BANDS.len() - 1])
}

pub fn indicator(health: i64) -> &'static str {
    band(health).symbol
}

/// Fixed-width bar mapping -100..=100 onto 0..=100.
pub fn bar(health: i64) -> String {
    let shifted = (clamp_health(health) + 100) / 2;
    let filled = (shifted * BAR_WIDTH / 100) as usize;
    format!(
        "[{}{}] ({}/100)",
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH as usize - filled),
        shifted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_against_declared_total() {
        assert_eq!(normalize(47, 47), 100);
        assert_eq!(normalize(10, 47), 21);
        assert_eq!(normalize(-20, 47), -42);
        assert_eq!(normalize(94, 47), 100);
        assert_eq!(normalize(-500, 47), -100);
    }

    #[test]
    fn test_normalize_without_total_clamps_raw() {
        assert_eq!(normalize(37, 0), 37);
        assert_eq!(normalize(250, 0), 100);
        assert_eq!(normalize(-250, 0), -100);
    }

    #[test]
    fn test_extreme_values_saturate() {
        assert_eq!(normalize(i64::MIN, -1), 100);
        assert_eq!(normalize(i64::MAX, -1), -100);
        assert_eq!(normalize(i64::MIN, 47), -100);
        assert_eq!(trajectory(&[i64::MAX, 1, i64::MIN], 10), vec![100, 100, -10]);
    }

    #[test]
    fn test_trajectory_end_to_end_scenario() {
        assert_eq!(trajectory(&[10, 30, 7], 47), vec![21, 85, 100]);
        assert_eq!(trajectory(&[10, -30, 7], 47), vec![21, -42, -27]);
    }

    #[test]
    fn test_bands_and_bar() {
        assert_eq!(indicator(100), "💚");
        assert_eq!(indicator(0), "⚫");
        assert_eq!(indicator(-5), "🔴");
        assert_eq!(indicator(-100), "💀");
        assert_eq!(band(55).description, "Average - mixed results");

        let full = bar(100);
        assert!(full.ends_with("(100/100)"));
        assert_eq!(full.matches('█').count(), 40);
        assert!(bar(-100).ends_with("(0/100)"));
    }

    proptest! {
        #[test]
        fn prop_normalized_value_stays_in_range(raw in -100_000i64..100_000, total in -500i64..500) {
            let n = normalize(raw, total);
            prop_assert!((HEALTH_MIN..=HEALTH_MAX).contains(&n));
        }

        #[test]
        fn prop_trajectory_matches_prefix_sums(
            impacts in proptest::collection::vec(-80i64..80, 1..40),
            total in 1i64..300,
        ) {
            let replayed = trajectory(&impacts, total);
            for (k, value) in replayed.iter().enumerate() {
                let sum: i64 = impacts[..=k].iter().sum();
                prop_assert_eq!(*value, (100 * sum / total).clamp(-100, 100));
            }
        }
    }
}
