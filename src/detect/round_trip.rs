//! Rapid round-trip detection: value leaving A for B and returning
//! within a bounded time window.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::Serialize;

use crate::flow::UserFlow;

/// A wallet pair flagged for round-trip trading
#[derive(Debug, Clone, Serialize)]
pub struct RoundTripFinding {
    pub wallet_a: String,
    pub wallet_b: String,
    /// Matched return count. Overlapping matches are canonical: one
    /// return event may satisfy several outbound events.
    pub roundtrip_count: usize,
    pub total_transactions: usize,
    pub roundtrip_ratio: f64,
    pub total_volume_usd: f64,
    pub fastest_roundtrip_hours: f64,
}

/// Detect wallet pairs with at least two matched round-trips inside
/// `window_hours`. Pairs are canonicalized as unordered tuples; a
/// self-transferring wallet forms the degenerate pair (A, A), where
/// both direction subsequences are the same flows.
pub fn detect(flows: &[UserFlow], window_hours: i64) -> Vec<RoundTripFinding> {
    let window = Duration::hours(window_hours);

    let mut by_pair: BTreeMap<(String, String), Vec<&UserFlow>> = BTreeMap::new();
    for flow in flows {
        by_pair.entry(flow.wallet_pair()).or_default().push(flow);
    }

    let mut findings = Vec::new();

    for ((wallet_a, wallet_b), group) in by_pair {
        if group.len() < 2 {
            continue;
        }

        let mut a_to_b: Vec<&UserFlow> =
            group.iter().copied().filter(|f| f.start_wallet == wallet_a).collect();
        let mut b_to_a: Vec<&UserFlow> =
            group.iter().copied().filter(|f| f.start_wallet == wallet_b).collect();

        if a_to_b.is_empty() || b_to_a.is_empty() {
            continue;
        }

        a_to_b.sort_by_key(|f| f.timestamp);
        b_to_a.sort_by_key(|f| f.timestamp);

        let mut roundtrip_count = 0;
        let mut total_volume = 0.0;
        let mut fastest: Option<Duration> = None;

        for out in &a_to_b {
            let window_end = out.timestamp + window;
            let returns: Vec<&&UserFlow> = b_to_a
                .iter()
                .filter(|r| r.timestamp > out.timestamp && r.timestamp <= window_end)
                .collect();

            if returns.is_empty() {
                continue;
            }

            roundtrip_count += returns.len();
            total_volume += out.usd_value + returns.iter().map(|r| r.usd_value).sum::<f64>();

            for ret in &returns {
                let latency = ret.timestamp - out.timestamp;
                if fastest.map(|f| latency < f).unwrap_or(true) {
                    fastest = Some(latency);
                }
            }
        }

        if roundtrip_count >= 2 {
            findings.push(RoundTripFinding {
                wallet_a,
                wallet_b,
                roundtrip_count,
                total_transactions: group.len(),
                roundtrip_ratio: roundtrip_count as f64 / group.len() as f64,
                total_volume_usd: total_volume,
                fastest_roundtrip_hours: fastest
                    .map(|d| d.num_seconds() as f64 / 3600.0)
                    .unwrap_or(0.0),
            });
        }
    }

    findings.sort_by(|a, b| b.roundtrip_count.cmp(&a.roundtrip_count));
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::test_util::flow_at;

    #[test]
    fn test_single_return_is_not_flagged() {
        // One A->B at t0 and one B->A an hour later: matched count 1,
        // below the >= 2 threshold.
        let flows = vec![flow_at("A", "B", 0, 100.0), flow_at("B", "A", 60, 100.0)];
        assert!(detect(&flows, 24).is_empty());
    }

    #[test]
    fn test_two_returns_in_window_are_flagged() {
        let flows = vec![
            flow_at("A", "B", 0, 100.0),
            flow_at("B", "A", 60, 90.0),
            flow_at("B", "A", 120, 80.0),
        ];

        let findings = detect(&flows, 24);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].roundtrip_count, 2);
        assert_eq!(findings[0].wallet_a, "A");
        assert_eq!(findings[0].wallet_b, "B");
        assert!((findings[0].fastest_roundtrip_hours - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlapping_matches_are_counted() {
        // Two outbound events, one return inside both windows: the
        // return satisfies each outbound, total count 2.
        let flows = vec![
            flow_at("A", "B", 0, 10.0),
            flow_at("A", "B", 30, 10.0),
            flow_at("B", "A", 60, 10.0),
        ];

        let findings = detect(&flows, 24);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].roundtrip_count, 2);
    }

    #[test]
    fn test_rapid_self_transfers_form_a_round_trip_pair() {
        // Three A->A flows 30 min apart. Every flow is both an
        // outbound and a return, so each matches the later ones:
        // 2 + 1 + 0 = 3 round-trips.
        let flows = vec![
            flow_at("A", "A", 0, 10.0),
            flow_at("A", "A", 30, 10.0),
            flow_at("A", "A", 60, 10.0),
        ];

        let findings = detect(&flows, 24);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].wallet_a, "A");
        assert_eq!(findings[0].wallet_b, "A");
        assert_eq!(findings[0].roundtrip_count, 3);
        assert!((findings[0].fastest_roundtrip_hours - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_return_outside_window_is_ignored() {
        let flows = vec![
            flow_at("A", "B", 0, 10.0),
            flow_at("B", "A", 25 * 60, 10.0), // 25h later
            flow_at("B", "A", 26 * 60, 10.0),
        ];
        assert!(detect(&flows, 24).is_empty());
    }
}
