//! Policy engine
//!
//! A pure function from a `TrustSignal` to a `Verdict`. Each fired signal
//! contributes a fixed severity; the verdict severity is the maximum
//! contribution and the reasons are the fired signals, ordered by severity
//! descending and signal name ascending so identical inputs always render
//! identically.

use std::cmp::Reverse;

use crate::domain::trust::{Reason, RiskLevel, SignalKind, TrustSignal, Verdict};

/// Evaluate the fixed contribution table against the derived signals.
pub fn evaluate(signal: &TrustSignal) -> Verdict {
    let mut reasons: Vec<Reason> = Vec::new();

    if signal.has_known_vuln {
        let severity = signal
            .known_vuln_severity
            .map(RiskLevel::from)
            .unwrap_or(RiskLevel::Low);
        reasons.push(Reason {
            signal: SignalKind::HasKnownVuln,
            severity,
        });
    }
    if signal.yanked {
        reasons.push(Reason {
            signal: SignalKind::Yanked,
            severity: RiskLevel::High,
        });
    }
    if signal.typosquat {
        reasons.push(Reason {
            signal: SignalKind::Typosquat,
            severity: RiskLevel::High,
        });
    }
    if signal.abandoned {
        reasons.push(Reason {
            signal: SignalKind::Abandoned,
            severity: RiskLevel::Medium,
        });
    }
    if signal.bus_factor_zero {
        reasons.push(Reason {
            signal: SignalKind::BusFactorZero,
            severity: RiskLevel::Medium,
        });
    }
    if signal.bus_factor_one {
        reasons.push(Reason {
            signal: SignalKind::BusFactorOne,
            severity: RiskLevel::Low,
        });
    }
    if signal.high_churn {
        reasons.push(Reason {
            signal: SignalKind::HighChurn,
            severity: RiskLevel::Medium,
        });
    }
    if signal.medium_churn {
        reasons.push(Reason {
            signal: SignalKind::MediumChurn,
            severity: RiskLevel::Low,
        });
    }
    if signal.low_maturity {
        reasons.push(Reason {
            signal: SignalKind::LowMaturity,
            severity: RiskLevel::Low,
        });
    }

    reasons.sort_by_key(|reason| (Reverse(reason.severity), reason.signal.name()));

    let severity = reasons
        .iter()
        .map(|reason| reason.severity)
        .max()
        .unwrap_or(RiskLevel::Safe);

    Verdict {
        severity,
        reasons,
        advisory_ids: signal.vulnerable_advisory_ids.clone(),
    }
}

/// Levenshtein distance with an early-exit bound.
///
/// Returns `max_distance + 1` as soon as the distance provably exceeds the
/// bound, which keeps the corpus sweep cheap for long names.
pub fn levenshtein(a: &str, b: &str, max_distance: u32) -> u32 {
    if a == b {
        return 0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len() as u32;
    }
    if b_chars.is_empty() {
        return a_chars.len() as u32;
    }
    let bound = max_distance as usize;
    if a_chars.len().abs_diff(b_chars.len()) > bound {
        return max_distance + 1;
    }

    let (shorter, longer) = if a_chars.len() <= b_chars.len() {
        (&a_chars, &b_chars)
    } else {
        (&b_chars, &a_chars)
    };

    let mut prev_row: Vec<usize> = (0..=longer.len()).collect();
    for (i, ch_a) in shorter.iter().enumerate() {
        let mut row = Vec::with_capacity(longer.len() + 1);
        row.push(i + 1);
        let mut min_in_row = i + 1;
        for (j, ch_b) in longer.iter().enumerate() {
            let cost = usize::from(ch_a != ch_b);
            let value = (row[j] + 1).min(prev_row[j + 1] + 1).min(prev_row[j] + cost);
            if value < min_in_row {
                min_in_row = value;
            }
            row.push(value);
        }
        if min_in_row > bound {
            return max_distance + 1;
        }
        prev_row = row;
    }

    let distance = prev_row[longer.len()];
    if distance > bound {
        max_distance + 1
    } else {
        distance as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trust::Severity;

    #[test]
    fn empty_signals_are_safe() {
        let verdict = evaluate(&TrustSignal::default());
        assert_eq!(verdict.severity, RiskLevel::Safe);
        assert!(verdict.reasons.is_empty());
    }

    #[test]
    fn critical_advisory_dominates() {
        let signal = TrustSignal {
            has_known_vuln: true,
            known_vuln_severity: Some(Severity::Critical),
            abandoned: true,
            ..TrustSignal::default()
        };
        let verdict = evaluate(&signal);
        assert_eq!(verdict.severity, RiskLevel::Critical);
        assert_eq!(verdict.reasons[0].signal, SignalKind::HasKnownVuln);
    }

    #[test]
    fn reasons_sorted_by_severity_then_name() {
        let signal = TrustSignal {
            abandoned: true,
            bus_factor_one: true,
            low_maturity: true,
            high_churn: true,
            ..TrustSignal::default()
        };
        let verdict = evaluate(&signal);
        let names: Vec<_> = verdict.reasons.iter().map(|r| r.signal.name()).collect();
        assert_eq!(names, vec!["abandoned", "high_churn", "bus_factor_one", "low_maturity"]);
        assert_eq!(verdict.severity, RiskLevel::Medium);
    }

    #[test]
    fn severity_is_max_of_reasons() {
        let signal = TrustSignal {
            typosquat: true,
            medium_churn: true,
            ..TrustSignal::default()
        };
        let verdict = evaluate(&signal);
        assert_eq!(verdict.severity, RiskLevel::High);
        assert_eq!(
            verdict.severity,
            verdict.reasons.iter().map(|r| r.severity).max().expect("reasons")
        );
    }

    #[test]
    fn adding_a_signal_never_lowers_severity() {
        let base = TrustSignal {
            abandoned: true,
            ..TrustSignal::default()
        };
        let baseline = evaluate(&base).severity;

        let with_more = TrustSignal {
            abandoned: true,
            low_maturity: true,
            bus_factor_one: true,
            ..TrustSignal::default()
        };
        assert!(evaluate(&with_more).severity >= baseline);

        let with_high = TrustSignal {
            abandoned: true,
            yanked: true,
            ..TrustSignal::default()
        };
        assert!(evaluate(&with_high).severity >= baseline);
    }

    #[test]
    fn unscored_advisory_still_contributes_low() {
        let signal = TrustSignal {
            has_known_vuln: true,
            known_vuln_severity: Some(Severity::None),
            ..TrustSignal::default()
        };
        assert_eq!(evaluate(&signal).severity, RiskLevel::Low);
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("requests", "requests", 2), 0);
        assert_eq!(levenshtein("reqursts", "requests", 2), 1);
        assert_eq!(levenshtein("lodash", "lodsah", 2), 2);
        assert_eq!(levenshtein("alpha", "omega", 2), 3); // bound + 1
        assert_eq!(levenshtein("", "abc", 2), 3);
    }

    #[test]
    fn levenshtein_length_gap_short_circuits() {
        assert_eq!(levenshtein("a", "abcdefgh", 2), 3);
    }
}
