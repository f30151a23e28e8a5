use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::timeline::{cap_cumulative, clamp_unit, increments};
use crate::types::{Money, Rate, Series};

/// |beta - 1| below this is treated as the plain power law.
const BETA_UNIT_EPSILON: Decimal = dec!(0.000000001);

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// How construction progress converts into a cumulative release fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReleaseFunction {
    /// `p^α` when β≈1, otherwise the S-curve `p^α / (p^α + (1-p)^β)`
    PowerLaw { alpha: Decimal, beta: Decimal },
    /// Month-keyed cumulative fractions; the maximum reached so far applies
    Milestones { milestones: Vec<Milestone> },
}

impl Default for ReleaseFunction {
    fn default() -> Self {
        ReleaseFunction::PowerLaw {
            alpha: Decimal::ONE,
            beta: Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub month: usize,
    /// Cumulative share of contract value releasable once `month` is reached
    pub fraction: Rate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscrowConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub release: ReleaseFunction,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowRelease {
    pub enabled: bool,
    pub contract_value_total: Money,
    /// Cumulative cost progress driving the release
    pub progress: Series,
    pub release_fraction: Series,
    /// Allowed incremental release per period
    pub allowed_release: Series,
    pub cumulative_allowed: Series,
}

impl EscrowRelease {
    /// Cap a flow so its running total stays within the cumulative release.
    /// Disabled escrow passes the flow through untouched.
    pub fn cap(&self, raw: &[Money]) -> (Series, bool) {
        if !self.enabled {
            return (raw.to_vec(), false);
        }
        cap_cumulative(raw, &self.cumulative_allowed)
    }
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Release fraction for a single progress value under the power-law family.
pub fn power_law_fraction(progress: Decimal, alpha: Decimal, beta: Decimal) -> Decimal {
    let p = clamp_unit(progress);
    if p.is_zero() {
        return Decimal::ZERO;
    }
    if p == Decimal::ONE {
        return Decimal::ONE;
    }
    let p_alpha = pow_or_base(p, alpha);
    if (beta - Decimal::ONE).abs() < BETA_UNIT_EPSILON {
        return clamp_unit(p_alpha);
    }
    let q_beta = pow_or_base(Decimal::ONE - p, beta);
    let denominator = p_alpha + q_beta;
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    clamp_unit(p_alpha / denominator)
}

fn pow_or_base(base: Decimal, exponent: Decimal) -> Decimal {
    if exponent == Decimal::ONE {
        return base;
    }
    base.checked_powd(exponent).unwrap_or(base)
}

/// Running maximum of the milestone fractions reached by month `t`.
pub fn milestone_fraction(milestones: &[Milestone], t: usize) -> Decimal {
    milestones
        .iter()
        .filter(|m| m.month <= t)
        .map(|m| clamp_unit(m.fraction))
        .max()
        .unwrap_or(Decimal::ZERO)
}

/// Convert cost progress into the cumulative escrow release cap.
pub fn build_release_curve(
    config: &EscrowConfig,
    progress: &[Decimal],
    contract_value_total: Money,
) -> EscrowRelease {
    let release_fraction: Series = match &config.release {
        ReleaseFunction::PowerLaw { alpha, beta } => progress
            .iter()
            .map(|p| power_law_fraction(*p, *alpha, *beta))
            .collect(),
        ReleaseFunction::Milestones { milestones } => (0..progress.len())
            .map(|t| milestone_fraction(milestones, t))
            .collect(),
    };

    // Monotone: a release once granted is never withdrawn.
    let mut high_water = Decimal::ZERO;
    let cumulative_allowed: Series = release_fraction
        .iter()
        .map(|f| {
            high_water = high_water.max(contract_value_total * f);
            high_water
        })
        .collect();

    EscrowRelease {
        enabled: config.enabled,
        contract_value_total,
        progress: progress.to_vec(),
        allowed_release: increments(&cumulative_allowed),
        cumulative_allowed,
        release_fraction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn enabled(release: ReleaseFunction) -> EscrowConfig {
        EscrowConfig {
            enabled: true,
            release,
        }
    }

    #[test]
    fn test_linear_release_tracks_progress() {
        let progress = vec![dec!(0.5), dec!(0.8), dec!(1), dec!(1)];
        let rel = build_release_curve(
            &enabled(ReleaseFunction::default()),
            &progress,
            dec!(1000),
        );
        assert_eq!(
            rel.cumulative_allowed,
            vec![dec!(500), dec!(800), dec!(1000), dec!(1000)]
        );
        assert_eq!(
            rel.allowed_release,
            vec![dec!(500), dec!(300), dec!(200), dec!(0)]
        );
    }

    #[test]
    fn test_s_curve_is_bounded_and_symmetric() {
        let mid = power_law_fraction(dec!(0.5), dec!(2), dec!(2));
        assert_eq!(mid, dec!(0.5));
        let low = power_law_fraction(dec!(0.1), dec!(2), dec!(2));
        assert!(low > Decimal::ZERO && low < dec!(0.1));
        assert_eq!(power_law_fraction(Decimal::ZERO, dec!(2), dec!(3)), Decimal::ZERO);
        assert_eq!(power_law_fraction(Decimal::ONE, dec!(2), dec!(3)), Decimal::ONE);
    }

    #[test]
    fn test_milestones_take_running_max() {
        let ms = vec![
            Milestone {
                month: 2,
                fraction: dec!(0.3),
            },
            Milestone {
                month: 4,
                fraction: dec!(0.2),
            },
            Milestone {
                month: 5,
                fraction: dec!(1),
            },
        ];
        let rel = build_release_curve(
            &enabled(ReleaseFunction::Milestones { milestones: ms }),
            &vec![Decimal::ZERO; 6],
            dec!(100),
        );
        assert_eq!(
            rel.cumulative_allowed,
            vec![dec!(0), dec!(0), dec!(30), dec!(30), dec!(30), dec!(100)]
        );
    }

    #[test]
    fn test_cap_never_exceeds_release() {
        let progress = vec![dec!(0.2), dec!(0.6), dec!(1)];
        let rel = build_release_curve(
            &enabled(ReleaseFunction::default()),
            &progress,
            dec!(100),
        );
        let (capped, truncated) = rel.cap(&[dec!(100), dec!(0), dec!(0)]);
        assert!(truncated);
        assert_eq!(capped, vec![dec!(20), dec!(40), dec!(40)]);
    }

    #[test]
    fn test_disabled_passes_through() {
        let rel = build_release_curve(&EscrowConfig::default(), &[dec!(0)], dec!(100));
        let (capped, truncated) = rel.cap(&[dec!(50)]);
        assert!(!truncated);
        assert_eq!(capped, vec![dec!(50)]);
    }

    #[test]
    fn test_release_config_deserializes_tagged() {
        let cfg: EscrowConfig = serde_json::from_str(
            r#"{"enabled": true, "release": {"type": "power_law", "alpha": "1.5", "beta": "2"}}"#,
        )
        .unwrap();
        assert_eq!(
            cfg.release,
            ReleaseFunction::PowerLaw {
                alpha: dec!(1.5),
                beta: dec!(2)
            }
        );
    }
}
