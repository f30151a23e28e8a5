use std::collections::BTreeSet;

use rust_decimal::Decimal;

use crate::error::{FeasibilityError, ValidationIssue};
use crate::equity::waterfall::{CatchUp, EquityConfig};
use crate::financing::dsra::DsraPolicy;
use crate::project::ProjectInput;
use crate::revenue::escrow::ReleaseFunction;
use crate::revenue::sales::Offering;
use crate::timeline::Curve;
use crate::FeasibilityResult;

/// Longest horizon, tenor or reserve window accepted, in months.
pub const MAX_TERM_MONTHS: usize = 1200;

/// Accumulates every violation found in one pass over the input.
#[derive(Debug, Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn push(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.push(ValidationIssue::new(field, reason));
    }

    fn non_negative(&mut self, field: &str, value: Decimal) {
        if value < Decimal::ZERO {
            self.push(field, format!("must be non-negative, got {value}"));
        }
    }

    /// Rates may be negative but never at or below −100%.
    fn rate(&mut self, field: &str, value: Decimal) {
        if value <= -Decimal::ONE {
            self.push(field, format!("rate must be greater than -1, got {value}"));
        }
    }

    fn unit_interval(&mut self, field: &str, value: Decimal) {
        if value < Decimal::ZERO || value > Decimal::ONE {
            self.push(field, format!("must be between 0 and 1, got {value}"));
        }
    }

    fn curve(&mut self, field: &str, curve: &Curve) {
        if let Some(v) = curve.values.iter().find(|v| **v < Decimal::ZERO) {
            self.push(format!("{field}.values"), format!("curve values must be non-negative, got {v}"));
        }
        if curve.span_months == Some(0) {
            self.push(format!("{field}.span_months"), "must be positive");
        }
    }

    fn unique_ids<'a>(&mut self, field: &str, ids: impl Iterator<Item = &'a str>) {
        let mut seen = BTreeSet::new();
        for id in ids {
            if !seen.insert(id) {
                self.push(field, format!("duplicate id '{id}'"));
            }
        }
    }

    fn known(&mut self, field: &str, reference: Option<&str>, known: &BTreeSet<&str>, kind: &str) {
        if let Some(r) = reference {
            if !known.contains(r) {
                self.push(field, format!("unknown {kind} '{r}'"));
            }
        }
    }
}

/// Check a project before any stage runs. Every violation is reported
/// together in a single `FeasibilityError::Validation`.
pub fn validate_project(project: &ProjectInput) -> FeasibilityResult<()> {
    let issues = collect_issues(project);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(FeasibilityError::Validation(issues))
    }
}

pub fn collect_issues(project: &ProjectInput) -> Vec<ValidationIssue> {
    let mut issues = Issues::default();
    let periods = project.periods();

    if periods == 0 {
        issues.push("timeline.periods", "must be greater than zero");
    }
    if periods > MAX_TERM_MONTHS {
        issues.push("timeline.periods", format!("must be at most {MAX_TERM_MONTHS}, got {periods}"));
    }

    for (name, rate) in &project.indices {
        issues.rate(&format!("indices.{name}"), *rate);
    }
    let index_names: BTreeSet<&str> = project.indices.keys().map(String::as_str).collect();
    let plot_ids: BTreeSet<&str> = project.plots.iter().map(|p| p.id.as_str()).collect();

    issues.unique_ids("plots", project.plots.iter().map(|p| p.id.as_str()));
    issues.unique_ids("unit_types", project.unit_types.iter().map(|u| u.id.as_str()));
    issues.unique_ids("cost_items", project.cost_items.iter().map(|c| c.id.as_str()));
    issues.unique_ids("tranches", project.tranches.iter().map(|t| t.id.as_str()));

    for (i, unit) in project.unit_types.iter().enumerate() {
        let at = format!("unit_types[{i}]");
        issues.non_negative(&format!("{at}.area_sqm"), unit.area_sqm);
        issues.non_negative(&format!("{at}.count"), unit.count);
        match &unit.offering {
            Offering::Sale { price_per_sqm, .. } => {
                issues.non_negative(&format!("{at}.price_per_sqm"), *price_per_sqm)
            }
            Offering::Lease { rent_per_sqm_month } => {
                issues.non_negative(&format!("{at}.rent_per_sqm_month"), *rent_per_sqm_month)
            }
        }
        issues.curve(&format!("{at}.curve"), &unit.curve);
        issues.known(
            &format!("{at}.escalation_index"),
            unit.escalation_index.as_deref(),
            &index_names,
            "index",
        );
        issues.known(&format!("{at}.plot_id"), unit.plot_id.as_deref(), &plot_ids, "plot");
    }

    for (i, item) in project.cost_items.iter().enumerate() {
        let at = format!("cost_items[{i}]");
        issues.non_negative(&format!("{at}.base_amount"), item.base_amount);
        issues.curve(&format!("{at}.phasing"), &item.phasing);
        issues.known(
            &format!("{at}.escalation_index"),
            item.escalation_index.as_deref(),
            &index_names,
            "index",
        );
        issues.known(&format!("{at}.plot_id"), item.plot_id.as_deref(), &plot_ids, "plot");
        if let Some(policy) = &item.depreciation {
            if item.is_opex {
                issues.push(format!("{at}.depreciation"), "only capex items can be depreciated");
            }
            if policy.useful_life_months == 0 {
                issues.push(format!("{at}.depreciation.useful_life_months"), "must be greater than zero");
            }
            issues.non_negative(&format!("{at}.depreciation.salvage_value"), policy.salvage_value);
        }
    }

    for (i, tranche) in project.tranches.iter().enumerate() {
        let at = format!("tranches[{i}]");
        issues.rate(&format!("{at}.rate"), tranche.rate);
        if let Some(c) = tranche.commitment {
            issues.non_negative(&format!("{at}.commitment"), c);
        }
        if let Some(ltc) = tranche.ltc {
            issues.unit_interval(&format!("{at}.ltc"), ltc);
        }
        if let Some(ltv) = tranche.ltv {
            issues.unit_interval(&format!("{at}.ltv"), ltv);
        }
        if tranche.tenor_months == 0 {
            issues.push(format!("{at}.tenor_months"), "must be greater than zero");
        }
        if tranche.tenor_months as usize > MAX_TERM_MONTHS {
            issues.push(
                format!("{at}.tenor_months"),
                format!("must be at most {MAX_TERM_MONTHS}, got {}", tranche.tenor_months),
            );
        }
        if let DsraPolicy::Forward { months } | DsraPolicy::Trailing { months } = tranche.dsra {
            if months > MAX_TERM_MONTHS {
                issues.push(
                    format!("{at}.dsra.months"),
                    format!("must be at most {MAX_TERM_MONTHS}, got {months}"),
                );
            }
        }
        if periods > 0 && tranche.availability_start >= periods {
            issues.push(format!("{at}.availability_start"), "outside the project horizon");
        }
        if let Some(end) = tranche.availability_end {
            if end >= periods {
                issues.push(format!("{at}.availability_end"), "outside the project horizon");
            }
            if end < tranche.availability_start {
                issues.push(format!("{at}.availability_end"), "ends before availability starts");
            }
        }
        if let Some(start) = tranche.repayment_start_month {
            if start >= periods {
                issues.push(format!("{at}.repayment_start_month"), "outside the project horizon");
            }
        }
        for (field, pct) in [
            ("upfront_fee_pct", tranche.upfront_fee_pct),
            ("ongoing_fee_pct", tranche.ongoing_fee_pct),
            ("commitment_fee_pct", tranche.commitment_fee_pct),
        ] {
            issues.unit_interval(&format!("{at}.{field}"), pct);
        }
    }

    match &project.escrow.release {
        ReleaseFunction::PowerLaw { alpha, beta } => {
            if *alpha <= Decimal::ZERO {
                issues.push("escrow.release.alpha", "must be greater than zero");
            }
            if *beta <= Decimal::ZERO {
                issues.push("escrow.release.beta", "must be greater than zero");
            }
        }
        ReleaseFunction::Milestones { milestones } => {
            for (i, m) in milestones.iter().enumerate() {
                issues.unit_interval(&format!("escrow.release.milestones[{i}].fraction"), m.fraction);
            }
        }
    }

    let cam = &project.cam;
    if cam.gross_up_threshold <= Decimal::ZERO || cam.gross_up_threshold > Decimal::ONE {
        issues.push(
            "cam.gross_up_threshold",
            format!("must be in (0, 1], got {}", cam.gross_up_threshold),
        );
    }
    issues.non_negative("cam.admin_fee_pct", cam.admin_fee_pct);

    issues.unit_interval("tax.vat.rate", project.tax.vat.rate);
    issues.unit_interval("tax.corporate.rate", project.tax.corporate.rate);
    if let Some(cap) = project.tax.corporate.interest_cap_pct {
        issues.non_negative("tax.corporate.interest_cap_pct", cap);
    }
    issues.unit_interval("tax.zakat.rate", project.tax.zakat.rate);

    if let Some(equity) = &project.equity {
        check_equity(&mut issues, equity);
    }

    issues.0
}

fn check_equity(issues: &mut Issues, equity: &EquityConfig) {
    issues.unique_ids("equity.classes", equity.classes.iter().map(|c| c.id.as_str()));
    issues.unique_ids("equity.investors", equity.investors.iter().map(|i| i.id.as_str()));
    let class_ids: BTreeSet<&str> = equity.classes.iter().map(|c| c.id.as_str()).collect();

    for (i, class) in equity.classes.iter().enumerate() {
        let at = format!("equity.classes[{i}]");
        issues.rate(&format!("{at}.pref_rate"), class.pref_rate);
        match class.catch_up {
            CatchUp::None => {}
            CatchUp::Exact { target_share } => {
                if target_share < Decimal::ZERO || target_share >= Decimal::ONE {
                    issues.push(format!("{at}.catch_up.target_share"), "must be in [0, 1)");
                }
            }
            CatchUp::FlatShare {
                target_share,
                gp_rate,
            } => {
                if target_share < Decimal::ZERO || target_share >= Decimal::ONE {
                    issues.push(format!("{at}.catch_up.target_share"), "must be in [0, 1)");
                }
                if gp_rate <= Decimal::ZERO || gp_rate > Decimal::ONE {
                    issues.push(format!("{at}.catch_up.gp_rate"), "must be in (0, 1]");
                }
            }
        }
        for (j, tier) in class.tiers.iter().enumerate() {
            issues.unit_interval(&format!("{at}.tiers[{j}].gp_split"), tier.gp_split);
            issues.rate(&format!("{at}.tiers[{j}].hurdle_irr"), tier.hurdle_irr);
        }
        if !equity.investors.iter().any(|inv| inv.class_id == class.id) {
            issues.push(at.clone(), format!("class '{}' has no investors", class.id));
        }
    }

    for (i, investor) in equity.investors.iter().enumerate() {
        let at = format!("equity.investors[{i}]");
        issues.non_negative(&format!("{at}.commitment"), investor.commitment);
        if let Some(share) = investor.fixed_share {
            issues.unit_interval(&format!("{at}.fixed_share"), share);
        }
        issues.known(
            &format!("{at}.class_id"),
            Some(investor.class_id.as_str()),
            &class_ids,
            "equity class",
        );
    }
}
