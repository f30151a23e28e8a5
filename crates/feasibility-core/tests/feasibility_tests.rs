use feasibility_core::equity::waterfall::{run_waterfall, EquityConfig};
use feasibility_core::financing::dsra::build_dsra;
use feasibility_core::financing::tranche::{schedule_tranche, TrancheInput};
use feasibility_core::time_value::annual_irr;
use feasibility_core::timeline::{cumulative, Timeline};
use feasibility_core::{run_feasibility, run_feasibility_json, FeasibilityError, ProjectInput};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const TOLERANCE: Decimal = dec!(0.01);

fn load(raw: &str) -> ProjectInput {
    serde_json::from_str(raw).unwrap()
}

// ===========================================================================
// Residential sale project with escrow and cash-basis VAT
// ===========================================================================

const RESIDENTIAL: &str = r#"{
    "name": "Residential tower",
    "timeline": { "periods": 12, "start_date": "2026-01-01" },
    "unit_types": [{
        "id": "apartments",
        "area_sqm": "100",
        "count": "100",
        "mode": "sale",
        "price_per_sqm": "10000",
        "recognition": { "policy": "billings_capped" },
        "curve": { "values": ["1", "1", "1", "1"], "start_month": 3, "span_months": 4 }
    }],
    "cost_items": [{
        "id": "construction",
        "base_amount": "50000000",
        "phasing": { "values": ["50", "30", "20"], "span_months": 3 }
    }],
    "escrow": { "enabled": true, "release": { "type": "power_law", "alpha": "1", "beta": "1" } },
    "tax": { "vat": { "enabled": true, "rate": "0.05", "basis": "cash" } }
}"#;

#[test]
fn test_residential_collections_and_vat() {
    let out = run_feasibility_json(RESIDENTIAL).unwrap();
    let r = &out.result;

    assert_eq!(
        r.costs.capex[..3].to_vec(),
        vec![dec!(25000000), dec!(15000000), dec!(10000000)]
    );
    assert_eq!(
        r.escrow.cumulative_allowed[..3].to_vec(),
        vec![dec!(50000000), dec!(80000000), dec!(100000000)]
    );

    // Nothing is collected before the first sale month
    for t in 0..3 {
        assert_eq!(r.revenue.collections[t], Decimal::ZERO);
    }
    assert_eq!(r.revenue.collections[3], dec!(25000000));
    assert!(!r.revenue.collections_capped);

    for t in 0..12 {
        assert_eq!(r.tax.vat.net_vat[t], r.revenue.collections[t] * dec!(0.05));
    }

    let billed: Decimal = r.revenue.billings.iter().sum();
    let collected: Decimal = r.revenue.collections.iter().sum();
    assert_eq!(r.revenue.accounts_receivable[11], billed - collected);

    assert!(r.balance_sheet.tie_out_ok);
}

#[test]
fn test_escrow_caps_collections_and_recognition() {
    let raw = r#"{
        "timeline": { "periods": 12 },
        "unit_types": [{
            "id": "apartments", "area_sqm": "100", "count": "10", "mode": "sale",
            "price_per_sqm": "1000", "recognition": { "policy": "billings_capped" },
            "curve": { "values": ["1", "1", "1", "1"], "span_months": 4 }
        }],
        "cost_items": [{ "id": "build", "base_amount": "500000", "phasing": ["1"] }],
        "escrow": {
            "enabled": true,
            "release": { "type": "milestones", "milestones": [
                { "month": 0, "fraction": "0.1" },
                { "month": 6, "fraction": "0.5" },
                { "month": 11, "fraction": "1" }
            ] }
        }
    }"#;
    let out = run_feasibility_json(raw).unwrap();
    let r = &out.result;

    assert!(r.revenue.collections_capped);
    assert!(r.revenue.recognition_capped);
    assert!(out.warnings.iter().any(|w| w.contains("escrow")));

    let allowed = &r.escrow.cumulative_allowed;
    let collected = cumulative(&r.revenue.collections);
    let recognized = cumulative(&r.revenue.recognized_sales);
    for t in 0..12 {
        assert!(collected[t] <= allowed[t] + TOLERANCE, "collections over cap at {t}");
        assert!(recognized[t] <= allowed[t] + TOLERANCE, "recognition over cap at {t}");
    }
    assert_eq!(collected[0], dec!(100000));
    assert_eq!(collected[6], dec!(500000));
    assert_eq!(collected[11], dec!(1000000));
    assert!(r.balance_sheet.tie_out_ok);
}

#[test]
fn test_output_vat_follows_each_unit_vat_class() {
    let raw = r#"{
        "timeline": { "periods": 12 },
        "unit_types": [
            {
                "id": "villa", "area_sqm": "100", "count": "1", "mode": "sale",
                "price_per_sqm": "1000", "recognition": { "policy": "billings_capped" },
                "vat_class": "zero",
                "curve": { "values": ["1"], "start_month": 0, "span_months": 1 }
            },
            {
                "id": "apartment", "area_sqm": "100", "count": "1", "mode": "sale",
                "price_per_sqm": "1000", "recognition": { "policy": "billings_capped" },
                "curve": { "values": ["1"], "start_month": 10, "span_months": 1 }
            }
        ],
        "cost_items": [{ "id": "build", "base_amount": "50000", "phasing": ["1"] }],
        "tax": { "vat": { "enabled": true, "rate": "0.05", "basis": "accrual" } }
    }"#;
    let out = run_feasibility_json(raw).unwrap();
    let vat = &out.result.tax.vat;

    assert_eq!(out.result.revenue.recognized_sales[0], dec!(100000));
    assert_eq!(vat.output_vat[0], Decimal::ZERO);
    assert_eq!(vat.output_vat[10], dec!(5000));
    assert_eq!(vat.output_vat.iter().sum::<Decimal>(), dec!(5000));
    assert!(out.result.balance_sheet.tie_out_ok);
}

// ===========================================================================
// Mixed-use project touching every stage
// ===========================================================================

const MIXED_USE: &str = r#"{
    "name": "Mixed-use block",
    "timeline": { "periods": 36, "start_date": "2026-01-01" },
    "indices": { "cpi": "0.03", "construction": "0.05" },
    "plots": [{ "id": "north" }, { "id": "south" }],
    "unit_types": [
        {
            "id": "apartments", "category": "residential", "plot_id": "north",
            "area_sqm": "120", "count": "50", "mode": "sale", "price_per_sqm": "8000",
            "recognition": { "policy": "poc_cost" }, "collection_lag_months": 1,
            "escalation_index": "cpi",
            "curve": { "values": ["1", "2", "3", "2", "1"], "start_month": 4, "span_months": 12 }
        },
        {
            "id": "villas", "category": "residential", "plot_id": "south",
            "area_sqm": "300", "count": "10", "mode": "sale", "price_per_sqm": "9000",
            "recognition": { "policy": "handover", "delivery_month": 24 },
            "vat_class": "zero",
            "curve": { "values": ["1", "1"], "start_month": 6, "span_months": 10 }
        },
        {
            "id": "shops", "category": "retail", "plot_id": "north",
            "area_sqm": "80", "count": "20", "mode": "lease", "rent_per_sqm_month": "15",
            "curve": { "values": ["0", "0.5", "0.9", "1"], "start_month": 24, "span_months": 12 }
        },
        {
            "id": "offices", "category": "office", "plot_id": "south",
            "area_sqm": "500", "count": "2", "mode": "lease", "rent_per_sqm_month": "12",
            "vat_class": "exempt",
            "curve": { "values": ["0.6", "1"], "start_month": 26 }
        }
    ],
    "cost_items": [
        { "id": "land", "base_amount": "20000000", "phasing": { "values": ["1"], "span_months": 1 } },
        {
            "id": "construction", "base_amount": "60000000", "escalation_index": "construction",
            "vat_eligible": true,
            "phasing": { "values": ["1", "3", "4", "3", "1"], "start_month": 1, "span_months": 22 },
            "depreciation": { "useful_life_months": 300, "start_month": 24, "salvage_value": "1000000" }
        },
        {
            "id": "fit_out", "base_amount": "5000000", "plot_id": "north", "vat_eligible": true,
            "phasing": { "values": ["1"], "start_month": 21, "span_months": 3 },
            "depreciation": { "useful_life_months": 60, "start_month": 24 }
        },
        {
            "id": "facility_management", "is_opex": true, "recoverable": true, "plot_id": "north",
            "base_amount": "1200000", "escalation_index": "cpi",
            "phasing": { "values": ["1"], "start_month": 24, "span_months": 12 }
        },
        {
            "id": "common_services", "is_opex": true, "recoverable": true,
            "base_amount": "600000",
            "phasing": { "values": ["1"], "start_month": 24, "span_months": 12 }
        },
        {
            "id": "marketing", "is_opex": true, "base_amount": "900000",
            "phasing": { "values": ["1", "1"], "start_month": 3, "span_months": 18 }
        }
    ],
    "tranches": [
        {
            "id": "senior", "rate": "0.07", "ltc": "0.55",
            "availability_start": 1, "availability_end": 22,
            "repayment_start_month": 24, "tenor_months": 12, "amortization": "annuity",
            "upfront_fee_pct": "0.01", "ongoing_fee_pct": "0.002", "commitment_fee_pct": "0.005",
            "dsra": { "type": "forward", "months": 3 },
            "draw_priority": 0, "min_dscr": "1.2", "min_icr": "1.5"
        },
        {
            "id": "mezzanine", "rate": "0.12", "commitment": "8000000",
            "availability_end": 22, "repayment_start_month": 30, "tenor_months": 6,
            "amortization": "bullet", "dsra": { "type": "trailing", "months": 2 },
            "draw_priority": 1
        }
    ],
    "escrow": { "enabled": true, "release": { "type": "power_law", "alpha": "1.5", "beta": "2" } },
    "cam": { "enabled": true, "admin_fee_pct": "0.1", "split_by_plot": true },
    "tax": {
        "vat": { "enabled": true, "rate": "0.05", "basis": "accrual", "settlement_lag_months": 1 },
        "corporate": { "enabled": true, "rate": "0.09", "interest_cap_pct": "0.3" },
        "zakat": { "enabled": true, "rate": "0.025", "basis": "equity_injections" }
    },
    "equity": {
        "classes": [{
            "id": "common", "pref_rate": "0.08", "compounding": "compounded",
            "catch_up": { "type": "exact", "target_share": "0.2" },
            "tiers": [
                { "hurdle_irr": "0", "gp_split": "0.2" },
                { "hurdle_irr": "0.15", "gp_split": "0.3" }
            ]
        }],
        "investors": [
            { "id": "fund", "class_id": "common", "commitment": "80000000" },
            { "id": "sponsor", "class_id": "common", "commitment": "20000000", "role": "gp" }
        ],
        "frequency": "quarterly"
    }
}"#;

#[test]
fn test_mixed_project_ties_out_every_period() {
    let out = run_feasibility(&load(MIXED_USE)).unwrap();
    let bs = &out.result.balance_sheet;
    assert!(bs.tie_out_ok, "imbalance {:?}", bs.imbalance);
    assert!(bs.max_abs_imbalance < TOLERANCE);
    assert_eq!(bs.first_imbalance_period, None);
    for t in 0..36 {
        assert!((bs.assets_total[t] - bs.liab_equity_total[t]).abs() < TOLERANCE);
    }
}

#[test]
fn test_mixed_project_balances_never_negative() {
    let out = run_feasibility(&load(MIXED_USE)).unwrap();
    let fin = &out.result.financing;
    assert_eq!(fin.tranches.len(), 2);
    for tranche in &fin.tranches {
        assert!(tranche.schedule.closing_balance.iter().all(|b| *b >= Decimal::ZERO));
        assert!(tranche.dsra.balance.iter().all(|b| *b >= Decimal::ZERO));
    }
    assert!(fin.debt_balance[35].abs() < TOLERANCE);
    assert!(out.result.cash.cash_balance.iter().all(|c| *c >= -TOLERANCE));
}

#[test]
fn test_mixed_project_escrow_caps_hold() {
    let out = run_feasibility(&load(MIXED_USE)).unwrap();
    let r = &out.result;
    let allowed = &r.escrow.cumulative_allowed;
    let collected = cumulative(&r.revenue.collections);
    let recognized = cumulative(&r.revenue.recognized_sales);
    for t in 0..36 {
        assert!(collected[t] <= allowed[t] + TOLERANCE);
        assert!(recognized[t] <= allowed[t] + TOLERANCE);
    }
}

#[test]
fn test_mixed_project_carryforwards_are_consumed_first() {
    let out = run_feasibility(&load(MIXED_USE)).unwrap();
    let vat = &out.result.tax.vat;
    let corp = &out.result.tax.corporate;

    for t in 0..36 {
        assert!(vat.carryforward[t] >= Decimal::ZERO);
        assert!(corp.nol_balance[t] >= Decimal::ZERO);
        if t == 0 {
            continue;
        }
        if vat.net_vat[t] > Decimal::ZERO && vat.carryforward[t - 1] > Decimal::ZERO {
            assert!(vat.carryforward[t] < vat.carryforward[t - 1], "VAT credit not used at {t}");
        }
        if corp.taxable_income[t] > Decimal::ZERO && corp.nol_balance[t - 1] > Decimal::ZERO {
            assert!(corp.nol_balance[t] < corp.nol_balance[t - 1], "NOL not used at {t}");
            assert!(corp.nol_used[t] > Decimal::ZERO);
        }
    }
}

#[test]
fn test_mixed_project_reports_every_stage() {
    let out = run_feasibility(&load(MIXED_USE)).unwrap();
    let r = &out.result;

    assert!(r.cam.enabled);
    assert_eq!(r.cam.plots.len(), 2);
    assert!(r.cam.cam_revenue.iter().any(|c| *c > Decimal::ZERO));
    assert!(r.depreciation.charge[24] > Decimal::ZERO);
    assert_eq!(r.financing.tranches[0].schedule.id, "senior");
    assert!(r.profit_loss.rent.iter().any(|c| *c > Decimal::ZERO));
    assert_eq!(r.covenants.tranches.len(), 2);

    let equity = r.equity.as_ref().unwrap();
    assert_eq!(equity.investors.len(), 2);
    let called: Decimal = equity.capital_calls.iter().sum();
    let injected: Decimal = r.cash.equity_injections.iter().sum();
    assert_eq!(called, injected);

    assert_eq!(r.period_dates[0].to_string(), "2026-01-01");
    assert_eq!(r.kpis.tie_out_ok, r.balance_sheet.tie_out_ok);
}

#[test]
fn test_mixed_project_zero_rated_villas_carry_no_output_vat() {
    let out = run_feasibility(&load(MIXED_USE)).unwrap();
    let r = &out.result;
    let apartments = &r.revenue.units[0];
    let villas = &r.revenue.units[1];
    assert_eq!(villas.id, "villas");

    let taxable: Decimal = r.revenue.taxable_recognized.iter().sum();
    assert!((taxable - apartments.contract_value).abs() < TOLERANCE);

    let recognized: Decimal = r.revenue.recognized_sales.iter().sum();
    assert!((recognized - taxable - villas.contract_value).abs() < TOLERANCE);

    for t in 0..36 {
        let expected = r.tax.vat.output_base[t] * dec!(0.05);
        assert_eq!(r.tax.vat.output_vat[t], expected);
        assert!(r.tax.vat.output_base[t] <= r.revenue.recognized_sales[t] + r.revenue.rent[t] + r.cam.cam_revenue[t] + TOLERANCE);
    }
}

// ===========================================================================
// Debt, equity and IRR in isolation
// ===========================================================================

#[test]
fn test_annuity_tranche_retires_single_draw() {
    let input: TrancheInput = serde_json::from_str(
        r#"{ "id": "senior", "rate": "0.08", "availability_end": 0,
             "tenor_months": 24, "amortization": "annuity" }"#,
    )
    .unwrap();
    let mut draws = vec![Decimal::ZERO; 24];
    draws[0] = dec!(1000000);
    let sched = schedule_tranche(&input, None, draws);

    let first = sched.debt_service[0];
    for ds in &sched.debt_service {
        assert!((*ds - first).abs() < TOLERANCE);
    }
    assert!(sched.closing_balance[23].abs() < TOLERANCE);
    let repaid: Decimal = sched.principal.iter().sum();
    assert!((repaid - dec!(1000000)).abs() < TOLERANCE);
}

#[test]
fn test_straight_line_tranche_repays_equal_principal() {
    let input: TrancheInput = serde_json::from_str(
        r#"{ "id": "term", "rate": "0.12", "availability_end": 0,
             "tenor_months": 4, "amortization": "straight_line" }"#,
    )
    .unwrap();
    let mut draws = vec![Decimal::ZERO; 4];
    draws[0] = dec!(1200);
    let sched = schedule_tranche(&input, None, draws);

    assert_eq!(sched.principal, vec![dec!(300); 4]);
    // 1% a month on the declining balance
    assert_eq!(sched.interest, vec![dec!(12), dec!(9), dec!(6), dec!(3)]);
    assert_eq!(sched.closing_balance, vec![dec!(900), dec!(600), dec!(300), dec!(0)]);
}

#[test]
fn test_dsra_fully_released_at_bullet_maturity() {
    let input: TrancheInput = serde_json::from_str(
        r#"{ "id": "mezz", "rate": "0.12", "availability_end": 0,
             "tenor_months": 3, "amortization": "bullet",
             "dsra": { "type": "forward", "months": 1 } }"#,
    )
    .unwrap();
    let mut draws = vec![Decimal::ZERO; 5];
    draws[0] = dec!(1200);
    let sched = schedule_tranche(&input, None, draws);
    assert_eq!(sched.debt_service, vec![dec!(12), dec!(12), dec!(1212), dec!(0), dec!(0)]);

    let dsra = build_dsra(input.dsra, &sched.debt_service, &sched.closing_balance);
    // Month 1 reserves the bullet; maturity releases everything held
    assert_eq!(dsra.balance, vec![dec!(12), dec!(1212), dec!(0), dec!(0), dec!(0)]);
    assert_eq!(dsra.funding, vec![dec!(12), dec!(1200), dec!(0), dec!(0), dec!(0)]);
    assert_eq!(dsra.release, vec![dec!(0), dec!(0), dec!(1212), dec!(0), dec!(0)]);
    let funded: Decimal = dsra.funding.iter().sum();
    let released: Decimal = dsra.release.iter().sum();
    assert_eq!(funded, released);
}

#[test]
fn test_exact_catch_up_completes_after_partial_payment() {
    let cfg: EquityConfig = serde_json::from_str(
        r#"{
        "classes": [{
            "id": "common", "pref_rate": "0.12",
            "catch_up": { "type": "exact", "target_share": "0.2" },
            "tiers": [{ "hurdle_irr": "0", "gp_split": "0.2" }]
        }],
        "investors": [
            { "id": "lp", "class_id": "common", "commitment": "800000" },
            { "id": "gp", "class_id": "common", "commitment": "200000", "role": "gp" }
        ]
    }"#,
    )
    .unwrap();
    let calls = vec![dec!(1000000), dec!(0), dec!(0), dec!(0)];
    // Capital, two months of 1% pref, then 2,000 of catch-up; 10,000 later
    let distributable = vec![dec!(0), dec!(0), dec!(1022000), dec!(10000)];
    let quarter_ends = Timeline::months(4).quarter_end_flags();

    let wf = run_waterfall(&cfg, &calls, &distributable, &quarter_ends, &mut Vec::new());
    let class = &wf.classes[0];
    assert_eq!(class.pref_paid, dec!(20000));
    // Y = (0.2 × 22,000 − 2,000) / 0.8 = 3,000 tops up the partial 2,000
    assert_eq!(class.catch_up_paid, dec!(5000));
    assert_eq!(wf.gp_promote, vec![dec!(0), dec!(0), dec!(2000), dec!(4400)]);
    // GP ends on exactly 20% of the 32,000 profit
    assert_eq!(class.promote_to_gp, dec!(6400));
    assert_eq!(wf.clawback, Decimal::ZERO);
}

#[test]
fn test_waterfall_without_profit_pays_no_promote() {
    let cfg: EquityConfig = serde_json::from_str(
        r#"{
        "classes": [{
            "id": "common", "pref_rate": "0.08",
            "tiers": [{ "hurdle_irr": "0", "gp_split": "0.2" }]
        }],
        "investors": [
            { "id": "lp", "class_id": "common", "commitment": "800000" },
            { "id": "gp", "class_id": "common", "commitment": "200000", "role": "gp" }
        ]
    }"#,
    )
    .unwrap();
    let mut calls = vec![Decimal::ZERO; 13];
    let mut distributable = vec![Decimal::ZERO; 13];
    calls[0] = dec!(1000000);
    distributable[12] = dec!(1000000);
    let quarter_ends = Timeline::months(13).quarter_end_flags();

    let wf = run_waterfall(&cfg, &calls, &distributable, &quarter_ends, &mut Vec::new());
    assert_eq!(wf.classes[0].unreturned_capital[12], Decimal::ZERO);
    assert_eq!(wf.gp_promote.iter().sum::<Decimal>(), Decimal::ZERO);
    assert_eq!(wf.clawback, Decimal::ZERO);
}

#[test]
fn test_irr_round_trip() {
    let x = dec!(1000);
    let mut flows = vec![Decimal::ZERO; 25];
    flows[0] = -x;
    // (1 + 10%)^(24/12)
    flows[24] = x * dec!(1.21);
    let irr = annual_irr(&flows).unwrap();
    assert!((irr - dec!(0.10)).abs() < dec!(0.0001), "got {irr}");
}

// ===========================================================================
// Validation boundary
// ===========================================================================

#[test]
fn test_validation_reports_all_issues_before_running() {
    let raw = r#"{
        "timeline": { "periods": 12 },
        "unit_types": [{
            "id": "a", "area_sqm": "-1", "count": "1", "mode": "sale", "price_per_sqm": "1",
            "recognition": { "policy": "poc_physical" }, "curve": ["1"], "plot_id": "missing"
        }],
        "tranches": [{ "id": "t", "rate": "0.05", "availability_end": 40, "tenor_months": 12 }]
    }"#;
    match run_feasibility_json(raw) {
        Err(FeasibilityError::Validation(issues)) => {
            let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
            assert!(fields.contains(&"unit_types[0].area_sqm"));
            assert!(fields.contains(&"unit_types[0].plot_id"));
            assert!(fields.contains(&"tranches[0].availability_end"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}
