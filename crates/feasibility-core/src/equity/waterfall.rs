use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::equity::metrics::{fund_metrics, irr_or_warn, FundMetrics, MetricFlows};
use crate::time_value::annual_irr;
use crate::types::{Money, Rate, Series};

const MONTHS: Decimal = dec!(12);

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefCompounding {
    /// `rate / 12` on unreturned capital
    #[default]
    Simple,
    /// `(1 + rate)^(1/12) − 1` on unreturned capital plus unpaid pref
    Compounded,
}

/// How the GP catches up on profit after the preferred return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatchUp {
    #[default]
    None,
    /// 100% to the GP until it holds `target_share` of profit to date:
    /// `Y = (τA − G) / (1 − τ)`
    Exact { target_share: Rate },
    /// `gp_rate` of each dollar to the GP until it holds `target_share`
    FlatShare { target_share: Rate, gp_rate: Rate },
}

/// A promote split applying once the hurdle IRR has been reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoteTier {
    /// Annual IRR the hurdle basis must reach
    pub hurdle_irr: Rate,
    /// GP share of profit in this tier; LPs receive the rest
    pub gp_split: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityClass {
    pub id: String,
    /// Lower is more senior
    #[serde(default)]
    pub seniority: u32,
    #[serde(default)]
    pub pref_rate: Rate,
    #[serde(default)]
    pub compounding: PrefCompounding,
    #[serde(default)]
    pub catch_up: CatchUp,
    /// Ascending by hurdle
    #[serde(default)]
    pub tiers: Vec<PromoteTier>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestorRole {
    #[default]
    Lp,
    Gp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investor {
    pub id: String,
    pub class_id: String,
    pub commitment: Money,
    #[serde(default)]
    pub role: InvestorRole,
    /// Share of each capital call, overriding commitment pro-rata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_share: Option<Rate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionFrequency {
    #[default]
    Monthly,
    /// Accumulate and distribute at calendar quarter ends
    Quarterly,
}

/// IRR that selects the promote tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HurdleBasis {
    /// All LP investors together
    #[default]
    LpIrr,
    /// Investors of the class being distributed to
    ClassIrr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityConfig {
    pub classes: Vec<EquityClass>,
    pub investors: Vec<Investor>,
    #[serde(default)]
    pub frequency: DistributionFrequency,
    #[serde(default)]
    pub hurdle_basis: HurdleBasis,
    /// Distribute whatever is held back in the final period
    #[serde(default = "default_flush")]
    pub flush_at_horizon: bool,
}

fn default_flush() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestorResult {
    pub id: String,
    pub class_id: String,
    pub role: InvestorRole,
    pub calls: Series,
    pub distributions: Series,
    pub contributed: Money,
    pub return_of_capital: Money,
    pub pref_received: Money,
    pub profit_received: Money,
    pub irr: Option<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassResult {
    pub id: String,
    pub contributed: Money,
    pub unreturned_capital: Series,
    /// Accrued pref not yet paid
    pub pref_balance: Series,
    pub return_of_capital: Money,
    pub pref_paid: Money,
    pub catch_up_paid: Money,
    pub promote_to_lp: Money,
    pub promote_to_gp: Money,
    pub irr: Option<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityWaterfall {
    pub capital_calls: Series,
    pub distributions: Series,
    pub lp_distributions: Series,
    pub gp_distributions: Series,
    /// GP catch-up plus promote
    pub gp_promote: Series,
    /// Cash held back awaiting the next distribution date
    pub undistributed: Series,
    pub classes: Vec<ClassResult>,
    pub investors: Vec<InvestorResult>,
    /// GP promote in excess of its final entitlement
    pub clawback: Money,
    pub metrics: FundMetrics,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

struct InvestorState<'a> {
    input: &'a Investor,
    class: usize,
    unreturned: Money,
    contributed: Money,
    calls: Series,
    distributions: Series,
    return_of_capital: Money,
    pref_received: Money,
    profit_received: Money,
}

impl InvestorState<'_> {
    fn is_gp(&self) -> bool {
        self.input.role == InvestorRole::Gp
    }

    fn pay(&mut self, t: usize, amount: Money) {
        self.distributions[t] += amount;
    }

    fn net_flows(&self, through: usize) -> Series {
        (0..=through)
            .map(|t| self.distributions[t] - self.calls[t])
            .collect()
    }
}

#[derive(Default)]
struct ClassState {
    pref_accrued: Money,
    /// Profit distributed to date, LP and GP
    profit_to_date: Money,
    /// Catch-up and promote paid to the GP to date
    gp_promote_to_date: Money,
    return_of_capital: Money,
    pref_paid: Money,
    catch_up_paid: Money,
    promote_to_lp: Money,
    promote_to_gp: Money,
    unreturned_capital: Series,
    pref_balance: Series,
}

/// Split `amount` by `weights`, equally when the weights sum to zero.
/// The last recipient takes the rounding remainder so nothing is lost.
fn pro_rata(amount: Money, weights: &[Decimal]) -> Vec<Money> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let total: Decimal = weights.iter().sum();
    let mut shares: Vec<Money> = if total > Decimal::ZERO {
        weights.iter().map(|w| amount * *w / total).collect()
    } else {
        vec![amount / Decimal::from(n as u64); n]
    };
    let allocated: Money = shares[..n - 1].iter().sum();
    shares[n - 1] = amount - allocated;
    shares
}

fn monthly_pref_rate(class: &EquityClass) -> Rate {
    match class.compounding {
        PrefCompounding::Simple => class.pref_rate / MONTHS,
        PrefCompounding::Compounded => (Decimal::ONE + class.pref_rate)
            .checked_powd(Decimal::ONE / MONTHS)
            .map(|f| f - Decimal::ONE)
            .unwrap_or(class.pref_rate / MONTHS),
    }
}

/// GP share of tier profit at the given hurdle IRR.
fn tier_split(tiers: &[PromoteTier], irr: Option<Rate>) -> Option<Rate> {
    let first = tiers.first()?;
    let Some(irr) = irr else {
        return Some(first.gp_split);
    };
    Some(
        tiers
            .iter()
            .filter(|tier| tier.hurdle_irr <= irr)
            .last()
            .unwrap_or(first)
            .gp_split,
    )
}

/// One class's profit divided between catch-up, GP promote and LPs.
struct ProfitSplit {
    /// Profit consumed by the catch-up, GP and LP parts together
    catch_up: Money,
    to_gp: Money,
    to_lp: Money,
}

impl ProfitSplit {
    /// Split `amount` given profit `a` and GP promote `g` already distributed.
    fn of(catch_up: CatchUp, a: Money, g: Money, amount: Money, gp_split: Option<Rate>) -> Self {
        let mut remaining = amount;
        let mut to_gp = Decimal::ZERO;
        let mut to_lp = Decimal::ZERO;

        match catch_up {
            CatchUp::None => {}
            CatchUp::Exact { target_share } => {
                if target_share < Decimal::ONE {
                    let y = (target_share * a - g) / (Decimal::ONE - target_share);
                    let pay = remaining.min(y.max(Decimal::ZERO));
                    to_gp += pay;
                    remaining -= pay;
                }
            }
            CatchUp::FlatShare {
                target_share,
                gp_rate,
            } => {
                if gp_rate > target_share {
                    let x = (target_share * a - g) / (gp_rate - target_share);
                    let pay = remaining.min(x.max(Decimal::ZERO));
                    to_gp += pay * gp_rate;
                    to_lp += pay - pay * gp_rate;
                    remaining -= pay;
                }
            }
        }
        let catch_up = amount - remaining;

        if remaining > Decimal::ZERO {
            match gp_split {
                Some(split) => {
                    let gp = remaining * split;
                    to_gp += gp;
                    to_lp += remaining - gp;
                }
                None => to_lp += remaining,
            }
        }

        Self {
            catch_up,
            to_gp,
            to_lp,
        }
    }
}

struct Waterfall<'a> {
    cfg: &'a EquityConfig,
    /// Class indices, senior first
    order: Vec<usize>,
    investors: Vec<InvestorState<'a>>,
    classes: Vec<ClassState>,
    gp_promote: Series,
}

impl<'a> Waterfall<'a> {
    fn new(cfg: &'a EquityConfig, periods: usize, warnings: &mut Vec<String>) -> Self {
        let mut order: Vec<usize> = (0..cfg.classes.len()).collect();
        order.sort_by_key(|i| cfg.classes[*i].seniority);

        let mut investors = Vec::with_capacity(cfg.investors.len());
        for inv in &cfg.investors {
            match cfg.classes.iter().position(|c| c.id == inv.class_id) {
                Some(class) => investors.push(InvestorState {
                    input: inv,
                    class,
                    unreturned: Decimal::ZERO,
                    contributed: Decimal::ZERO,
                    calls: vec![Decimal::ZERO; periods],
                    distributions: vec![Decimal::ZERO; periods],
                    return_of_capital: Decimal::ZERO,
                    pref_received: Decimal::ZERO,
                    profit_received: Decimal::ZERO,
                }),
                None => warnings.push(format!(
                    "Investor {} references unknown class {}; ignored",
                    inv.id, inv.class_id
                )),
            }
        }

        let classes = cfg
            .classes
            .iter()
            .map(|_| ClassState {
                unreturned_capital: vec![Decimal::ZERO; periods],
                pref_balance: vec![Decimal::ZERO; periods],
                ..ClassState::default()
            })
            .collect();

        Self {
            cfg,
            order,
            investors,
            classes,
            gp_promote: vec![Decimal::ZERO; periods],
        }
    }

    fn members(&self, class: usize) -> Vec<usize> {
        (0..self.investors.len())
            .filter(|i| self.investors[*i].class == class)
            .collect()
    }

    fn class_unreturned(&self, class: usize) -> Money {
        self.investors
            .iter()
            .filter(|i| i.class == class)
            .map(|i| i.unreturned)
            .sum()
    }

    fn class_contributed(&self, class: usize) -> Money {
        self.investors
            .iter()
            .filter(|i| i.class == class)
            .map(|i| i.contributed)
            .sum()
    }

    fn accrue_pref(&mut self) {
        for class in 0..self.classes.len() {
            let rate = monthly_pref_rate(&self.cfg.classes[class]);
            let mut base = self.class_unreturned(class);
            if self.cfg.classes[class].compounding == PrefCompounding::Compounded {
                base += self.classes[class].pref_accrued;
            }
            self.classes[class].pref_accrued += base * rate;
        }
    }

    fn call(&mut self, t: usize, amount: Money) {
        if amount <= Decimal::ZERO || self.investors.is_empty() {
            return;
        }
        let total_commitment: Money = self.investors.iter().map(|i| i.input.commitment).sum();
        let weights: Vec<Decimal> = self
            .investors
            .iter()
            .map(|i| match i.input.fixed_share {
                Some(share) => share,
                None if total_commitment > Decimal::ZERO => i.input.commitment / total_commitment,
                None => Decimal::ZERO,
            })
            .collect();
        for (inv, share) in self.investors.iter_mut().zip(pro_rata(amount, &weights)) {
            inv.calls[t] += share;
            inv.contributed += share;
            inv.unreturned += share;
        }
    }

    /// Pay `amount` to `recipients` pro-rata by `weight`, returning what was paid.
    fn pay_to(
        &mut self,
        t: usize,
        recipients: &[usize],
        amount: Money,
        weight: impl Fn(&InvestorState<'_>) -> Decimal,
    ) -> Vec<Money> {
        let weights: Vec<Decimal> = recipients.iter().map(|i| weight(&self.investors[*i])).collect();
        let shares = pro_rata(amount, &weights);
        for (i, share) in recipients.iter().zip(&shares) {
            self.investors[*i].pay(t, *share);
        }
        shares
    }

    fn hurdle_irr(&self, class: usize, t: usize) -> Option<Rate> {
        let mut flows = vec![Decimal::ZERO; t + 1];
        let included = self.investors.iter().filter(|inv| match self.cfg.hurdle_basis {
            HurdleBasis::LpIrr => !inv.is_gp(),
            HurdleBasis::ClassIrr => inv.class == class,
        });
        for inv in included {
            for (acc, f) in flows.iter_mut().zip(inv.net_flows(t)) {
                *acc += f;
            }
        }
        annual_irr(&flows)
    }

    fn distribute(&mut self, t: usize, amount: Money) {
        let mut remaining = amount;

        // Return of capital, senior first
        for &class in &self.order.clone() {
            if remaining <= Decimal::ZERO {
                break;
            }
            let pay = remaining.min(self.class_unreturned(class));
            if pay <= Decimal::ZERO {
                continue;
            }
            let members = self.members(class);
            let paid = self.pay_to(t, &members, pay, |i| i.unreturned);
            for (i, p) in members.iter().zip(paid) {
                let inv = &mut self.investors[*i];
                inv.unreturned -= p;
                inv.return_of_capital += p;
            }
            self.classes[class].return_of_capital += pay;
            remaining -= pay;
        }

        // Accrued pref to LPs, senior first
        for &class in &self.order.clone() {
            if remaining <= Decimal::ZERO {
                break;
            }
            let pay = remaining.min(self.classes[class].pref_accrued);
            if pay <= Decimal::ZERO {
                continue;
            }
            let recipients = self.lp_members(class);
            let paid = self.pay_to(t, &recipients, pay, |i| i.contributed);
            for (i, p) in recipients.iter().zip(paid) {
                self.investors[*i].pref_received += p;
            }
            let state = &mut self.classes[class];
            state.pref_accrued -= pay;
            state.pref_paid += pay;
            state.profit_to_date += pay;
            remaining -= pay;
        }

        if remaining <= Decimal::ZERO {
            return;
        }

        // Profit beyond capital and pref: shared across classes by capital
        let class_weights: Vec<Decimal> = {
            let contributed: Vec<Decimal> =
                (0..self.classes.len()).map(|c| self.class_contributed(c)).collect();
            if contributed.iter().any(|c| *c > Decimal::ZERO) {
                contributed
            } else {
                (0..self.classes.len())
                    .map(|c| {
                        self.investors
                            .iter()
                            .filter(|i| i.class == c)
                            .map(|i| i.input.commitment)
                            .sum()
                    })
                    .collect()
            }
        };
        let class_shares = pro_rata(remaining, &class_weights);
        for (class, share) in class_shares.into_iter().enumerate() {
            if share > Decimal::ZERO {
                self.split_profit(t, class, share);
            }
        }
    }

    fn lp_members(&self, class: usize) -> Vec<usize> {
        let lps: Vec<usize> = self
            .members(class)
            .into_iter()
            .filter(|i| !self.investors[*i].is_gp())
            .collect();
        if lps.is_empty() {
            self.members(class)
        } else {
            lps
        }
    }

    /// Catch-up then promote split on one class's share of profit.
    fn split_profit(&mut self, t: usize, class: usize, amount: Money) {
        let terms = &self.cfg.classes[class];
        let state = &self.classes[class];
        let gp_split = tier_split(&terms.tiers, self.hurdle_irr(class, t));
        let ProfitSplit {
            catch_up,
            mut to_gp,
            mut to_lp,
        } = ProfitSplit::of(
            terms.catch_up,
            state.profit_to_date,
            state.gp_promote_to_date,
            amount,
            gp_split,
        );

        let gp_ids: Vec<usize> = (0..self.investors.len())
            .filter(|i| self.investors[*i].is_gp())
            .collect();
        if gp_ids.is_empty() {
            to_lp += to_gp;
            to_gp = Decimal::ZERO;
        }

        let lps = self.lp_members(class);
        let lp_paid = self.pay_to(t, &lps, to_lp, |i| i.contributed);
        for (i, p) in lps.iter().zip(lp_paid) {
            self.investors[*i].profit_received += p;
        }
        if to_gp > Decimal::ZERO {
            let gp_paid = self.pay_to(t, &gp_ids, to_gp, |i| i.input.commitment);
            for (i, p) in gp_ids.iter().zip(gp_paid) {
                self.investors[*i].profit_received += p;
            }
        }

        self.gp_promote[t] += to_gp;
        let state = &mut self.classes[class];
        state.profit_to_date += amount;
        state.gp_promote_to_date += to_gp;
        state.catch_up_paid += catch_up;
        state.promote_to_gp += to_gp;
        state.promote_to_lp += to_lp;
    }

    fn snapshot(&mut self, t: usize) {
        for class in 0..self.classes.len() {
            let unreturned = self.class_unreturned(class);
            let state = &mut self.classes[class];
            state.unreturned_capital[t] = unreturned;
            state.pref_balance[t] = state.pref_accrued;
        }
    }

    /// GP promote above what the final outcome justifies: the class's whole
    /// profit is re-split once, with the pref already paid as the only prior
    /// profit and the tier chosen by the final hurdle IRR.
    fn clawback(&self, periods: usize) -> Money {
        if periods == 0 {
            return Decimal::ZERO;
        }
        let last = periods - 1;
        (0..self.classes.len())
            .map(|class| {
                let terms = &self.cfg.classes[class];
                let state = &self.classes[class];
                let entitled = ProfitSplit::of(
                    terms.catch_up,
                    state.pref_paid,
                    Decimal::ZERO,
                    state.profit_to_date - state.pref_paid,
                    tier_split(&terms.tiers, self.hurdle_irr(class, last)),
                )
                .to_gp;
                (state.gp_promote_to_date - entitled).max(Decimal::ZERO)
            })
            .sum()
    }
}

fn net_flows_of(
    investors: &[InvestorState<'_>],
    periods: usize,
    include: impl Fn(&InvestorState<'_>) -> bool,
) -> Series {
    let mut flows = vec![Decimal::ZERO; periods];
    for inv in investors.iter().filter(|i| include(i)) {
        for (acc, (d, c)) in flows.iter_mut().zip(inv.distributions.iter().zip(&inv.calls)) {
            *acc += d - c;
        }
    }
    flows
}

fn distributions_of(
    investors: &[InvestorState<'_>],
    periods: usize,
    include: impl Fn(&InvestorState<'_>) -> bool,
) -> Series {
    let mut out = vec![Decimal::ZERO; periods];
    for inv in investors.iter().filter(|i| include(i)) {
        for (acc, d) in out.iter_mut().zip(&inv.distributions) {
            *acc += d;
        }
    }
    out
}

/// Run the monthly equity waterfall.
///
/// `calls` are the shortfalls equity must fund and `distributable` the
/// positive project cash; `quarter_ends` flags calendar quarter closes.
pub fn run_waterfall(
    cfg: &EquityConfig,
    calls: &[Money],
    distributable: &[Money],
    quarter_ends: &[bool],
    warnings: &mut Vec<String>,
) -> EquityWaterfall {
    let periods = calls.len();
    let mut wf = Waterfall::new(cfg, periods, warnings);
    let mut distributions = vec![Decimal::ZERO; periods];
    let mut undistributed = vec![Decimal::ZERO; periods];
    let mut held = Decimal::ZERO;

    for t in 0..periods {
        wf.accrue_pref();
        wf.call(t, calls[t]);

        held += distributable.get(t).copied().unwrap_or(Decimal::ZERO);
        let is_last = t + 1 == periods;
        let pay_now = match cfg.frequency {
            DistributionFrequency::Monthly => true,
            DistributionFrequency::Quarterly => {
                quarter_ends.get(t).copied().unwrap_or(false) || (is_last && cfg.flush_at_horizon)
            }
        };
        if pay_now && held > Decimal::ZERO && !wf.investors.is_empty() {
            wf.distribute(t, held);
            distributions[t] = held;
            held = Decimal::ZERO;
        }
        undistributed[t] = held;
        wf.snapshot(t);
    }

    let clawback = wf.clawback(periods);
    if clawback > Decimal::ZERO {
        log::warn!("GP clawback of {clawback} recorded");
        warnings.push(format!("GP promote exceeds final entitlement; clawback {clawback}"));
    }

    let lp_flows = net_flows_of(&wf.investors, periods, |i| !i.is_gp());
    let gp_flows = net_flows_of(&wf.investors, periods, |i| i.is_gp());
    let total_flows = net_flows_of(&wf.investors, periods, |_| true);
    let lp_distributions = distributions_of(&wf.investors, periods, |i| !i.is_gp());
    let gp_distributions = distributions_of(&wf.investors, periods, |i| i.is_gp());

    let lp_paid_in: Money = wf
        .investors
        .iter()
        .filter(|i| !i.is_gp())
        .map(|i| i.contributed)
        .sum();
    let paid_in: Money = wf.investors.iter().map(|i| i.contributed).sum();
    let metrics = fund_metrics(
        &MetricFlows {
            lp: &lp_flows,
            gp: &gp_flows,
            total: &total_flows,
            lp_paid_in,
            lp_distributed: lp_distributions.iter().sum(),
            paid_in,
            distributed: distributions.iter().sum(),
            residual_value: held,
        },
        warnings,
    );

    let classes = cfg
        .classes
        .iter()
        .zip(&wf.classes)
        .enumerate()
        .map(|(idx, (terms, state))| {
            let flows = net_flows_of(&wf.investors, periods, |i| i.class == idx);
            ClassResult {
                id: terms.id.clone(),
                contributed: wf.class_contributed(idx),
                unreturned_capital: state.unreturned_capital.clone(),
                pref_balance: state.pref_balance.clone(),
                return_of_capital: state.return_of_capital,
                pref_paid: state.pref_paid,
                catch_up_paid: state.catch_up_paid,
                promote_to_lp: state.promote_to_lp,
                promote_to_gp: state.promote_to_gp,
                irr: irr_or_warn(&flows, &format!("Class {}", terms.id), warnings),
            }
        })
        .collect();

    let investors = wf
        .investors
        .iter()
        .map(|inv| {
            let flows: Series = inv
                .distributions
                .iter()
                .zip(&inv.calls)
                .map(|(d, c)| d - c)
                .collect();
            InvestorResult {
                id: inv.input.id.clone(),
                class_id: inv.input.class_id.clone(),
                role: inv.input.role,
                calls: inv.calls.clone(),
                distributions: inv.distributions.clone(),
                contributed: inv.contributed,
                return_of_capital: inv.return_of_capital,
                pref_received: inv.pref_received,
                profit_received: inv.profit_received,
                irr: annual_irr(&flows),
            }
        })
        .collect();

    EquityWaterfall {
        capital_calls: calls.to_vec(),
        distributions,
        lp_distributions,
        gp_distributions,
        gp_promote: wf.gp_promote.clone(),
        undistributed,
        classes,
        investors,
        clawback,
        metrics,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
