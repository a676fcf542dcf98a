//! Deterministic property-finance formulas
//!
//! Pure functions only. No I/O, no shared state, and no LLM anywhere near
//! this module. All monetary values are plain magnitudes in one currency
//! unit (AED); tenures and durations are in years; rates are annual decimal
//! fractions.

use serde::Serialize;

/// Longest mortgage tenure offered
pub const MAX_TENURE_YEARS: f64 = 25.0;
/// Minimum down payment as a fraction of the property price
pub const MIN_DOWN_PAYMENT_FRACTION: f64 = 0.20;
/// Highest loan-to-value a lender will accept
pub const MAX_LTV: f64 = 0.80;
/// Transfer fee, registration, agency and bank fees as a fraction of price
pub const UPFRONT_COST_FRACTION: f64 = 0.07;
pub const DEFAULT_ANNUAL_RATE: f64 = 0.045;
pub const DEFAULT_STAY_YEARS: f64 = 5.0;
/// Below this stay duration renting wins
pub const RENT_THRESHOLD_YEARS: f64 = 3.0;
/// Above this stay duration buying wins
pub const BUY_THRESHOLD_YEARS: f64 = 5.0;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Monthly instalment for an amortizing loan.
///
/// Returns 0 for a non-positive loan or tenure and for a negative rate. A zero
/// rate degrades to plain linear division.
pub fn emi(loan_amount: f64, annual_rate: f64, tenure_years: f64) -> f64 {
    if !(loan_amount > 0.0) || !(tenure_years > 0.0) || !(annual_rate >= 0.0) {
        return 0.0;
    }

    let months = tenure_years * 12.0;
    if annual_rate == 0.0 {
        return loan_amount / months;
    }

    let monthly_rate = annual_rate / 12.0;
    let growth = (1.0 + monthly_rate).powf(months);
    round2(loan_amount * monthly_rate * growth / (growth - 1.0))
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MortgageInputs {
    pub property_price: f64,
    pub down_payment: Option<f64>,
    pub tenure_years: Option<f64>,
    pub annual_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MortgageBreakdown {
    pub property_price: f64,
    pub down_payment: f64,
    pub loan_amount: f64,
    pub loan_to_value: f64,
    pub upfront_costs: f64,
    pub total_upfront: f64,
    pub monthly_emi: f64,
    pub tenure_years: f64,
    pub annual_rate: f64,
}

/// Resolve defaults, enforce the down payment floor and LTV cap, and price
/// the resulting loan.
pub fn mortgage(inputs: MortgageInputs) -> MortgageBreakdown {
    let price = inputs.property_price.max(0.0);
    let tenure_years = inputs
        .tenure_years
        .unwrap_or(MAX_TENURE_YEARS)
        .min(MAX_TENURE_YEARS);
    let annual_rate = inputs.annual_rate.unwrap_or(DEFAULT_ANNUAL_RATE);

    let minimum_down = price * MIN_DOWN_PAYMENT_FRACTION;
    let mut down_payment = inputs
        .down_payment
        .unwrap_or(minimum_down)
        .max(minimum_down)
        .min(price);

    let mut loan_amount = price - down_payment;
    if price > 0.0 && loan_amount / price > MAX_LTV {
        loan_amount = price * MAX_LTV;
        down_payment = price - loan_amount;
    }

    let loan_to_value = if price > 0.0 { loan_amount / price } else { 0.0 };
    let upfront_costs = price * UPFRONT_COST_FRACTION;

    MortgageBreakdown {
        property_price: round2(price),
        down_payment: round2(down_payment),
        loan_amount: round2(loan_amount),
        loan_to_value: round4(loan_to_value),
        upfront_costs: round2(upfront_costs),
        total_upfront: round2(down_payment + upfront_costs),
        monthly_emi: emi(loan_amount, annual_rate, tenure_years),
        tenure_years,
        annual_rate,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RentOrBuy {
    Rent,
    Buy,
    Neutral,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BuyVsRentInputs {
    pub property_price: f64,
    pub monthly_rent: f64,
    pub down_payment: Option<f64>,
    pub tenure_years: Option<f64>,
    pub stay_years: Option<f64>,
    pub annual_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuyVsRentAnalysis {
    pub mortgage: MortgageBreakdown,
    pub monthly_rent: f64,
    pub stay_years: f64,
    pub total_rent_over_stay: f64,
    pub total_instalments_over_stay: f64,
    pub recommendation: RentOrBuy,
    pub rationale: String,
}

pub fn buy_vs_rent(inputs: BuyVsRentInputs) -> BuyVsRentAnalysis {
    let mortgage = mortgage(MortgageInputs {
        property_price: inputs.property_price,
        down_payment: inputs.down_payment,
        tenure_years: inputs.tenure_years,
        annual_rate: inputs.annual_rate,
    });
    let stay_years = inputs.stay_years.unwrap_or(DEFAULT_STAY_YEARS);
    let stay_months = stay_years.max(0.0) * 12.0;

    let recommendation = if stay_years < RENT_THRESHOLD_YEARS {
        RentOrBuy::Rent
    } else if stay_years > BUY_THRESHOLD_YEARS {
        RentOrBuy::Buy
    } else {
        RentOrBuy::Neutral
    };

    let rationale = match recommendation {
        RentOrBuy::Rent => format!(
            "Staying {} years is too short to recover AED {:.2} in upfront costs; renting at AED {:.2} a month keeps you flexible.",
            stay_years, mortgage.upfront_costs, inputs.monthly_rent
        ),
        RentOrBuy::Buy => format!(
            "Over {} years an EMI of AED {:.2} builds equity while rent of AED {:.2} does not, which outweighs the AED {:.2} in upfront costs.",
            stay_years, mortgage.monthly_emi, inputs.monthly_rent, mortgage.upfront_costs
        ),
        RentOrBuy::Neutral => format!(
            "At {} years it is close: buying means AED {:.2} upfront ({:.2} in costs) and an EMI of AED {:.2}, against rent of AED {:.2} a month.",
            stay_years,
            mortgage.total_upfront,
            mortgage.upfront_costs,
            mortgage.monthly_emi,
            inputs.monthly_rent
        ),
    };

    BuyVsRentAnalysis {
        total_rent_over_stay: round2(inputs.monthly_rent * stay_months),
        total_instalments_over_stay: round2(mortgage.monthly_emi * stay_months),
        monthly_rent: inputs.monthly_rent,
        stay_years,
        recommendation,
        rationale,
        mortgage,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RefinanceDecision {
    #[serde(rename = "refinance")]
    Refinance,
    #[serde(rename = "keep current")]
    KeepCurrent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RefinanceInputs {
    pub current_loan_amount: f64,
    pub current_rate: f64,
    pub remaining_tenure_years: f64,
    pub new_rate: f64,
    pub switching_costs: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefinanceAnalysis {
    pub current_emi: f64,
    pub new_emi: f64,
    pub monthly_savings: f64,
    /// `None` when the new rate never pays back the switching costs
    pub break_even_months: Option<f64>,
    pub break_even: String,
    pub total_savings: f64,
    pub tenure_months: f64,
    pub recommendation: RefinanceDecision,
}

pub fn refinance(inputs: RefinanceInputs) -> RefinanceAnalysis {
    let current_emi = emi(
        inputs.current_loan_amount,
        inputs.current_rate,
        inputs.remaining_tenure_years,
    );
    let new_emi = emi(
        inputs.current_loan_amount,
        inputs.new_rate,
        inputs.remaining_tenure_years,
    );
    let tenure_months = inputs.remaining_tenure_years.max(0.0) * 12.0;
    let monthly_savings = round2(current_emi - new_emi);

    let exact_break_even = (monthly_savings > 0.0)
        .then(|| inputs.switching_costs / monthly_savings)
        .filter(|months| months.is_finite());

    // Decided on the exact ratio; only the reported value is rounded.
    let recommendation = match exact_break_even {
        Some(months) if months < tenure_months => RefinanceDecision::Refinance,
        _ => RefinanceDecision::KeepCurrent,
    };
    let break_even_months = exact_break_even.map(|months| (months * 10.0).round() / 10.0);

    RefinanceAnalysis {
        current_emi: round2(current_emi),
        new_emi: round2(new_emi),
        monthly_savings,
        break_even: match break_even_months {
            Some(months) => format!("{:.1} months", months),
            None => "no break-even".to_string(),
        },
        break_even_months,
        total_savings: round2(monthly_savings * tenure_months - inputs.switching_costs),
        tenure_months,
        recommendation,
    }
}
