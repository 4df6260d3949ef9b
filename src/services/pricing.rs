// src/services/pricing.rs
// Cost calculation for provider usage. All arithmetic is fixed-point
// Decimal; unit counts are tiny fractions of a dollar and binary floats
// drift across many small charges.
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ChatError;

/// USD per million units, (input, output), for every billable model.
pub fn model_rates(model: &str) -> Option<(Decimal, Decimal)> {
    let rates = match model {
        "gpt-4o" => (Decimal::new(25, 1), Decimal::new(10, 0)),
        "o1-mini" => (Decimal::new(3, 0), Decimal::new(12, 0)),
        "o1-preview" => (Decimal::new(15, 0), Decimal::new(60, 0)),
        "gpt-4o-mini" => (Decimal::new(15, 2), Decimal::new(6, 1)),
        "claude-3-haiku-20240307" => (Decimal::new(25, 2), Decimal::new(125, 2)),
        "claude-3-5-sonnet-20240620" => (Decimal::new(3, 0), Decimal::new(15, 0)),
        "meta-llama/Llama-3.2-3B-Instruct-Turbo" => (Decimal::new(6, 2), Decimal::new(6, 2)),
        "meta-llama/Meta-Llama-3-8B-Instruct-Turbo" => (Decimal::new(18, 2), Decimal::new(18, 2)),
        "gemini-1.5-flash" => (Decimal::new(75, 3), Decimal::new(3, 1)),
        _ => return None,
    };
    Some(rates)
}

/// Raw provider cost in USD, rounded to 8 fractional digits. `resold`
/// applies the 30% reseller premium to both rates before conversion.
pub fn compute_ai_cost(
    model: &str,
    input_units: u32,
    output_units: u32,
    resold: bool,
) -> Result<Decimal, ChatError> {
    let (mut input_rate, mut output_rate) =
        model_rates(model).ok_or_else(|| ChatError::UnknownModel(model.to_string()))?;

    if resold {
        let premium = Decimal::new(13, 1);
        input_rate *= premium;
        output_rate *= premium;
    }

    let per_million = Decimal::from(1_000_000u32);
    let input_cost = input_rate * Decimal::from(input_units) / per_million;
    let output_cost = output_rate * Decimal::from(output_units) / per_million;

    Ok((input_cost + output_cost).round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostBreakdown {
    /// What the provider charged us, pre-markup.
    pub ai_cost: Decimal,
    /// What the user is debited: ai_cost * 1.05 * cost_factor.
    pub credits_utilised: Decimal,
}

pub fn bill_completion(
    model: &str,
    input_units: u32,
    output_units: u32,
    resold: bool,
    cost_factor: Decimal,
) -> Result<CostBreakdown, ChatError> {
    let ai_cost = compute_ai_cost(model, input_units, output_units, resold)?;
    let marked_up = ai_cost * Decimal::new(105, 2);
    let credits_utilised =
        (marked_up * cost_factor).round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero);

    Ok(CostBreakdown { ai_cost, credits_utilised })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_cost_gpt_4o_mini() {
        // 1000 in at $0.15/M + 1000 out at $0.60/M = $0.00075
        let cost = compute_ai_cost("gpt-4o-mini", 1000, 1000, false).unwrap();
        assert_eq!(cost, Decimal::new(75, 5));
    }

    #[test]
    fn test_known_cost_o1_preview() {
        // A full million of each: 15 + 60 = 75
        let cost = compute_ai_cost("o1-preview", 1_000_000, 1_000_000, false).unwrap();
        assert_eq!(cost, Decimal::from(75));
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let err = compute_ai_cost("gpt-5", 10, 10, false).unwrap_err();
        assert!(matches!(err, ChatError::UnknownModel(_)));
    }

    #[test]
    fn test_reseller_premium_is_exactly_thirty_percent() {
        let base = compute_ai_cost("gpt-4o-mini", 12_345, 6_789, false).unwrap();
        let resold = compute_ai_cost("gpt-4o-mini", 12_345, 6_789, true).unwrap();
        let expected = (base * Decimal::new(13, 1))
            .round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero);
        assert_eq!(resold, expected);
    }

    #[test]
    fn test_cost_is_monotonic_in_both_unit_counts() {
        let base = compute_ai_cost("claude-3-5-sonnet-20240620", 1000, 1000, false).unwrap();
        let more_input = compute_ai_cost("claude-3-5-sonnet-20240620", 2000, 1000, false).unwrap();
        let more_output = compute_ai_cost("claude-3-5-sonnet-20240620", 1000, 2000, false).unwrap();
        assert!(more_input > base);
        assert!(more_output > base);
    }

    #[test]
    fn test_rounding_to_eight_digits() {
        // 1 input unit of llama 3.2: 0.06 / 1e6 = 0.00000006
        let cost = compute_ai_cost("meta-llama/Llama-3.2-3B-Instruct-Turbo", 1, 0, false).unwrap();
        assert_eq!(cost, Decimal::new(6, 8));
    }

    #[test]
    fn test_credits_apply_markup_and_cost_factor() {
        let bill = bill_completion("gpt-4o-mini", 1000, 1000, false, Decimal::from(1000)).unwrap();
        assert_eq!(bill.ai_cost, Decimal::new(75, 5));
        // 0.00075 * 1.05 * 1000 = 0.7875
        assert_eq!(bill.credits_utilised, Decimal::new(7875, 4));
    }

    #[test]
    fn test_credits_scale_linearly_with_cost_factor() {
        let one = bill_completion("gpt-4o", 5000, 2000, false, Decimal::from(1000)).unwrap();
        let double = bill_completion("gpt-4o", 5000, 2000, false, Decimal::from(2000)).unwrap();
        assert_eq!(double.credits_utilised, one.credits_utilised * Decimal::from(2));
        // the raw cost never moves with the factor
        assert_eq!(double.ai_cost, one.ai_cost);
    }
}
