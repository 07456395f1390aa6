//! Tests for [`CostModel`] pricing.

use sluice::cost::{CostModel, ModelCostRate};

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

#[test]
fn zero_tokens_cost_nothing() {
    let model = CostModel::default();
    for name in ["gpt-4o-mini", "gpt-4", "claude-3-opus", "unknown-model"] {
        assert_eq!(model.cost(0, 0, name), 0.0, "{name}");
    }
}

#[test]
fn cost_is_priced_per_thousand_tokens() {
    let model = CostModel::empty().with_rate("m", ModelCostRate::new(0.5, 1.5));
    assert!(approx_eq(model.cost(1_000, 0, "m"), 0.5));
    assert!(approx_eq(model.cost(0, 1_000, "m"), 1.5));
    assert!(approx_eq(model.cost(2_000, 500, "m"), 1.0 + 0.75));
}

#[test]
fn gpt_4o_mini_default_rate() {
    let model = CostModel::default();
    // 1K in at $0.00015, 1K out at $0.0006
    assert!(approx_eq(model.cost(1_000, 1_000, "gpt-4o-mini"), 0.000_75));
}

#[test]
fn cost_is_monotonic_in_tokens() {
    let model = CostModel::default();
    let mut last = 0.0;
    for tokens in [0u32, 1, 10, 100, 1_000, 10_000, 100_000] {
        let input_only = model.cost(tokens, 0, "gpt-4o");
        let both = model.cost(tokens, tokens, "gpt-4o");
        assert!(input_only >= last, "cost decreased at {tokens}");
        assert!(both >= input_only);
        last = input_only;
    }
}

#[test]
fn unknown_model_costs_zero() {
    let model = CostModel::default();
    assert_eq!(model.rate("mistral-large"), None);
    assert_eq!(model.cost(10_000, 10_000, "mistral-large"), 0.0);
}

#[test]
fn dated_variant_resolves_to_family() {
    let model = CostModel::default();
    assert_eq!(
        model.cost(1_000, 1_000, "gpt-4o-2024-08-06"),
        model.cost(1_000, 1_000, "gpt-4o")
    );
    assert_eq!(
        model.cost(1_000, 1_000, "claude-3-5-sonnet-20241022"),
        model.cost(1_000, 1_000, "claude-3-5-sonnet")
    );
}

#[test]
fn override_replaces_default_rate() {
    let mut model = CostModel::default();
    model.set_rate("gpt-4o-mini", ModelCostRate::new(1.0, 1.0));
    assert!(approx_eq(model.cost(1_000, 1_000, "gpt-4o-mini"), 2.0));
}

#[test]
fn invalid_rates_never_yield_negative_cost() {
    let model = CostModel::empty().with_rate("m", ModelCostRate::new(-3.0, f64::INFINITY));
    assert_eq!(model.cost(5_000, 5_000, "m"), 0.0);
}

#[test]
fn unchecked_rates_never_yield_negative_cost() {
    let literal = ModelCostRate {
        input_per_1k: -2.0,
        output_per_1k: 0.0,
    };
    let parsed: ModelCostRate =
        serde_json::from_str(r#"{"input_per_1k": 1.0, "output_per_1k": -4.0}"#).unwrap();

    let model = CostModel::empty()
        .with_rate("literal", literal)
        .with_rate("parsed", parsed);
    assert_eq!(model.cost(1_000, 0, "literal"), 0.0);
    assert!(approx_eq(model.cost(1_000, 1_000, "parsed"), 1.0));
}
