/// USD per million tokens.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub model: &'static str,
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_write: f64,
}

pub const PRICING_TABLE: &[ModelPricing] = &[
    ModelPricing {
        model: "claude-opus-4-1",
        input: 15.0,
        output: 75.0,
        cache_read: 1.5,
        cache_write: 18.75,
    },
    ModelPricing {
        model: "claude-sonnet-4-5",
        input: 3.0,
        output: 15.0,
        cache_read: 0.3,
        cache_write: 3.75,
    },
    ModelPricing {
        model: "claude-haiku-4-5",
        input: 1.0,
        output: 5.0,
        cache_read: 0.1,
        cache_write: 1.25,
    },
];

pub fn pricing_for(model: &str) -> Option<&'static ModelPricing> {
    PRICING_TABLE.iter().find(|entry| entry.model == model)
}

/// Cost of a token report in USD. Unknown models price at zero rather than
/// failing the report.
pub fn calculate_cost(
    model: &str,
    input_tokens: i64,
    output_tokens: i64,
    cache_read_tokens: i64,
    cache_write_tokens: i64,
) -> f64 {
    let Some(pricing) = pricing_for(model) else {
        return 0.0;
    };

    let per_million = |tokens: i64, rate: f64| (tokens as f64 / 1_000_000.0) * rate;
    per_million(input_tokens, pricing.input)
        + per_million(output_tokens, pricing.output)
        + per_million(cache_read_tokens, pricing.cache_read)
        + per_million(cache_write_tokens, pricing.cache_write)
}
