//! Instruction prompt for the code generator.
//!
//! The prompt teaches signal script by rules and worked examples. On retries
//! the previous code and its classified error are appended so the model can
//! correct itself.

use crate::domain::classifier::{ClassifiedError, DEFAULT_BENCHMARK_SYMBOL};
use crate::domain::request::{Interval, Period};

/// What the next prompt is told about the attempt that just failed.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFeedback {
    /// The failed attempt's number.
    pub attempt: u32,
    pub previous_code: String,
    pub error: ClassifiedError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptBuilder {
    benchmark_symbol: String,
    period: Period,
    interval: Interval,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_BENCHMARK_SYMBOL)
    }
}

impl PromptBuilder {
    pub fn new(benchmark_symbol: impl Into<String>) -> Self {
        Self {
            benchmark_symbol: benchmark_symbol.into(),
            period: Period::default(),
            interval: Interval::default(),
        }
    }

    /// Period and interval used by the benchmark example.
    pub fn with_data_window(mut self, period: Period, interval: Interval) -> Self {
        self.period = period;
        self.interval = interval;
        self
    }

    pub fn benchmark_symbol(&self) -> &str {
        &self.benchmark_symbol
    }

    pub fn build(&self, strategy: &str, feedback: Option<&RetryFeedback>) -> String {
        let mut prompt = self.base(strategy);
        if let Some(fb) = feedback {
            prompt.push_str("\n# Previous code:\n");
            prompt.push_str(&fb.previous_code);
            prompt.push_str(&format!("\n# Error on attempt {}:\n", fb.attempt));
            prompt.push_str(&fb.error.feedback());
            prompt.push_str("\n# Please correct and output only corrected code.");
        }
        prompt
    }

    fn base(&self, strategy: &str) -> String {
        let benchmark = &self.benchmark_symbol;
        let period = self.period;
        let interval = self.interval;
        format!(
            r#"You are a quantitative developer. Generate ONLY executable signal script code for stock backtesting.

Signal script is a small pandas-like language. One statement per line, `#` starts a comment.
There are no loops, no functions, no imports, and no if statements.

CRITICAL RULES:
1. NEVER use loops (for/while), def, lambda or import - use vectorized table operations only
2. Use .ffill() instead of .fillna(method='ffill')
3. Use .iloc[] for position-based indexing, .loc[] for label-based
4. Avoid .at[] indexing - use boolean masking instead
5. For profit targets/stop losses, use vectorized operations
6. ALWAYS ensure entries and exits have EXACT same shape as close
7. Use standard operators (+ - * /) instead of .div() .mul() on literals

AVAILABLE NAMES:
raw     - the price panel: one column per (symbol, field); fields are Open, High, Low, Close, Volume
table   - table.full(value, index=..., columns=...), table.where(cond, x, y),
          table.maximum(a, b), table.minimum(a, b), table.abs/log/sqrt/exp(x), table.nan
market  - market.download(symbol, period=..., interval=...) for benchmark or extra symbols
abs, min, max, len
Table methods: rolling(n).mean/sum/std/min/max/median, ewm(span=n).mean, shift, diff, pct_change,
where, mask, ffill, bfill, fillna, abs, cumsum, cummax, cummin, reindex, multiply/mul, add, sub, div,
gt, lt, ge, le, eq, ne, astype('bool'), isna, notna, copy, any(axis=1), all(axis=1), clip, round
Properties: index, columns, shape, iloc, loc

DATA STRUCTURE:
Extract closing prices like this:
close = raw.xs('Close', axis=1, level=1)

REQUIREMENTS - Create these 3 variables:
1. close: Price DataFrame
2. entries: Boolean DataFrame (same shape as close)
3. exits: Boolean DataFrame (same shape as close)

SHAPE SAFETY RULES:
# After creating entries/exits, ALWAYS add these lines to ensure correct shape:
entries = entries.reindex(index=close.index, columns=close.columns, fill_value=False)
exits = exits.reindex(index=close.index, columns=close.columns, fill_value=False)

WORKING EXAMPLES:

# Basic pattern - ALWAYS start with this:
close = raw.xs('Close', axis=1, level=1)

# Example 1: Simple MA crossover
sma_short = close.rolling(10).mean()
sma_long = close.rolling(20).mean()
entries = sma_short > sma_long
exits = sma_short < sma_long
# ALWAYS add shape fixing:
entries = entries.reindex(index=close.index, columns=close.columns, fill_value=False)
exits = exits.reindex(index=close.index, columns=close.columns, fill_value=False)

# Example 2: RSI strategy
delta = close.diff()
gain = delta.where(delta > 0, 0).rolling(14).mean()
loss = (-delta.where(delta < 0, 0)).rolling(14).mean()
rsi = 100 - (100 / (1 + gain / loss))
entries = rsi < 30
exits = rsi > 70
# ALWAYS add shape fixing:
entries = entries.reindex(index=close.index, columns=close.columns, fill_value=False)
exits = exits.reindex(index=close.index, columns=close.columns, fill_value=False)

# Example 3: Index filter (benchmark above 200 EMA) - SAFE METHOD
idx_data = market.download('{benchmark}', period='{period}', interval='{interval}')
idx_close = idx_data['Close'].reindex(close.index).ffill()
idx_ema200 = idx_close.ewm(span=200).mean()
bullish_days = idx_close > idx_ema200
# Create base conditions first
ema9 = close.ewm(span=9).mean()
ema21 = close.ewm(span=21).mean()
cross_up = (ema9 > ema21) & (ema9.shift(1) <= ema21.shift(1))
# Apply index filter safely
entries = cross_up.multiply(bullish_days, axis=0)
exits = cross_up.multiply(~bullish_days, axis=0)  # Exit when index turns bearish
# ALWAYS add shape fixing:
entries = entries.reindex(index=close.index, columns=close.columns, fill_value=False)
exits = exits.reindex(index=close.index, columns=close.columns, fill_value=False)

# Example 4: Profit target/Stop loss (VECTORIZED - NO LOOPS!)
# For 5% profit target, 5% stop loss:
entry_price = close.where(entries).ffill()
target_hit = close >= entry_price * 1.05
stop_hit = close <= entry_price * 0.95
exits = target_hit | stop_hit
# ALWAYS add shape fixing:
exits = exits.reindex(index=close.index, columns=close.columns, fill_value=False)

SAFE MASKING:
# To apply a per-date condition (a Series) across every symbol, use .multiply() with axis=0:
entries = condition_dataframe.multiply(index_series, axis=0)

AVOID DANGEROUS INDEXING PATTERNS:
# WRONG - causes KeyError with boolean indexing:
# exit_df.loc[bearish_series, :] = True
# CORRECT - build the table from the series instead:
# exit_df = table.full(True, index=close.index, columns=close.columns).multiply(bearish_series, axis=0)

SYNTAX RULES:
# WRONG - invalid syntax:
# rsi = 100 - 100.div(1 + rs)
# CORRECT - use standard operators:
# rsi = 100 - (100 / (1 + rs))

IMPORTANT: Ensure trades can be closed properly:
# Always include proper exit conditions that will trigger
# For strategies with index filters, make sure exits are not overly restrictive
# Example: If entry requires bullish market, exit should trigger in bearish OR profit/stop conditions

CRITICAL INDEX SYMBOL: Use '{benchmark}' for benchmark index data (NOT other index symbols)

USER STRATEGY: "{strategy}"

Generate ONLY the code (no explanations, no markdown):"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classifier::ErrorClassifier;

    #[test]
    fn base_prompt_states_contract_and_strategy() {
        let prompt = PromptBuilder::default().build("buy the dip", None);
        assert!(prompt.contains("close = raw.xs('Close', axis=1, level=1)"));
        assert!(prompt.contains("entries: Boolean DataFrame (same shape as close)"));
        assert!(prompt.contains("NEVER use loops"));
        assert!(prompt.contains("USER STRATEGY: \"buy the dip\""));
        assert!(prompt.contains("'^CRSLDX'"));
        assert!(!prompt.contains("# Previous code:"));
    }

    #[test]
    fn benchmark_example_uses_data_window() {
        let prompt = PromptBuilder::new("^NSEI")
            .with_data_window(Period::Years(1), Interval::Week)
            .build("x", None);
        assert!(prompt.contains("market.download('^NSEI', period='1y', interval='1wk')"));
    }

    #[test]
    fn retry_appends_code_and_classified_error() {
        let error = ErrorClassifier::default().classify("SyntaxError: invalid syntax (line 2)");
        let feedback = RetryFeedback {
            attempt: 1,
            previous_code: "rsi = 100 - 100.div(1 + rs)".into(),
            error,
        };
        let prompt = PromptBuilder::default().build("rsi", Some(&feedback));
        let tail = prompt.split("Generate ONLY the code").nth(1).unwrap();
        assert!(tail.contains("\n# Previous code:\nrsi = 100 - 100.div(1 + rs)\n# Error on attempt 1:\n"));
        assert!(tail.contains("Syntax error: SyntaxError: invalid syntax (line 2)"));
        assert!(tail.ends_with("# Please correct and output only corrected code."));
    }

    #[test]
    fn build_is_pure() {
        let builder = PromptBuilder::default();
        assert_eq!(builder.build("a", None), builder.build("a", None));
    }
}
