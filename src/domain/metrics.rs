//! Performance statistics for a finished simulation.

use super::portfolio::EquityPoint;
use super::position::Trade;

const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: i64,
    pub total_trades: usize,
    pub open_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub avg_trade_duration: f64,
}

impl Metrics {
    /// Win/loss statistics use closed trades only; `best_trade` and
    /// `worst_trade` are returns relative to entry notional.
    pub fn compute(initial_cash: f64, equity_curve: &[EquityPoint], trades: &[Trade]) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_cash);

        let total_return = if initial_cash > 0.0 {
            (final_equity - initial_cash) / initial_cash
        } else {
            0.0
        };

        let years = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) => (last.date - first.date).num_days() as f64 / DAYS_PER_YEAR,
            _ => 0.0,
        };
        let annualized_return = if years > 0.0 && total_return.is_finite() && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let periods_per_year = if years > 0.0 {
            (equity_curve.len().saturating_sub(1)) as f64 / years
        } else {
            0.0
        };
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, periods_per_year);

        let stats = TradeStats::from_trades(trades);

        Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades: trades.len(),
            open_trades: trades.len() - stats.closed,
            trades_won: stats.won,
            trades_lost: stats.lost,
            trades_breakeven: stats.breakeven,
            win_rate: ratio(stats.won as f64, stats.closed),
            profit_factor: stats.profit_factor(),
            avg_win: ratio(stats.gross_profit, stats.won),
            avg_loss: ratio(stats.gross_loss, stats.lost),
            best_trade: stats.best.unwrap_or(0.0),
            worst_trade: stats.worst.unwrap_or(0.0),
            avg_trade_duration: ratio(stats.held_days as f64, stats.closed),
        }
    }
}

/// `num / den`, or zero when there is nothing to divide by.
fn ratio(num: f64, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num / den as f64 }
}

/// Tallies over closed trades. Open trades never count toward win/loss.
#[derive(Debug, Default)]
struct TradeStats {
    closed: usize,
    won: usize,
    lost: usize,
    breakeven: usize,
    gross_profit: f64,
    gross_loss: f64,
    best: Option<f64>,
    worst: Option<f64>,
    held_days: i64,
}

impl TradeStats {
    fn from_trades(trades: &[Trade]) -> Self {
        trades
            .iter()
            .filter(|t| t.is_closed())
            .fold(Self::default(), |mut acc, trade| {
                acc.closed += 1;
                match trade.pnl.partial_cmp(&0.0) {
                    Some(std::cmp::Ordering::Greater) => {
                        acc.won += 1;
                        acc.gross_profit += trade.pnl;
                    }
                    Some(std::cmp::Ordering::Less) => {
                        acc.lost += 1;
                        acc.gross_loss -= trade.pnl;
                    }
                    _ => acc.breakeven += 1,
                }
                let ret = trade.return_pct();
                acc.best = Some(acc.best.map_or(ret, |b| b.max(ret)));
                acc.worst = Some(acc.worst.map_or(ret, |w| w.min(ret)));
                acc.held_days += (trade.exit_date - trade.entry_date).num_days();
                acc
            })
    }

    fn profit_factor(&self) -> f64 {
        if self.gross_loss > 0.0 {
            self.gross_profit / self.gross_loss
        } else if self.gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }
}

/// Largest peak-to-trough fall as a fraction of the peak, and the longest
/// run of points spent below a peak.
pub fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    if equity_curve.is_empty() {
        return (0.0, 0);
    }

    let mut peak = equity_curve[0].equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], periods_per_year: f64) -> (f64, f64) {
    if equity_curve.len() < 2 || periods_per_year <= 0.0 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let curr = w[1].equity;
            if prev > 0.0 {
                (curr - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;

    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let scale = periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        (mean / stddev) * scale
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r.powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside.sqrt();

    let sortino = if downside_stddev > 0.0 {
        (mean / downside_stddev) * scale
    } else {
        0.0
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::TradeStatus;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, 1).unwrap() + Duration::days(n)
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .zip(0..)
            .map(|(&equity, n)| EquityPoint { date: day(n), equity })
            .collect()
    }

    /// A closed 10-share trade entered at 50 and held for `held` days.
    fn closed(symbol: &str, exit_price: f64, held: i64) -> Trade {
        Trade {
            symbol: symbol.to_string(),
            quantity: 10.0,
            entry_date: day(0),
            entry_price: 50.0,
            exit_date: day(held),
            exit_price,
            fees: 0.0,
            pnl: (exit_price - 50.0) * 10.0,
            status: TradeStatus::Closed,
        }
    }

    fn run(equity: &[f64], trades: &[Trade]) -> Metrics {
        Metrics::compute(equity[0], &curve(equity), trades)
    }

    #[test]
    fn no_history_yields_zeroes() {
        let m = Metrics::compute(5_000.0, &[], &[]);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.annualized_return, 0.0);
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.best_trade, 0.0);
        assert_eq!(m.profit_factor, 0.0);
    }

    #[test]
    fn total_return_tracks_final_equity() {
        assert_relative_eq!(run(&[8_000.0, 8_400.0], &[]).total_return, 0.05);
        assert_relative_eq!(run(&[8_000.0, 6_000.0], &[]).total_return, -0.25);
    }

    #[test]
    fn doubling_over_two_years_annualizes() {
        let mut values = vec![1_000.0; 731];
        *values.last_mut().unwrap() = 2_000.0;
        let m = run(&values, &[]);
        assert_relative_eq!(m.annualized_return, 2f64.sqrt() - 1.0, epsilon = 1e-3);
    }

    #[test]
    fn trades_are_bucketed_by_pnl_sign() {
        let trades = [
            closed("A.NS", 53.0, 4),
            closed("B.NS", 48.0, 2),
            closed("C.NS", 50.0, 6),
            closed("D.NS", 60.0, 8),
        ];
        let m = run(&[1_000.0, 1_110.0], &trades);

        assert_eq!((m.trades_won, m.trades_lost, m.trades_breakeven), (2, 1, 1));
        assert_relative_eq!(m.win_rate, 0.5);
        assert_relative_eq!(m.avg_win, 65.0);
        assert_relative_eq!(m.avg_loss, 20.0);
        assert_relative_eq!(m.profit_factor, 6.5);
        assert_relative_eq!(m.avg_trade_duration, 5.0);
        assert_relative_eq!(m.best_trade, 0.2);
        assert_relative_eq!(m.worst_trade, -0.04);
    }

    #[test]
    fn open_positions_only_count_toward_totals() {
        let mut open = closed("E.NS", 30.0, 3);
        open.status = TradeStatus::Open;
        let m = run(&[1_000.0, 830.0], &[closed("A.NS", 52.0, 1), open]);

        assert_eq!(m.total_trades, 2);
        assert_eq!(m.open_trades, 1);
        assert_relative_eq!(m.win_rate, 1.0);
        assert!(m.profit_factor.is_infinite());
        assert_relative_eq!(m.worst_trade, 0.04);
    }

    #[test]
    fn drawdown_measures_deepest_fall_and_longest_spell() {
        let (depth, spell) = compute_drawdown(&curve(&[200.0, 250.0, 225.0, 150.0, 240.0, 260.0, 255.0]));
        assert_relative_eq!(depth, 0.4);
        assert_eq!(spell, 3);
    }

    #[test]
    fn steady_growth_has_positive_sharpe_and_no_downside() {
        let values: Vec<f64> = (0..120).map(|i| 1_000.0 * 1.002f64.powi(i)).collect();
        let (sharpe, sortino) = compute_risk_adjusted(&curve(&values), 252.0);
        assert!(sharpe >= 0.0);
        assert_eq!(sortino, 0.0);
    }

    #[test]
    fn choppy_curve_gives_finite_ratios() {
        let (sharpe, sortino) =
            compute_risk_adjusted(&curve(&[100.0, 103.0, 99.0, 104.0, 98.0, 105.0]), 252.0);
        assert!(sharpe.is_finite());
        assert!(sortino.is_finite() && sortino != 0.0);
    }
}
