//! Trade cost and expected-edge evaluation.
//!
//! The edge gate runs after a categorical signal exists: a market only qualifies when the edge
//! from reverting to fair value beats the estimated round-trip friction by `min_net_ev`.

use super::position::Side;

/// Fixed cost assumptions for crossing the book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub fee_rate: f64,
    pub slippage: f64,
    pub min_net_ev: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            fee_rate: 0.002,
            slippage: 0.005,
            min_net_ev: 0.01,
        }
    }
}

/// Mid of the best bid and ask; 0 when either side of the book is missing.
pub fn mid_price(bid: f64, ask: f64) -> f64 {
    if bid <= 0.0 || ask <= 0.0 {
        return 0.0;
    }
    (bid + ask) / 2.0
}

/// Bid/ask spread as a percentage of the mid. An empty book has infinite spread.
pub fn spread_pct(bid: f64, ask: f64) -> f64 {
    let mid = mid_price(bid, ask);
    if mid <= 0.0 {
        return f64::INFINITY;
    }
    (ask - bid) / mid * 100.0
}

/// Fee plus half the spread plus slippage, all as decimals.
pub fn effective_cost(fee: f64, spread_decimal: f64, slippage: f64) -> f64 {
    fee + 0.5 * spread_decimal + slippage
}

pub fn expected_edge(current_price: f64, fair_value: f64, side: Side) -> f64 {
    if fair_value <= 0.0 {
        return 0.0;
    }
    match side {
        Side::Buy => (fair_value - current_price) / fair_value,
        Side::Sell => (current_price - fair_value) / fair_value,
    }
}

pub fn net_ev(expected_edge: f64, effective_cost: f64) -> f64 {
    expected_edge - effective_cost
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeEvaluation {
    pub expected_edge: f64,
    pub effective_cost: f64,
    pub net_ev: f64,
}

impl EdgeEvaluation {
    pub fn evaluate(
        current_price: f64,
        fair_value: f64,
        side: Side,
        spread_pct: f64,
        costs: &CostModel,
    ) -> Self {
        let expected_edge = expected_edge(current_price, fair_value, side);
        let effective_cost = effective_cost(costs.fee_rate, spread_pct / 100.0, costs.slippage);
        EdgeEvaluation {
            expected_edge,
            effective_cost,
            net_ev: net_ev(expected_edge, effective_cost),
        }
    }

    pub fn is_admissible(&self, costs: &CostModel) -> bool {
        self.net_ev >= costs.min_net_ev
    }
}
