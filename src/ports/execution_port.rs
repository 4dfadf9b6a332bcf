//! Order execution port trait.

use crate::domain::error::TraderError;
use crate::domain::position::Side;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub key: String,
    pub side: Side,
    pub price: f64,
    pub shares: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub order_id: String,
    pub filled_price: f64,
}

pub trait ExecutionPort {
    fn submit(&mut self, order: &OrderRequest) -> Result<OrderAck, TraderError>;
}
