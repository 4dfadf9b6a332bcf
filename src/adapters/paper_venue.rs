//! Simulated venue that fills every order at its limit price.

use crate::domain::error::TraderError;
use crate::ports::execution_port::{ExecutionPort, OrderAck, OrderRequest};
use tracing::info;

#[derive(Debug, Default)]
pub struct PaperVenue {
    orders: Vec<OrderRequest>,
}

impl PaperVenue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders(&self) -> &[OrderRequest] {
        &self.orders
    }
}

impl ExecutionPort for PaperVenue {
    fn submit(&mut self, order: &OrderRequest) -> Result<OrderAck, TraderError> {
        self.orders.push(order.clone());
        let order_id = format!("paper-{}", self.orders.len());
        info!(
            order_id = %order_id,
            key = %order.key,
            side = %order.side,
            price = order.price,
            shares = order.shares,
            "paper order filled"
        );
        Ok(OrderAck {
            order_id,
            filled_price: order.price,
        })
    }
}
