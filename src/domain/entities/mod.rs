pub mod order_status;
pub mod payment_flow;
pub mod role;
pub mod transaction_status;
