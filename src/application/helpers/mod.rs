pub mod order_info;
