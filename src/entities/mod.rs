pub mod audit_log;
pub mod branch;
pub mod dining_table;
pub mod menu_item;
pub mod modifier;
pub mod order;
pub mod order_item;
pub mod order_item_modifier;
pub mod order_sequence;
pub mod recipe;
pub mod stock_item;
pub mod stock_movement;
