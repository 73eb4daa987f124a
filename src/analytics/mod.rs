pub mod performance;

pub use performance::{calculate_deal_stats, configure_performance_routes, DealStats};
