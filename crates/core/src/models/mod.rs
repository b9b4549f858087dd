pub mod chart_type;
pub mod period;
pub mod record;
pub mod snapshot;
