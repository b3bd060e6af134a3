//! Pure transformations: imputation, resampling, returns, volatility,
//! alignment, and seasonal bucketing.

pub mod align;
pub mod cycle;
pub mod impute;
pub mod resample;
pub mod returns;
pub mod volatility;

pub use align::{JoinKind, Panel};
pub use cycle::{cycle_buckets, cycle_index, CycleBucket, CycleSpec};
pub use impute::{impute_market_cap, Imputed};
pub use resample::{resample, resample_bars, resample_values, Aggregation, ResampleSpec};
pub use returns::{annualize, bar_returns, daily_returns, log_returns};
pub use volatility::{period_volatility, shift_to_period_start};
