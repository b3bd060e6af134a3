//! Domain types: observations, bars, returns, dated series, periodicity.

pub mod bar;
pub mod dated;
pub mod observation;
pub mod period;
pub mod returns;

pub use bar::{Bar, BarField, BarSeries};
pub use dated::DatedSeries;
pub use observation::{Observation, Series};
pub use period::Periodicity;
pub use returns::{annualized_series, ReturnRecord};
