//! Missing market-cap repair.
//!
//! A local linear-interpolation heuristic, not a statistical model: the
//! implied coin count (market cap / price) of the two adjacent days is
//! averaged and multiplied by the gap day's price. It only handles isolated
//! single-day gaps; a gap at either end of the series or a run of
//! consecutive missing days is rejected.

use crate::domain::{Observation, Series};
use crate::error::DataError;
use chrono::NaiveDate;
use tracing::info;

/// Repaired series plus the dates that were filled in.
#[derive(Debug, Clone)]
pub struct Imputed {
    pub series: Series,
    pub imputed_dates: Vec<NaiveDate>,
}

/// Fill every missing market cap from its two neighbours.
///
/// Afterwards the series has no missing market caps.
pub fn impute_market_cap(series: &Series) -> Result<Imputed, DataError> {
    let obs = series.observations();
    let mut repaired: Vec<Observation> = obs.to_vec();
    let mut imputed_dates = Vec::new();

    for (i, current) in obs.iter().enumerate() {
        if current.market_cap.is_some() {
            continue;
        }

        if i == 0 || i + 1 == obs.len() {
            return Err(DataError::ImputationAtBoundary {
                asset: series.asset().to_string(),
                date: current.date,
            });
        }

        // Neighbours come from the original slice so a filled value never
        // feeds the next gap.
        let (before, after) = match (obs[i - 1].coin_count(), obs[i + 1].coin_count()) {
            (Some(b), Some(a)) => (b, a),
            _ => {
                return Err(DataError::ConsecutiveGap {
                    asset: series.asset().to_string(),
                    date: current.date,
                })
            }
        };

        let avg_count = (before + after) / 2.0;
        repaired[i].market_cap = Some(avg_count * current.price);
        imputed_dates.push(current.date);
    }

    if !imputed_dates.is_empty() {
        info!(
            asset = series.asset(),
            count = imputed_dates.len(),
            dates = ?imputed_dates,
            "imputed missing market caps"
        );
    }

    Ok(Imputed {
        series: Series::new(series.asset(), repaired)?,
        imputed_dates,
    })
}
