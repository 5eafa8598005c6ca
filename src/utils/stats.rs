use log::debug;
use serde::Serialize;
use statrs::statistics::{
    Data,
    OrderStatistics,
    Statistics,
};

/// Lower and upper quantiles reported for bootstrap confidence intervals.
pub const CI_LOWER: f64 = 0.025;
pub const CI_UPPER: f64 = 0.975;

/// Distribution summary of one statistic across bootstrap iterations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    pub n:       usize,
    pub mean:    f64,
    pub std_dev: f64,
    pub lower:   f64,
    pub median:  f64,
    pub upper:   f64,
}

impl SummaryStats {
    /// Summarizes the given values. Returns `None` for an empty slice.
    ///
    /// `std_dev` is the sample standard deviation and is `NaN` when fewer
    /// than two values are available.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mean = values.iter().mean();
        let std_dev = values.iter().std_dev();
        let mut data = Data::new(values.to_vec());
        let summary = Self {
            n: values.len(),
            mean,
            std_dev,
            lower: data.quantile(CI_LOWER),
            median: data.quantile(0.5),
            upper: data.quantile(CI_UPPER),
        };
        debug!("Summarized {} values: {:?}", values.len(), summary);
        Some(summary)
    }
}
