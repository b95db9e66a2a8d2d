//! A thin wrapper around the `prometheus` crate that provides constructors which register the
//! metric with the default registry as they create it.
//!
//! The `try_create_*` functions return a `Result` rather than panicking on a bad metric name or a
//! double registration. Callers store that `Result` in a `lazy_static` and pass it to the helper
//! functions (`set_gauge`, `start_timer`, etc.) which silently do nothing for an errored metric;
//! a metric definition mistake must never bring down consensus code.

use prometheus::{HistogramOpts, Opts};

pub use prometheus::{Error, Histogram, HistogramTimer, IntCounter, IntGauge};

pub type Result<T> = std::result::Result<T, Error>;

/// Attempts to create an `IntCounter`, returning `Err` if the registry does not accept the counter
/// (potentially due to naming conflict).
pub fn try_create_int_counter(name: &str, help: &str) -> Result<IntCounter> {
    let opts = Opts::new(name, help);
    let counter = IntCounter::with_opts(opts)?;
    prometheus::register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Attempts to create an `IntGauge`, returning `Err` if the registry does not accept the gauge
/// (potentially due to naming conflict).
pub fn try_create_int_gauge(name: &str, help: &str) -> Result<IntGauge> {
    let opts = Opts::new(name, help);
    let gauge = IntGauge::with_opts(opts)?;
    prometheus::register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Attempts to create a `Histogram`, returning `Err` if the registry does not accept the histogram
/// (potentially due to naming conflict).
pub fn try_create_histogram(name: &str, help: &str) -> Result<Histogram> {
    let opts = HistogramOpts::new(name, help);
    let histogram = Histogram::with_opts(opts)?;
    prometheus::register(Box::new(histogram.clone()))?;
    Ok(histogram)
}

/// Starts a timer for the given `Histogram`, stopping when it gets dropped or given to
/// `stop_timer(..)`.
pub fn start_timer(histogram: &Result<Histogram>) -> Option<HistogramTimer> {
    if let Ok(histogram) = histogram {
        Some(histogram.start_timer())
    } else {
        None
    }
}

/// Stops a timer created with `start_timer(..)`.
pub fn stop_timer(timer: Option<HistogramTimer>) {
    if let Some(t) = timer {
        t.observe_duration();
    }
}

pub fn inc_counter(counter: &Result<IntCounter>) {
    if let Ok(counter) = counter {
        counter.inc();
    }
}

pub fn set_gauge(gauge: &Result<IntGauge>, value: i64) {
    if let Ok(gauge) = gauge {
        gauge.set(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errored_metrics_are_inert() {
        // An empty name is rejected by prometheus; the helpers must shrug it off.
        let gauge = try_create_int_gauge("", "");
        assert!(gauge.is_err());
        set_gauge(&gauge, 1);

        let histogram = try_create_histogram("", "");
        assert!(histogram.is_err());
        stop_timer(start_timer(&histogram));
    }

    #[test]
    fn double_registration_is_an_error() {
        let first = try_create_int_counter("dup_counter_total", "help");
        assert!(first.is_ok());
        let second = try_create_int_counter("dup_counter_total", "help");
        assert!(second.is_err());
    }
}
