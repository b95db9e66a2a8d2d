use lazy_static::lazy_static;

pub use metrics::{set_gauge, start_timer, stop_timer, Histogram, IntGauge, Result};

lazy_static! {
    /*
     * Epoch processing
     */
    pub static ref PROCESS_EPOCH_TIME: Result<Histogram> = metrics::try_create_histogram(
        "beacon_state_process_epoch_seconds",
        "Time required to run process_epoch",
    );
    pub static ref PROCESS_EPOCH_SUMMARY_TIME: Result<Histogram> = metrics::try_create_histogram(
        "beacon_state_epoch_summary_seconds",
        "Time required for the single-pass validator scan",
    );
    pub static ref PROCESS_REWARDS_AND_PENALTIES_TIME: Result<Histogram> =
        metrics::try_create_histogram(
            "beacon_state_rewards_and_penalties_seconds",
            "Time required to process rewards and penalties",
        );
    pub static ref PROCESS_REGISTRY_UPDATES_TIME: Result<Histogram> =
        metrics::try_create_histogram(
            "beacon_state_registry_updates_seconds",
            "Time required to process registry updates",
        );
    pub static ref PROCESS_SLASHINGS_TIME: Result<Histogram> = metrics::try_create_histogram(
        "beacon_state_slashings_seconds",
        "Time required to process slashings",
    );

    /*
     * Participation
     */
    pub static ref PARTICIPATION_CURRENT_EPOCH_ACTIVE_GWEI_TOTAL: Result<IntGauge> =
        metrics::try_create_int_gauge(
            "beacon_participation_current_epoch_active_gwei_total",
            "Total effective balance (gwei) of all active validators during the current epoch",
        );
    pub static ref PARTICIPATION_PREV_EPOCH_SOURCE_ATTESTING_GWEI_TOTAL: Result<IntGauge> =
        metrics::try_create_int_gauge(
            "beacon_participation_prev_epoch_source_attesting_gwei_total",
            "Total effective balance (gwei) of validators who attested to the source",
        );
    pub static ref PARTICIPATION_PREV_EPOCH_TARGET_ATTESTING_GWEI_TOTAL: Result<IntGauge> =
        metrics::try_create_int_gauge(
            "beacon_participation_prev_epoch_target_attesting_gwei_total",
            "Total effective balance (gwei) of validators who attested to the target",
        );
    pub static ref PARTICIPATION_PREV_EPOCH_HEAD_ATTESTING_GWEI_TOTAL: Result<IntGauge> =
        metrics::try_create_int_gauge(
            "beacon_participation_prev_epoch_head_attesting_gwei_total",
            "Total effective balance (gwei) of validators who attested to the head",
        );
}
