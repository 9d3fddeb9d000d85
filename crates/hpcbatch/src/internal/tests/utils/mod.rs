use std::time::Duration;

#[cfg(test)]
pub mod env;
#[cfg(test)]
pub mod job;

pub fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}

pub fn sorted_vec<T: Ord>(mut vec: Vec<T>) -> Vec<T> {
    vec.sort_unstable();
    vec
}

/// Turns on log output of the crate for the current test, ignored if already enabled.
#[allow(unused)]
#[cfg(test)]
pub fn enable_test_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_module("hpcbatch", log::LevelFilter::Trace)
        .try_init();
}

/// Panics unless the operation failed with an error whose message contains `msg`.
#[cfg(test)]
pub fn expect_error_message<T>(result: crate::Result<T>, msg: &str) {
    let Err(error) = result else {
        panic!("Operation succeeded, expected an error containing `{msg}`");
    };
    let message = error.to_string();
    assert!(
        message.contains(msg),
        "Did not find `{msg}` in `{message}`"
    );
}
