use snowflake::SnowflakeIdBucket;
use std::sync::{Mutex, PoisonError};

static ID_GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Initialise the snowflake id generator.
///
/// `machine_id` and `node_id` must each be in `0..=31`.
pub fn init(machine_id: i32, node_id: i32) {
    let mut gen = ID_GENERATOR.lock().unwrap_or_else(PoisonError::into_inner);
    *gen = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Generate a new snowflake id in string form.
///
/// Falls back to machine/node `1/1` when [`init`] was never called.
pub fn next_id() -> String {
    let mut gen = ID_GENERATOR.lock().unwrap_or_else(PoisonError::into_inner);
    let bucket = gen.get_or_insert_with(|| SnowflakeIdBucket::new(1, 1));
    bucket.get_id().to_string()
}
