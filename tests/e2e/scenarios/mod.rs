mod crash_recovery;
mod global_sync;
mod lifecycle;
