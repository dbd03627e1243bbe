pub mod detector;
pub mod poller;
pub mod seen_store;
pub mod watch;
