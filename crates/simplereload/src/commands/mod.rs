//! CLI command implementations.

pub(crate) mod serve;
pub(crate) mod watch;

pub(crate) use serve::ServeArgs;
pub(crate) use watch::WatchArgs;
