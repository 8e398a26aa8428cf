mod pattern;
mod source;
mod watcher;

pub use pattern::{Classification, PathPattern};
pub use source::{EventSource, EventSourceHandle, LocationPoller, NavigationSource};
pub use watcher::{NavigationChange, NavigationWatcher};
