mod events;
mod session;
mod store;

pub use events::{EventSink, GroupEvent, NoopSink};
pub use session::SessionContext;
pub use store::GroupStore;
