mod broker;
mod fanout;
mod lookup;
mod session;

pub use broker::{BindOutcome, Broker};
pub use fanout::FanOutPlan;
pub use lookup::Lookup;
pub use session::{ConnState, Session, SessionId};
