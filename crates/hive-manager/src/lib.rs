mod error;
pub use error::{ManagerError, ManagerResult};

mod config;
pub use config::ManagerConfig;

mod connection;
pub use connection::{ConnState, Connection, TEARDOWN_TIMEOUT};

mod cursor;
pub use cursor::TaskCursor;

mod answers;
pub use answers::Answers;

mod dispatch;
pub use dispatch::{Manager, execute};

pub use hive_wire::TaskList;

pub mod prelude {
    pub use crate::{Answers, Manager, ManagerConfig, ManagerError, ManagerResult, TaskList, execute};
}
