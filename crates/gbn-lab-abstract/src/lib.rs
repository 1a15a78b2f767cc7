pub mod checksum;
pub mod config;
pub mod error;
pub mod event;
pub mod frame;
pub mod interface;
pub mod scenario;

pub use checksum::crc8;
pub use config::{ArqConfig, FaultConfig, SimConfig};
pub use error::{ConfigError, ProtocolError};
pub use event::ArqEvent;
pub use frame::{Frame, FrameKind};
pub use interface::{LinkContext, LinkProtocol, LinkStats};
pub use scenario::{ConfigOverride, TestAction, TestAssertion, TestScenario};
