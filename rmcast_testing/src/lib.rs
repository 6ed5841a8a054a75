//! Utilities for exercising [`Transport`](rmcast::Transport)s without real
//! sockets.
//!
//! [`MemoryNetwork`] connects any number of transports in one process and
//! can drop chosen fragments, which makes loss and recovery scenarios
//! deterministic.
//!
//! ```rust
//! use rmcast::{TransportConfig, records::SearchPayload};
//! use rmcast_testing::MemoryNetwork;
//!
//! # async fn example() -> Result<(), rmcast::TransportError> {
//! let network = MemoryNetwork::new();
//! network.set_loss_plan(|header, attempt| header.is_last() && attempt == 1);
//! let transport = network.transport::<SearchPayload>(TransportConfig::default())?;
//! transport.start_receiving()?;
//! # Ok(())
//! # }
//! ```

pub mod logging;
pub mod network;
pub mod payloads;

pub use logging::{LoggerHandle, logger};
pub use network::{MemoryNetwork, MemorySink, MemorySource};
pub use payloads::{bulky_record, small_record};
