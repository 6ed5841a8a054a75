//! Transport configuration types.
//!
//! [`TransportConfig`] carries the construction parameters of a
//! [`Transport`](crate::transport::Transport): addressing, the role tag of
//! this process and the roles it ignores. [`ProtocolConfig`] bounds buffers,
//! timers and retry budgets. Both are plain structs with public fields,
//! `Default` values and chaining `with_*` helpers.

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    num::NonZeroUsize,
    time::Duration,
};

use thiserror::Error;

use crate::fragment::{HEADER_OVERHEAD_ALLOWANCE, MAX_DATAGRAM_SIZE, OriginTag};

/// Default multicast group shared by all participants.
pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(224, 67, 68, 70);
/// Default UDP port of the multicast group.
pub const DEFAULT_PORT: u16 = 6002;
/// Origin tag used when none is configured.
pub const DEFAULT_ORIGIN: &str = "rmcast";

const fn non_zero(value: usize) -> NonZeroUsize {
    match NonZeroUsize::new(value) {
        Some(value) => value,
        None => NonZeroUsize::MIN,
    }
}

/// Errors returned by [`TransportConfig::validate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The group address is not in the IPv4 multicast range.
    #[error("{0} is not a multicast group address")]
    NotMulticast(Ipv4Addr),
    /// A timer was configured with a zero duration.
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    /// The retry budget was zero.
    #[error("max_retries must be at least 1")]
    ZeroRetries,
    /// No object could be reassembled with a zero fragment limit.
    #[error("max_fragments_per_object must be at least 1")]
    ZeroFragmentLimit,
    /// Fragments of the configured size would not fit in a datagram.
    #[error(
        "fragment_payload_cap={payload_cap} plus header overhead exceeds \
         max_datagram_size={max_datagram_size}"
    )]
    DatagramBudget {
        payload_cap: usize,
        max_datagram_size: usize,
    },
}

/// Buffer, timer and retry bounds of the protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Maximum compressed object bytes carried by one fragment.
    pub fragment_payload_cap: NonZeroUsize,
    /// Number of distinct objects whose fragments are kept for
    /// retransmission. The bound is a count of objects, not of bytes.
    pub retransmit_cache_capacity: NonZeroUsize,
    /// Period of the integrity sweep, also the staleness threshold.
    pub integrity_interval: Duration,
    /// Request rounds sent for a stale object. The sweep after the last
    /// unanswered round abandons it, so an object is dropped on stale sweep
    /// `max_retries + 1`.
    pub max_retries: u32,
    /// How long delivered object ids are remembered to suppress late
    /// duplicates. `None` follows [`completed_linger`](Self::completed_linger()).
    pub completed_linger: Option<Duration>,
    /// Capacity of the Listener to Reassembler queue.
    pub listener_queue_capacity: NonZeroUsize,
    /// Capacity of the queue feeding [`Transport::receive`](crate::transport::Transport::receive).
    pub delivery_queue_capacity: NonZeroUsize,
    /// Capacity of each outbound priority queue.
    pub send_queue_capacity: NonZeroUsize,
    /// Largest datagram read from or written to the socket.
    pub max_datagram_size: usize,
    /// Largest decompressed object accepted from the network.
    pub max_object_size: NonZeroUsize,
    /// Largest fragment count accepted for one object.
    pub max_fragments_per_object: u32,
    /// Multicast time-to-live for outbound datagrams.
    pub multicast_ttl: u32,
    /// Whether outbound datagrams loop back to local listeners.
    pub multicast_loop: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            fragment_payload_cap: non_zero(1024),
            retransmit_cache_capacity: non_zero(2048),
            integrity_interval: Duration::from_secs(5),
            max_retries: 3,
            completed_linger: None,
            listener_queue_capacity: non_zero(4096),
            delivery_queue_capacity: non_zero(1024),
            send_queue_capacity: non_zero(1024),
            max_datagram_size: MAX_DATAGRAM_SIZE,
            max_object_size: non_zero(64 * 1024 * 1024),
            max_fragments_per_object: 65_536,
            multicast_ttl: 1,
            multicast_loop: true,
        }
    }
}

impl ProtocolConfig {
    /// Set the per-fragment payload cap.
    #[must_use]
    pub fn with_fragment_payload_cap(mut self, cap: NonZeroUsize) -> Self {
        self.fragment_payload_cap = cap;
        self
    }

    /// Set how many distinct objects the retransmission cache keeps.
    #[must_use]
    pub fn with_retransmit_cache_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.retransmit_cache_capacity = capacity;
        self
    }

    /// Set the integrity sweep period.
    #[must_use]
    pub fn with_integrity_interval(mut self, interval: Duration) -> Self {
        self.integrity_interval = interval;
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Remember delivered ids for `linger` instead of the derived window.
    #[must_use]
    pub fn with_completed_linger(mut self, linger: Duration) -> Self {
        self.completed_linger = Some(linger);
        self
    }

    /// How long delivered ids are remembered.
    ///
    /// Unless set explicitly this spans every request round of the retry
    /// budget, `integrity_interval * max_retries`, which is 15 s by default.
    #[must_use]
    pub fn completed_linger(&self) -> Duration {
        self.completed_linger
            .unwrap_or_else(|| self.integrity_interval.saturating_mul(self.max_retries))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.integrity_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "integrity_interval",
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if self.completed_linger().is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "completed_linger",
            });
        }
        if self.max_fragments_per_object == 0 {
            return Err(ConfigError::ZeroFragmentLimit);
        }
        let needed = self
            .fragment_payload_cap
            .get()
            .saturating_add(HEADER_OVERHEAD_ALLOWANCE);
        if needed > self.max_datagram_size || self.max_datagram_size > MAX_DATAGRAM_SIZE {
            return Err(ConfigError::DatagramBudget {
                payload_cap: self.fragment_payload_cap.get(),
                max_datagram_size: self.max_datagram_size,
            });
        }
        Ok(())
    }
}

/// Construction parameters of a transport.
///
/// # Examples
///
/// ```
/// use std::net::Ipv4Addr;
/// use rmcast::config::TransportConfig;
///
/// let config = TransportConfig::new(Ipv4Addr::new(239, 1, 2, 3), 7000, "barrel-receiver")
///     .with_ignored_origin("barrel-sync");
/// assert!(config.validate().is_ok());
/// assert!(config.is_ignored(&"barrel-sync".into()));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    /// Local interface used to join the group and to send.
    pub interface: Ipv4Addr,
    /// Multicast group address.
    pub group: Ipv4Addr,
    /// Multicast group port.
    pub port: u16,
    /// Role tag stamped on every outbound fragment.
    pub origin: OriginTag,
    /// Roles whose fragments are discarded on receipt.
    pub ignored_origins: Vec<OriginTag>,
    /// Protocol bounds.
    pub protocol: ProtocolConfig,
}

impl Default for TransportConfig {
    fn default() -> Self { Self::new(DEFAULT_GROUP, DEFAULT_PORT, DEFAULT_ORIGIN) }
}

impl TransportConfig {
    /// Create a configuration for `group:port` with the given role tag.
    #[must_use]
    pub fn new(group: Ipv4Addr, port: u16, origin: impl Into<OriginTag>) -> Self {
        Self {
            interface: Ipv4Addr::UNSPECIFIED,
            group,
            port,
            origin: origin.into(),
            ignored_origins: Vec::new(),
            protocol: ProtocolConfig::default(),
        }
    }

    /// Use `interface` for joining and sending.
    #[must_use]
    pub fn with_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = interface;
        self
    }

    /// Ignore fragments produced by `origin`.
    #[must_use]
    pub fn with_ignored_origin(mut self, origin: impl Into<OriginTag>) -> Self {
        self.ignored_origins.push(origin.into());
        self
    }

    /// Replace the protocol bounds.
    #[must_use]
    pub fn with_protocol(mut self, protocol: ProtocolConfig) -> Self {
        self.protocol = protocol;
        self
    }

    /// Socket address of the multicast group.
    #[must_use]
    pub fn group_addr(&self) -> SocketAddrV4 { SocketAddrV4::new(self.group, self.port) }

    /// Report whether fragments from `origin` are discarded.
    #[must_use]
    pub fn is_ignored(&self, origin: &OriginTag) -> bool { self.ignored_origins.contains(origin) }

    /// Check the configuration for values the protocol cannot operate with.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.group.is_multicast() {
            return Err(ConfigError::NotMulticast(self.group));
        }
        self.protocol.validate()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TransportConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.protocol.fragment_payload_cap.get(), 1024);
        assert_eq!(config.protocol.retransmit_cache_capacity.get(), 2048);
        assert_eq!(config.protocol.max_retries, 3);
        assert_eq!(config.protocol.integrity_interval, Duration::from_secs(5));
    }

    #[test]
    fn unicast_group_is_rejected() {
        let config = TransportConfig::new(Ipv4Addr::new(10, 0, 0, 1), 7000, "x");
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotMulticast(Ipv4Addr::new(10, 0, 0, 1)))
        );
    }

    #[rstest]
    #[case(ProtocolConfig::default().with_integrity_interval(Duration::ZERO))]
    #[case(ProtocolConfig::default().with_completed_linger(Duration::ZERO))]
    #[case(ProtocolConfig::default().with_max_retries(0))]
    #[case(ProtocolConfig::default().with_fragment_payload_cap(non_zero(MAX_DATAGRAM_SIZE)))]
    #[case(ProtocolConfig { max_fragments_per_object: 0, ..ProtocolConfig::default() })]
    fn invalid_protocol_bounds_are_rejected(#[case] protocol: ProtocolConfig) {
        let config = TransportConfig::default().with_protocol(protocol);
        assert!(config.validate().is_err());
    }

    #[test]
    fn completed_linger_follows_the_retry_window() {
        let protocol = ProtocolConfig::default();
        assert_eq!(protocol.completed_linger(), Duration::from_secs(15));

        let protocol = protocol
            .with_max_retries(4)
            .with_integrity_interval(Duration::from_secs(2));
        assert_eq!(protocol.completed_linger(), Duration::from_secs(8));

        let protocol = protocol
            .with_completed_linger(Duration::from_secs(1))
            .with_max_retries(10);
        assert_eq!(protocol.completed_linger(), Duration::from_secs(1));
    }
}
