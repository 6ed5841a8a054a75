use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode, config, decode_from_slice, encode_to_vec};

use crate::fragment::TypeTag;

/// Wrapper trait for objects carried by the transport.
///
/// Any type deriving [`Encode`] and [`Decode`] automatically implements this
/// trait via a blanket implementation. The default methods serialize and
/// deserialize using bincode's standard configuration.
pub trait Message: Encode + Decode<()> {
    /// Serialize the message into a byte vector.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeError`] if serialization fails.
    fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> { encode_to_vec(self, config::standard()) }

    /// Deserialize a message from a byte slice, returning the message and
    /// the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if deserialization fails.
    fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), DecodeError>
    where
        Self: Sized,
    {
        decode_from_slice(bytes, config::standard())
    }
}

impl<T> Message for T where T: Encode + Decode<()> {}

/// An application object that can be sent through a
/// [`Transport`](crate::transport::Transport).
///
/// The type tag travels with every fragment so receivers can identify and
/// filter objects without sharing runtime type information.
///
/// # Examples
///
/// ```
/// use bincode::{Decode, Encode};
/// use rmcast::{fragment::TypeTag, message::Payload};
///
/// #[derive(Encode, Decode)]
/// struct Ping(u32);
///
/// impl Payload for Ping {
///     fn type_tag(&self) -> TypeTag { TypeTag::from("ping") }
/// }
///
/// assert_eq!(Ping(1).type_tag().as_str(), "ping");
/// ```
pub trait Payload: Message + Send + 'static {
    /// Return the wire identifier of this object's logical type.
    fn type_tag(&self) -> TypeTag;
}
