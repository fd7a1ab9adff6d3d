//! Rendezvous constants shared by both sides of the link.
//!
//! Any two instances of this software find each other by agreeing on a
//! single well-known serial-port-profile service identifier and a fixed
//! service name.  No further negotiation occurs: if these constants do not
//! match on both devices, the connection fails during setup.

use uuid::Uuid;

/// Standard Serial Port Profile (SPP) UUID.  Both devices must use the same
/// value when registering and looking up the service.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805f9b34fb);

/// Service/application name advertised alongside the service record.
pub const SERVICE_NAME: &str = "CubeLink";

/// Default port used by the desktop (TCP) transport as the stand-in for the
/// RFCOMM channel.
pub const SERVICE_PORT: u16 = 47129;

/// Upper bound on one application message.
///
/// The wire has no framing: one transport read must yield one complete
/// message, so messages must be small enough to fit the receive buffer
/// unfragmented.
pub const MAX_MESSAGE_LEN: usize = 1024;
