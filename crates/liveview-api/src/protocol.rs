//! Binary framing for the raw video session.
//!
//! Right after the TLS session opens the client writes five authentication
//! blocks; afterwards it writes a fixed keep-alive frame at regular
//! intervals. Only two fields are substituted (client id, connection id);
//! every other byte is a frozen part of the vendor wire format.

use bytes::Bytes;

use crate::stream::StreamHooks;

/// Keep-alive ping written periodically while streaming.
pub const KEEPALIVE_FRAME: [u8; 33] = [
    0x12, 0x00, 0x00, 0x03, 0xe8, 0x00, 0x00, 0x00, //
    0x18, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, //
    0x00,
];

/// Block 1: leading header.
pub const AUTH_HEADER: [u8; 24] = [
    0x00, 0x00, 0x00, 0x28, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Block 3: second header, ending in the connection-id length marker.
pub const AUTH_CONNECTION_HEADER: [u8; 74] = {
    let mut block = [0u8; 74];
    block[0] = 0x01;
    block[1] = 0x08;
    block[73] = 0x10;
    block
};

/// Block 5: trailer.
pub const AUTH_TRAILER: [u8; 13] = [
    0x00, 0x00, 0x00, 0x01, 0x0a, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Number of blocks in the authentication handshake.
pub const AUTH_FRAME_COUNT: usize = 5;

/// Build the five authentication blocks, in write order.
pub fn auth_frames(connection_id: &str, client_id: u32) -> [Bytes; AUTH_FRAME_COUNT] {
    [
        Bytes::from_static(&AUTH_HEADER),
        Bytes::copy_from_slice(&client_id.to_be_bytes()),
        Bytes::from_static(&AUTH_CONNECTION_HEADER),
        Bytes::copy_from_slice(connection_id.as_bytes()),
        Bytes::from_static(&AUTH_TRAILER),
    ]
}

/// The keep-alive frame as a cheaply clonable buffer.
pub fn keepalive_frame() -> Bytes {
    Bytes::from_static(&KEEPALIVE_FRAME)
}

/// Handshake and keep-alive for one stream connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAuth {
    pub connection_id: String,
    pub client_id: u32,
}

impl SessionAuth {
    pub fn new(connection_id: impl Into<String>, client_id: u32) -> Self {
        Self {
            connection_id: connection_id.into(),
            client_id,
        }
    }
}

impl From<&crate::connection::ConnectionDescriptor> for SessionAuth {
    fn from(desc: &crate::connection::ConnectionDescriptor) -> Self {
        Self::new(desc.connection_id.clone(), desc.client_id)
    }
}

impl StreamHooks for SessionAuth {
    fn handshake(&self) -> Vec<Bytes> {
        auth_frames(&self.connection_id, self.client_id).into()
    }

    fn keepalive(&self) -> Bytes {
        keepalive_frame()
    }
}
