//! # tidepool-protocol
//!
//! Wire protocol definitions for the tidepool message broker.
//!
//! The protocol is plain text: every frame is a single UTF-8 line terminated
//! by `\n`. A client sends a command token and then answers the server's
//! prompts one line at a time; the server never reads the next command
//! before it has written the full response to the previous one.
//!
//! ## Exchanges
//!
//! ```text
//! PUBLISH                         CONSUME
//!   < Enter topic name:             < Enter topic name:
//!   > orders                        > orders
//!   < Enter message content:        < urgent
//!   > urgent                        <
//!   < Message published successfully.
//!                                   < END_OF_MESSAGES
//! ```
//!
//! ## Example
//!
//! ```rust
//! use bytes::BytesMut;
//! use tidepool_protocol::{codec, Command, Response};
//!
//! let mut buf = BytesMut::from(&b"PUBLISH\n"[..]);
//! let line = codec::decode_line_from(&mut buf).unwrap().unwrap();
//! assert_eq!(Command::parse(&line), Command::Publish);
//!
//! let mut out = BytesMut::new();
//! Response::TopicPrompt.encode_into(&mut out);
//! assert_eq!(&out[..], b"Enter topic name:\n");
//! ```

pub mod codec;
pub mod command;
pub mod response;

pub use codec::{decode_line_from, encode_line, LineCodec, ProtocolError, MAX_LINE_LENGTH};
pub use command::Command;
pub use response::{Response, END_OF_MESSAGES};
