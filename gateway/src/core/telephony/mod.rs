//! Telephony side of the call bridge (Twilio Media Streams).
//!
//! - `messages` - wire types and inbound parsing
//! - `channel` - writer handle over the media stream socket
//! - `rest` - outbound call creation
//! - `twiml` - call-control documents

pub mod channel;
pub mod messages;
pub mod rest;
pub mod twiml;

pub use channel::{InboundFrame, TelephonyChannel, TelephonyRoute};
pub use messages::{
    InboundMessage, MediaFormat, OutboundMessage, StreamStart, TelephonyError, TelephonyEvent,
    parse_inbound,
};
pub use rest::{CallError, CallRequest, TWILIO_API_BASE_URL, TwilioRestClient};
