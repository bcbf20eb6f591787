//! Receives exchange-rate quotes over UDP (or from a recorded file), decodes
//! the 32-byte wire records and pushes each datagram's quotes downstream as
//! one batch.

pub mod data_source;
pub mod processor;
pub mod push;
pub mod wire;

pub use data_source::{FileSource, QuoteSource, UdpSource};
pub use processor::{FeedProcessor, FeedStats};
pub use wire::{decode_datagram, decode_record, encode_record, RECORD_SIZE};
