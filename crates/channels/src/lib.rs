//! Chat surface plumbing: the adapter seam and reply overflow handling.

pub mod adapter;
pub mod overflow;

pub use adapter::{ChatAdapter, deliver_reply};
pub use overflow::{MAX_VISIBLE_CHARS, PreparedReply, SUMMARY_CHARS, prepare_overflow_text};
