use std::fmt;

/// How a successful `serve` left the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The full body was transferred and committed.
    Downloaded { bytes: u64 },

    /// A partial record was completed with a range request and committed.
    Resumed { offset: u64, bytes: u64 },

    /// A record that was already complete was revalidated and committed
    /// without transferring the payload again.
    Promoted { bytes: u64 },

    /// The server confirmed the target is current; nothing was written.
    NotModified,
}

impl Outcome {
    /// Payload bytes that crossed the network during this call.
    pub fn transferred(&self) -> u64 {
        match self {
            Outcome::Downloaded { bytes } | Outcome::Resumed { bytes, .. } => *bytes,
            Outcome::Promoted { .. } | Outcome::NotModified => 0,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Downloaded { bytes } => write!(f, "downloaded {bytes} bytes"),
            Outcome::Resumed { offset, bytes } => {
                write!(f, "resumed at byte {offset}, downloaded {bytes} bytes")
            }
            Outcome::Promoted { bytes } => write!(f, "committed {bytes} previously downloaded bytes"),
            Outcome::NotModified => write!(f, "not modified"),
        }
    }
}
