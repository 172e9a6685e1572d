//! mmbind core library
//!
//! Refcounted index handles, the fixed options layout, and the binary codecs
//! used to drive a minimap2-style alignment engine through a byte-buffer
//! boundary.

pub mod aligner;
pub mod bridge;
pub mod buffer;
pub mod codec;
pub mod error;
pub mod index;
pub mod options;
pub mod runtime;
pub mod types;

// Re-export commonly used types
pub use aligner::Aligner;
pub use bridge::NativeBridge;
#[cfg(feature = "fixture")]
pub use bridge::{Fault, FixtureEngine};
pub use buffer::OwnedBuffer;
pub use error::{Mm2Error, Mm2Result};
pub use index::{IndexHandle, IndexLease};
pub use options::{flags, MapOptions, Preset, EXPECTED_OPTIONS_SIZE};
pub use runtime::Runtime;
pub use types::{Alignment, AlignmentList, Cigar, CigarKind, CigarOp, Strand};

/// Version information for the mmbind core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
