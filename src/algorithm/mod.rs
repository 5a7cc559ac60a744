pub mod checksum;
pub mod signature;
pub mod index;
pub mod delta;
pub mod sender;
pub mod receiver;

pub use checksum::{RabinKarp, RollingChecksum, StrongChecksum, WeakSum};
pub use delta::Command;
pub use index::MatchIndex;
pub use receiver::{BasisRead, Receiver};
pub use sender::Sender;
pub use signature::{Generator, Signature, SignatureLoader};
