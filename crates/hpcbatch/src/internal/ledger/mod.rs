pub mod node;
pub mod selection;
pub mod state;
pub mod timeline;

pub use node::{ComputeNode, NodeAllocation, NodeSet, ResourceRequest};
pub use selection::{CoreAllocation, HostSelection};
pub use state::{CommitmentKind, JobCommitment, Ledger, LedgerError};
