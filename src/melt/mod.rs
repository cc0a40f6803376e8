//! Record decomposition - split nested lists into child tables
//!
//! A record is melted into one flattened parent row plus rows for a child
//! table per list field, each child row linked back by a foreign key.
//! Decomposition only plans rows; [`PlanWriter`] writes a plan to a store.

pub mod decompose;
pub mod plan;
pub mod writer;

pub use decompose::{record_identity, Decomposer};
pub use plan::{ChildTableBinding, ChildWrite, WritePlan};
pub use writer::{PlanWriter, WriteReport};
