//! Generic plumbing shared by the adapters: status codes, the status-carrying
//! result, owning handles, indexed cursors and the adapter base.

pub mod iter;
pub mod outcome;
pub mod pointer;
pub mod status;
pub mod wrapper;

pub use iter::{Cursor, IndexedSource, Iter, OrderedSource};
pub use outcome::Outcome;
pub use pointer::{ComInterface, ComPtr, TaskAllocator, TaskMem};
pub use status::Status;
pub use wrapper::{Adapter, InterfaceWrapper};
