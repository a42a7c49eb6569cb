//! mudkit: persistence and extension substrate for a multi-user text game
//! server. Hierarchical text documents, a registry that lets independent
//! modules hang typed data off core entities, and the containers both are
//! built on.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a small set of containers and a document layer that the rest of
//!   a server can build on without caring how either is stored.
//! - Layers (leaf to root):
//!   - ArenaList<T>: structural list. A singly linked chain threaded
//!     through a generational slot arena; removals made while cursors are
//!     open leave tombstones that the last cursor to close reclaims.
//!   - List<T>: shared handle over an ArenaList with RAII cursors, so one
//!     handle can remove what another is iterating over.
//!   - HashTable<V>, NearMap<V>, PropertyTable<T>: bucketed tables whose
//!     buckets are ArenaLists.
//!   - StorageSet / StorageSetList: ordered key/value documents on top of
//!     HashTable, with the text codec in `codec`.
//!   - AuxiliaryRegistry: name → kind table driving per-entity
//!     AuxiliaryData maps, with native and foreign kinds behind one
//!     `AuxiliaryOps` interface.
//!
//! Constraints
//! - Single-threaded: nothing here is `Send`/`Sync`-aware; callers impose
//!   their own exclusion.
//! - Stable positions: list positions are generational keys, so a stale
//!   position never resolves to a reused slot.
//! - Lookup misses are `Option`/`bool`, never errors.
//! - Decoding never fails. Malformed lines are logged and skipped; a
//!   truncated stream closes whatever is open.
//!
//! Iteration under mutation
//! - `List` cursors register with the arena on creation and unregister on
//!   drop. While any cursor is open, removal only tombstones the node and
//!   drops the visible length; the node stays linked so a cursor standing
//!   on it can still advance. Compaction runs once, when the count returns
//!   to zero.
//! - Cursors resolve their successor lazily on each `next`, so removals
//!   made between calls are honoured.
//!
//! Documents
//! - Entries carry a sequence number assigned at first insertion; writers
//!   sort by it. Re-storing a key keeps its number.
//! - Blank values (empty string, blank nested set, blank list) are not
//!   written, so "absent" and "explicitly empty" read back the same.
//! - `read_set`/`read_list` file an empty value on a miss and return it;
//!   the other `read_*` accessors return typed defaults.
//!
//! Auxiliary data
//! - The registry is open until `seal`. Late registrations are caught up
//!   per map with `ensure_complete`.
//! - Foreign kinds are reached through `ForeignProtocol::invoke`; replies
//!   are shape-checked before use.
//! - Map-wide operations log a failing kind and carry on with the others.
//!
//! Notes and non-goals
//! - No automatic rehashing; tables are sized at construction and can be
//!   rebucketed with `HashTable::expand`.
//! - No query language, indexes or multi-document transactions.

pub mod arena_list;
pub mod auxiliary;
pub mod codec;
pub mod error;
pub mod foreign;
#[cfg(feature = "bench_internal")]
pub mod hash_table;
#[cfg(not(feature = "bench_internal"))]
mod hash_table;
mod list;
mod list_proptest;
pub mod near_map;
pub mod property_table;
pub mod storage;

// Public surface
pub use arena_list::{ArenaList, InsertError, ListPos};
pub use auxiliary::{
    AuxBlob, AuxOp, AuxState, AuxiliaryData, AuxiliaryDescriptor, AuxiliaryKind, AuxiliaryOps,
    AuxiliaryRegistry, EntityKinds, NativeAuxiliary,
};
pub use codec::{decode, decode_from, encode, encode_to, load, read_file, save, write_file};
pub use error::{AuxError, ForeignError, StorageError};
pub use foreign::{
    ForeignArg, ForeignAuxiliary, ForeignObject, ForeignOp, ForeignProtocol, ForeignValue,
};
pub use hash_table::{HashTable, DEFAULT_BUCKETS};
pub use list::{Cursor, List};
pub use near_map::NearMap;
pub use property_table::{Keyed, PropertyTable};
pub use storage::{StorageData, StorageSet, StorageSetList};
