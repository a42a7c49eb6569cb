//! Auxiliary data: per-entity blobs owned by independently registered kinds.
//!
//! A kind is registered once under a name, together with the entity kinds it
//! attaches to. Each entity instance then carries an `AuxiliaryData` map from
//! registered name to that kind's blob, and the registry drives the blob
//! lifecycle (create, copy, store, read, delete) for the whole map at once.
//!
//! Kinds are either native (`NativeAuxiliary<T>`, plain function pointers
//! over a concrete `T`) or foreign (`ForeignAuxiliary`, routed through the
//! scripting boundary). Both implement `AuxiliaryOps`; the registry does not
//! care which one it is talking to.
//!
//! Failure policy: an error from a kind during a map-wide operation is
//! logged and treated as an empty result for that name only. The other names
//! are still processed.

use crate::error::AuxError;
use crate::foreign::{ForeignAuxiliary, ForeignProtocol};
use crate::hash_table::HashTable;
use crate::storage::StorageSet;
use core::any::{type_name, Any};
use core::fmt;

/// Bucket count for the registry's name table.
pub const REGISTRY_BUCKETS: usize = 100;
/// Bucket count for each instance's blob table.
pub const DATA_BUCKETS: usize = 10;

bitflags::bitflags! {
    /// Entity kinds an auxiliary attaches to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntityKinds: u32 {
        const CHARACTER = 1 << 0;
        const ROOM = 1 << 1;
        const OBJECT = 1 << 2;
        const ZONE = 1 << 3;
        const ACCOUNT = 1 << 4;
        const SOCKET = 1 << 5;
    }
}

impl EntityKinds {
    /// Parse a comma- or space-separated list of kind names such as
    /// `"character, room"`. Names are matched case-insensitively; unknown
    /// names are ignored.
    pub fn from_names(list: &str) -> Self {
        list.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|w| !w.is_empty())
            .fold(EntityKinds::empty(), |acc, word| {
                let kind = match word.to_ascii_lowercase().as_str() {
                    "character" | "char" => EntityKinds::CHARACTER,
                    "room" => EntityKinds::ROOM,
                    "object" | "obj" => EntityKinds::OBJECT,
                    "zone" => EntityKinds::ZONE,
                    "account" => EntityKinds::ACCOUNT,
                    "socket" => EntityKinds::SOCKET,
                    _ => EntityKinds::empty(),
                };
                acc | kind
            })
    }
}

/// Lifecycle operation of an auxiliary kind.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AuxOp {
    New,
    Delete,
    Copy,
    CopyInto,
    Store,
    Read,
}

impl fmt::Display for AuxOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuxOp::New => "new",
            AuxOp::Delete => "delete",
            AuxOp::Copy => "copy",
            AuxOp::CopyInto => "copy_into",
            AuxOp::Store => "store",
            AuxOp::Read => "read",
        })
    }
}

/// A per-instance blob. Only the kind that made it knows its concrete type.
pub type AuxBlob = Box<dyn Any>;

/// Capabilities of one auxiliary kind.
///
/// `new_blob` and `read` answer `Ok(None)` when the kind does not provide
/// that operation; the others answer `AuxError::Unsupported`.
pub trait AuxiliaryOps {
    fn new_blob(&self) -> Result<Option<AuxBlob>, AuxError>;
    fn delete(&self, blob: AuxBlob) -> Result<(), AuxError>;
    fn copy(&self, blob: &dyn Any) -> Result<AuxBlob, AuxError>;
    fn copy_into(&self, from: &dyn Any, to: &mut dyn Any) -> Result<(), AuxError>;
    fn store(&self, blob: &dyn Any) -> Result<StorageSet, AuxError>;
    fn read(&self, doc: &StorageSet) -> Result<Option<AuxBlob>, AuxError>;
}

/// Native kind over a concrete blob type `T`.
pub struct NativeAuxiliary<T> {
    new: Option<fn() -> T>,
    delete: Option<fn(T)>,
    copy: Option<fn(&T) -> T>,
    copy_into: Option<fn(&T, &mut T)>,
    store: Option<fn(&T) -> StorageSet>,
    read: Option<fn(&StorageSet) -> T>,
}

impl<T: 'static> NativeAuxiliary<T> {
    pub fn new(new: fn() -> T) -> Self {
        Self {
            new: Some(new),
            ..Self::without_new()
        }
    }

    /// A kind whose blobs only come from `read` or `copy`.
    pub fn without_new() -> Self {
        Self {
            new: None,
            delete: None,
            copy: None,
            copy_into: None,
            store: None,
            read: None,
        }
    }

    /// Runs on the blob before it is dropped.
    pub fn with_delete(mut self, f: fn(T)) -> Self {
        self.delete = Some(f);
        self
    }

    pub fn with_copy(mut self, f: fn(&T) -> T) -> Self {
        self.copy = Some(f);
        self
    }

    pub fn with_copy_into(mut self, f: fn(&T, &mut T)) -> Self {
        self.copy_into = Some(f);
        self
    }

    pub fn with_store(mut self, f: fn(&T) -> StorageSet) -> Self {
        self.store = Some(f);
        self
    }

    pub fn with_read(mut self, f: fn(&StorageSet) -> T) -> Self {
        self.read = Some(f);
        self
    }

    fn downcast(blob: &dyn Any) -> Result<&T, AuxError> {
        blob.downcast_ref::<T>().ok_or(AuxError::TypeMismatch {
            expected: type_name::<T>(),
        })
    }
}

impl<T: Clone + 'static> NativeAuxiliary<T> {
    /// Kind whose `copy` and `copy_into` come from `Clone`.
    pub fn cloneable(new: fn() -> T) -> Self {
        Self::new(new)
            .with_copy(T::clone)
            .with_copy_into(|from, to| to.clone_from(from))
    }
}

impl<T: 'static> AuxiliaryOps for NativeAuxiliary<T> {
    fn new_blob(&self) -> Result<Option<AuxBlob>, AuxError> {
        Ok(self.new.map(|f| Box::new(f()) as AuxBlob))
    }

    fn delete(&self, blob: AuxBlob) -> Result<(), AuxError> {
        let blob = blob.downcast::<T>().map_err(|_| AuxError::TypeMismatch {
            expected: type_name::<T>(),
        })?;
        if let Some(f) = self.delete {
            f(*blob);
        }
        Ok(())
    }

    fn copy(&self, blob: &dyn Any) -> Result<AuxBlob, AuxError> {
        let f = self.copy.ok_or(AuxError::Unsupported(AuxOp::Copy))?;
        Ok(Box::new(f(Self::downcast(blob)?)))
    }

    fn copy_into(&self, from: &dyn Any, to: &mut dyn Any) -> Result<(), AuxError> {
        let f = self.copy_into.ok_or(AuxError::Unsupported(AuxOp::CopyInto))?;
        let from = Self::downcast(from)?;
        let to = to.downcast_mut::<T>().ok_or(AuxError::TypeMismatch {
            expected: type_name::<T>(),
        })?;
        f(from, to);
        Ok(())
    }

    fn store(&self, blob: &dyn Any) -> Result<StorageSet, AuxError> {
        let f = self.store.ok_or(AuxError::Unsupported(AuxOp::Store))?;
        Ok(f(Self::downcast(blob)?))
    }

    fn read(&self, doc: &StorageSet) -> Result<Option<AuxBlob>, AuxError> {
        Ok(self.read.map(|f| Box::new(f(doc)) as AuxBlob))
    }
}

/// How a registered kind is implemented.
pub enum AuxiliaryKind {
    Native(Box<dyn AuxiliaryOps>),
    Foreign(ForeignAuxiliary),
}

impl AuxiliaryKind {
    pub fn native<T: 'static>(ops: NativeAuxiliary<T>) -> Self {
        AuxiliaryKind::Native(Box::new(ops))
    }

    pub fn foreign(class: impl ForeignProtocol + 'static) -> Self {
        AuxiliaryKind::Foreign(ForeignAuxiliary::new(class))
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self, AuxiliaryKind::Foreign(_))
    }

    pub fn ops(&self) -> &dyn AuxiliaryOps {
        match self {
            AuxiliaryKind::Native(ops) => ops.as_ref(),
            AuxiliaryKind::Foreign(ops) => ops,
        }
    }
}

impl fmt::Debug for AuxiliaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_foreign() { "Foreign" } else { "Native" })
    }
}

/// A registered kind and the entity kinds it attaches to.
#[derive(Debug)]
pub struct AuxiliaryDescriptor {
    targets: EntityKinds,
    kind: AuxiliaryKind,
}

impl AuxiliaryDescriptor {
    pub fn targets(&self) -> EntityKinds {
        self.targets
    }

    pub fn kind(&self) -> &AuxiliaryKind {
        &self.kind
    }

    pub fn is_foreign(&self) -> bool {
        self.kind.is_foreign()
    }

    fn ops(&self) -> &dyn AuxiliaryOps {
        self.kind.ops()
    }

    fn applies_to(&self, targets: EntityKinds) -> bool {
        self.targets.intersects(targets)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AuxState {
    /// Some registered names may not have a blob yet.
    Created,
    /// Every name registered for the map's targets had its blob created.
    Complete,
}

/// The auxiliary blobs of one entity instance.
pub struct AuxiliaryData {
    blobs: HashTable<AuxBlob>,
    targets: EntityKinds,
    state: AuxState,
}

impl AuxiliaryData {
    /// Empty map for an entity of the given kinds. Blobs appear on
    /// `AuxiliaryRegistry::ensure_complete` or `fetch`.
    pub fn new(targets: EntityKinds) -> Self {
        Self {
            blobs: HashTable::with_buckets(DATA_BUCKETS),
            targets,
            state: AuxState::Created,
        }
    }

    pub fn targets(&self) -> EntityKinds {
        self.targets
    }

    pub fn state(&self) -> AuxState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blobs.contains(name)
    }

    /// Names with a blob, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.blobs.keys().collect();
        names.sort_unstable();
        names
    }

    /// Blob under `name`, if present and of type `T`.
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.blobs.get(name)?.downcast_ref()
    }

    pub fn get_mut<T: 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.blobs.get_mut(name)?.downcast_mut()
    }
}

impl fmt::Debug for AuxiliaryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuxiliaryData")
            .field("targets", &self.targets)
            .field("state", &self.state)
            .field("names", &self.names())
            .finish()
    }
}

fn log_failure(name: &str, op: AuxOp, error: &AuxError) {
    tracing::warn!(name, %op, %error, "auxiliary operation failed");
}

/// Name → kind table driving every `AuxiliaryData` map.
///
/// The registry starts open. `seal` makes the set of names final; until
/// then kinds may be added late and existing maps caught up with
/// `ensure_complete`.
pub struct AuxiliaryRegistry {
    descriptors: HashTable<AuxiliaryDescriptor>,
    sealed: bool,
}

impl Default for AuxiliaryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AuxiliaryRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: HashTable::with_buckets(REGISTRY_BUCKETS),
            sealed: false,
        }
    }

    /// Register `kind` under `name`. A name already taken is refused; it must
    /// be unregistered first.
    pub fn register(
        &mut self,
        name: &str,
        targets: EntityKinds,
        kind: AuxiliaryKind,
    ) -> Result<(), AuxError> {
        if self.sealed {
            tracing::warn!(name, "registration refused: registry is sealed");
            return Err(AuxError::Sealed);
        }
        if self.descriptors.contains(name) {
            tracing::warn!(name, "registration refused: name already registered");
            return Err(AuxError::DuplicateName(name.to_owned()));
        }
        tracing::debug!(name, ?targets, foreign = kind.is_foreign(), "registered auxiliary");
        self.descriptors.put(name, AuxiliaryDescriptor { targets, kind });
        Ok(())
    }

    /// Remove `name`, returning its descriptor. Blobs of that kind already in
    /// maps are left alone.
    pub fn unregister(&mut self, name: &str) -> Result<AuxiliaryDescriptor, AuxError> {
        if self.sealed {
            return Err(AuxError::Sealed);
        }
        let desc = self
            .descriptors
            .remove(name)
            .ok_or_else(|| AuxError::UnknownName(name.to_owned()))?;
        tracing::debug!(name, "unregistered auxiliary");
        Ok(desc)
    }

    /// Freeze the set of registered names.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn get(&self, name: &str) -> Option<&AuxiliaryDescriptor> {
        self.descriptors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains(name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.descriptors.keys().collect();
        names.sort_unstable();
        names
    }

    fn matching(
        &self,
        targets: EntityKinds,
    ) -> impl Iterator<Item = (&str, &AuxiliaryDescriptor)> + '_ {
        self.descriptors.iter().filter(move |(_, d)| d.applies_to(targets))
    }

    /// New map for an entity of kinds `targets`, with a fresh blob from every
    /// kind that attaches to them.
    pub fn instantiate(&self, targets: EntityKinds) -> AuxiliaryData {
        let mut data = AuxiliaryData::new(targets);
        self.ensure_complete(&mut data);
        tracing::debug!(?targets, blobs = data.len(), "instantiated auxiliary data");
        data
    }

    /// Create blobs for every matching name the map does not have yet.
    pub fn ensure_complete(&self, data: &mut AuxiliaryData) {
        for (name, desc) in self.matching(data.targets) {
            if data.blobs.contains(name) {
                continue;
            }
            match desc.ops().new_blob() {
                Ok(Some(blob)) => {
                    data.blobs.put(name, blob);
                }
                Ok(None) => {}
                Err(error) => log_failure(name, AuxOp::New, &error),
            }
        }
        data.state = AuxState::Complete;
    }

    /// Blob under `name`, completing the map first.
    pub fn fetch<'d, T: 'static>(
        &self,
        data: &'d mut AuxiliaryData,
        name: &str,
    ) -> Option<&'d mut T> {
        if data.state != AuxState::Complete {
            self.ensure_complete(data);
        }
        data.get_mut(name)
    }

    /// Hand every blob to its kind's `delete`. Blobs whose kind is no longer
    /// registered are simply dropped.
    pub fn destroy(&self, mut data: AuxiliaryData) {
        self.delete_blobs(&mut data);
    }

    fn delete_blobs(&self, data: &mut AuxiliaryData) {
        for (name, blob) in data.blobs.drain() {
            match self.descriptors.get(&name) {
                Some(desc) => {
                    if let Err(error) = desc.ops().delete(blob) {
                        log_failure(&name, AuxOp::Delete, &error);
                    }
                }
                None => {
                    tracing::debug!(name = name.as_str(), "dropping blob of unregistered auxiliary")
                }
            }
        }
    }

    /// Independent copy of `from`.
    pub fn copy(&self, from: &AuxiliaryData) -> AuxiliaryData {
        let mut to = AuxiliaryData::new(from.targets);
        self.copy_into(from, &mut to);
        to
    }

    /// Replace the contents of `to` with copies of the blobs in `from`.
    /// `to`'s old blobs go through their own `delete` first. A kind that
    /// fails to copy leaves its name absent in `to`.
    pub fn copy_into(&self, from: &AuxiliaryData, to: &mut AuxiliaryData) {
        self.delete_blobs(to);
        for (name, blob) in from.blobs.iter() {
            let Some(desc) = self.descriptors.get(name) else {
                continue;
            };
            match desc.ops().copy(blob.as_ref()) {
                Ok(copy) => {
                    to.blobs.put(name, copy);
                }
                Err(error) => log_failure(name, AuxOp::Copy, &error),
            }
        }
        to.targets = from.targets;
        to.state = from.state;
        tracing::debug!(copied = to.len(), of = from.len(), "copied auxiliary data");
    }

    /// Copy one blob in place through its kind's `copy_into`. If `to` has no
    /// blob under `name` yet, a fresh copy is filed instead.
    pub fn copy_entry_into(
        &self,
        name: &str,
        from: &AuxiliaryData,
        to: &mut AuxiliaryData,
    ) -> Result<(), AuxError> {
        let desc = self
            .descriptors
            .get(name)
            .ok_or_else(|| AuxError::UnknownName(name.to_owned()))?;
        let src = from
            .blobs
            .get(name)
            .ok_or_else(|| AuxError::UnknownName(name.to_owned()))?;
        match to.blobs.get_mut(name) {
            Some(dst) => desc.ops().copy_into(src.as_ref(), dst.as_mut()),
            None => {
                let copy = desc.ops().copy(src.as_ref())?;
                to.blobs.put(name, copy);
                Ok(())
            }
        }
    }

    /// Document holding each blob's stored form under its registered name.
    /// Kinds without `store` are skipped.
    pub fn store(&self, data: &AuxiliaryData) -> StorageSet {
        let mut doc = StorageSet::new();
        for name in data.names() {
            let (Some(desc), Some(blob)) = (self.descriptors.get(name), data.blobs.get(name)) else {
                continue;
            };
            match desc.ops().store(blob.as_ref()) {
                Ok(set) => doc.store_set(name, set),
                Err(AuxError::Unsupported(_)) => {}
                Err(error) => log_failure(name, AuxOp::Store, &error),
            }
        }
        doc
    }

    /// Rebuild a map from `doc`. Each matching kind reads its own nested
    /// document if there is one; otherwise, or if it has no `read`, it
    /// creates a fresh blob.
    pub fn read(&self, doc: &StorageSet, targets: EntityKinds) -> AuxiliaryData {
        let mut data = AuxiliaryData::new(targets);
        for (name, desc) in self.matching(targets) {
            let ops = desc.ops();
            let mut blob = match doc.get_set(name) {
                Some(nested) => ops.read(nested),
                None => Ok(None),
            };
            if matches!(blob, Ok(None)) {
                blob = ops.new_blob();
            }
            match blob {
                Ok(Some(blob)) => {
                    data.blobs.put(name, blob);
                }
                Ok(None) => {}
                Err(error) => log_failure(name, AuxOp::Read, &error),
            }
        }
        data.state = AuxState::Complete;
        tracing::debug!(?targets, blobs = data.len(), "read auxiliary data");
        data
    }
}

impl fmt::Debug for AuxiliaryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuxiliaryRegistry")
            .field("names", &self.names())
            .field("sealed", &self.sealed)
            .finish()
    }
}
