//! Foreign-call boundary for auxiliary kinds implemented by an embedded
//! scripting layer.
//!
//! A foreign kind is a single class-like handle answering five operations:
//! `new` and `read` on the class, `copy`, `copyTo` and `store` on an
//! instance. Every call goes through `ForeignProtocol::invoke`, and
//! `ForeignAuxiliary` checks the shape of each reply before handing it to
//! the registry.

use crate::auxiliary::{AuxBlob, AuxiliaryOps};
use crate::error::{AuxError, ForeignError};
use crate::storage::StorageSet;
use core::any::Any;
use core::fmt;
use std::rc::Rc;

/// Opaque handle to an object living on the foreign side.
///
/// Clones share the object. Interior mutability, if any, is the embedding's
/// business.
#[derive(Clone)]
pub struct ForeignObject(Rc<dyn Any>);

impl ForeignObject {
    pub fn new<T: Any>(value: T) -> Self {
        ForeignObject(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// True if both handles refer to the same object.
    pub fn ptr_eq(&self, other: &ForeignObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ForeignObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ForeignObject(..)")
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ForeignOp {
    New,
    Copy,
    CopyTo,
    Store,
    Read,
}

impl ForeignOp {
    /// Method name on the foreign side.
    pub fn method_name(self) -> &'static str {
        match self {
            ForeignOp::New => "new",
            ForeignOp::Copy => "copy",
            ForeignOp::CopyTo => "copyTo",
            ForeignOp::Store => "store",
            ForeignOp::Read => "read",
        }
    }
}

impl fmt::Display for ForeignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// Argument passed across the boundary.
#[derive(Clone, Copy, Debug)]
pub enum ForeignArg<'a> {
    None,
    Instance(&'a ForeignObject),
    Document(&'a StorageSet),
}

/// Value returned across the boundary.
#[derive(Debug)]
pub enum ForeignValue {
    None,
    Instance(ForeignObject),
    Document(StorageSet),
}

impl ForeignValue {
    fn kind(&self) -> &'static str {
        match self {
            ForeignValue::None => "nothing",
            ForeignValue::Instance(_) => "an instance",
            ForeignValue::Document(_) => "a document",
        }
    }
}

/// The embedding boundary. One implementation stands for one foreign class.
///
/// `receiver` is the instance for `Copy`, `CopyTo` and `Store` and `None`
/// for `New` and `Read`. Arguments: `CopyTo` gets the target instance,
/// `Read` gets the stored document, the others get `ForeignArg::None`.
pub trait ForeignProtocol {
    fn invoke(
        &self,
        op: ForeignOp,
        receiver: Option<&ForeignObject>,
        arg: ForeignArg<'_>,
    ) -> Result<ForeignValue, ForeignError>;
}

/// Adapter running a `ForeignProtocol` class as an auxiliary kind. Blobs it
/// produces are `ForeignObject`s.
pub struct ForeignAuxiliary {
    class: Rc<dyn ForeignProtocol>,
}

impl ForeignAuxiliary {
    pub fn new(class: impl ForeignProtocol + 'static) -> Self {
        Self {
            class: Rc::new(class),
        }
    }

    fn call(
        &self,
        op: ForeignOp,
        receiver: Option<&ForeignObject>,
        arg: ForeignArg<'_>,
    ) -> Result<ForeignValue, ForeignError> {
        self.class.invoke(op, receiver, arg)
    }

    fn instance(op: ForeignOp, value: ForeignValue) -> Result<ForeignObject, ForeignError> {
        match value {
            ForeignValue::Instance(obj) => Ok(obj),
            other => Err(ForeignError::BadReturn {
                op,
                expected: "an instance",
                found: other.kind(),
            }),
        }
    }
}

impl Clone for ForeignAuxiliary {
    fn clone(&self) -> Self {
        Self {
            class: Rc::clone(&self.class),
        }
    }
}

fn as_object(blob: &dyn Any) -> Result<&ForeignObject, AuxError> {
    blob.downcast_ref::<ForeignObject>().ok_or(AuxError::TypeMismatch {
        expected: "ForeignObject",
    })
}

impl AuxiliaryOps for ForeignAuxiliary {
    fn new_blob(&self) -> Result<Option<AuxBlob>, AuxError> {
        let value = self.call(ForeignOp::New, None, ForeignArg::None)?;
        let obj = Self::instance(ForeignOp::New, value)?;
        Ok(Some(Box::new(obj)))
    }

    // Dropping the handle releases the foreign reference.
    fn delete(&self, blob: AuxBlob) -> Result<(), AuxError> {
        drop(blob);
        Ok(())
    }

    fn copy(&self, blob: &dyn Any) -> Result<AuxBlob, AuxError> {
        let obj = as_object(blob)?;
        let value = self.call(ForeignOp::Copy, Some(obj), ForeignArg::None)?;
        Ok(Box::new(Self::instance(ForeignOp::Copy, value)?))
    }

    // Whatever copyTo returns is ignored.
    fn copy_into(&self, from: &dyn Any, to: &mut dyn Any) -> Result<(), AuxError> {
        let from = as_object(from)?;
        let to = as_object(to)?;
        self.call(ForeignOp::CopyTo, Some(from), ForeignArg::Instance(to))?;
        Ok(())
    }

    fn store(&self, blob: &dyn Any) -> Result<StorageSet, AuxError> {
        let obj = as_object(blob)?;
        match self.call(ForeignOp::Store, Some(obj), ForeignArg::None)? {
            ForeignValue::Document(set) => Ok(set),
            ForeignValue::None => Ok(StorageSet::new()),
            other => Err(ForeignError::BadReturn {
                op: ForeignOp::Store,
                expected: "a document",
                found: other.kind(),
            }
            .into()),
        }
    }

    fn read(&self, doc: &StorageSet) -> Result<Option<AuxBlob>, AuxError> {
        let value = self.call(ForeignOp::Read, None, ForeignArg::Document(doc))?;
        let obj = Self::instance(ForeignOp::Read, value)?;
        Ok(Some(Box::new(obj)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    // Scripted counter: instances hold a `Cell<i64>`.
    struct Counter {
        calls: Rc<Cell<usize>>,
    }

    impl ForeignProtocol for Counter {
        fn invoke(
            &self,
            op: ForeignOp,
            receiver: Option<&ForeignObject>,
            arg: ForeignArg<'_>,
        ) -> Result<ForeignValue, ForeignError> {
            self.calls.set(self.calls.get() + 1);
            let value = |o: &ForeignObject| o.downcast_ref::<Cell<i64>>().map_or(0, Cell::get);
            match (op, receiver, arg) {
                (ForeignOp::New, None, _) => {
                    Ok(ForeignValue::Instance(ForeignObject::new(Cell::new(0i64))))
                }
                (ForeignOp::Read, None, ForeignArg::Document(doc)) => Ok(ForeignValue::Instance(
                    ForeignObject::new(Cell::new(doc.read_long("n"))),
                )),
                (ForeignOp::Copy, Some(me), _) => {
                    Ok(ForeignValue::Instance(ForeignObject::new(Cell::new(value(me)))))
                }
                (ForeignOp::CopyTo, Some(me), ForeignArg::Instance(to)) => {
                    if let Some(cell) = to.downcast_ref::<Cell<i64>>() {
                        cell.set(value(me));
                    }
                    Ok(ForeignValue::None)
                }
                (ForeignOp::Store, Some(me), _) if value(me) == 0 => Ok(ForeignValue::None),
                (ForeignOp::Store, Some(me), _) => {
                    let mut set = StorageSet::new();
                    set.store_long("n", value(me));
                    Ok(ForeignValue::Document(set))
                }
                (op, ..) => Err(ForeignError::Raised {
                    op,
                    message: "unexpected call shape".into(),
                }),
            }
        }
    }

    fn counter() -> (ForeignAuxiliary, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let aux = ForeignAuxiliary::new(Counter {
            calls: Rc::clone(&calls),
        });
        (aux, calls)
    }

    fn count_of(blob: &dyn Any) -> Option<i64> {
        blob.downcast_ref::<ForeignObject>()?
            .downcast_ref::<Cell<i64>>()
            .map(Cell::get)
    }

    /// Invariant: every operation is routed through a single `invoke`.
    #[test]
    fn operations_route_through_invoke() {
        let (aux, calls) = counter();
        let mut doc = StorageSet::new();
        doc.store_long("n", 7);

        let a = aux.read(&doc).unwrap().unwrap();
        let mut b = aux.new_blob().unwrap().unwrap();
        aux.copy_into(a.as_ref(), b.as_mut()).unwrap();
        let c = aux.copy(b.as_ref()).unwrap();
        let stored = aux.store(c.as_ref()).unwrap();

        assert_eq!(count_of(c.as_ref()), Some(7));
        assert_eq!(stored.read_long("n"), 7);
        assert_eq!(calls.get(), 5);
    }

    /// Invariant: a foreign `store` answering nothing means an empty document.
    #[test]
    fn store_of_nothing_is_empty_document() {
        let (aux, _) = counter();
        let blob = aux.new_blob().unwrap().unwrap();
        assert!(aux.store(blob.as_ref()).unwrap().is_empty());
    }

    /// Invariant: replies of the wrong shape are rejected as bad returns.
    #[test]
    fn wrong_reply_shape_is_rejected() {
        struct Sloppy;
        impl ForeignProtocol for Sloppy {
            fn invoke(
                &self,
                _: ForeignOp,
                _: Option<&ForeignObject>,
                _: ForeignArg<'_>,
            ) -> Result<ForeignValue, ForeignError> {
                Ok(ForeignValue::Document(StorageSet::new()))
            }
        }
        let aux = ForeignAuxiliary::new(Sloppy);
        match aux.new_blob() {
            Err(AuxError::Foreign(ForeignError::BadReturn { op, found, .. })) => {
                assert_eq!(op, ForeignOp::New);
                assert_eq!(found, "a document");
            }
            other => panic!("expected bad return, got {:?}", other.map(|b| b.is_some())),
        }
    }

    /// Invariant: blobs that are not foreign objects are refused.
    #[test]
    fn non_foreign_blob_is_refused() {
        let (aux, calls) = counter();
        let blob: AuxBlob = Box::new(5u8);
        assert!(matches!(aux.copy(blob.as_ref()), Err(AuxError::TypeMismatch { .. })));
        assert_eq!(calls.get(), 0);
    }
}
