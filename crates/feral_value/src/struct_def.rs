//! User `struct` type definitions and instances (`spec.md` §3 "StructDef",
//! "Struct").

use std::cell::RefCell;
use std::rc::Rc;

use feral_base::Symbol;
use indexmap::IndexMap;

use crate::typeid::TypeId;
use crate::value::Value;

/// A `struct` type: ordered field names, per-field default values, and a
/// freshly-minted [`TypeId`]. Callable — calling it constructs a
/// [`StructData`] instance (`spec.md` §3 "StructDef ... callable — its
/// call constructs a Struct instance").
#[derive(Debug)]
pub struct StructDefData {
    pub type_id: TypeId,
    pub name: Symbol,
    pub fields: Vec<Symbol>,
    pub defaults: IndexMap<Symbol, Value>,
}

/// One instance of a user struct: an attribute bag tagged with its
/// defining [`StructDefData`]'s type id.
#[derive(Debug)]
pub struct StructData {
    pub type_id: TypeId,
    pub attrs: IndexMap<Symbol, Value>,
}

pub type StructDefHandle = Rc<StructDefData>;
pub type StructHandle = Rc<RefCell<StructData>>;
