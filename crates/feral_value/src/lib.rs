//! Runtime value model for the feral VM: a single [`value::Value`] enum
//! covering every built-in and user-defined type, plus the container,
//! attribute, and cycle-rejection operations layered on top of it.

pub mod cycle;
pub mod func;
pub mod ops;
pub mod struct_def;
pub mod typeid;
pub mod value;

pub use func::{FnBody, FnData, ModuleId, NativeFn, NativeHost};
pub use struct_def::{StructData, StructDefData, StructHandle, StructDefHandle};
pub use typeid::{TypeId, TypeIdAllocator};
pub use value::{IteratorState, MapData, VecData, Value};
