use crate::ContractError;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Bound for every value that flows between states.
pub trait StateData: Any + Clone + Send + Sync {}

impl<T: Any + Clone + Send + Sync> StateData for T {}

/// Explicit type descriptor carried by nodes, transitions and values.
///
/// Two descriptors are compatible only when they describe the same type.
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
}

impl TypeDescriptor {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, e.g. `alloc::vec::Vec<i64>`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name with module paths removed, e.g. `Vec<i64>`.
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }

    pub fn accepts(&self, other: &TypeDescriptor) -> bool {
        self.id == other.id
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({})", self.name)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

pub(crate) fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for ch in full.chars() {
        match ch {
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push_str(last_path_segment(&segment));
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(last_path_segment(&segment));
    out
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Type-erased value passed between nodes.
///
/// Cloning is cheap; fan-out shares the same allocation.
#[derive(Clone)]
pub struct AnyValue {
    inner: Arc<dyn Any + Send + Sync>,
    ty: TypeDescriptor,
}

impl AnyValue {
    pub fn new<T: StateData>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            ty: TypeDescriptor::of::<T>(),
        }
    }

    pub fn type_descriptor(&self) -> TypeDescriptor {
        self.ty
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Extract the concrete value, cloning only when the allocation is shared.
    pub fn take<T: StateData>(self) -> Result<T, ContractError> {
        let found = self.ty;
        match Arc::downcast::<T>(self.inner) {
            Ok(arc) => Ok(Arc::try_unwrap(arc).unwrap_or_else(|shared| (*shared).clone())),
            Err(_) => Err(ContractError::TypeMismatch {
                expected: TypeDescriptor::of::<T>().short_name(),
                found: found.short_name(),
            }),
        }
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyValue<{}>", self.ty)
    }
}
