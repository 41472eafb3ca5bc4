//! Stable type identity for registry buckets
//!
//! Buckets are keyed by `TypeId`, so two types that share a short name in
//! different modules never collide. The name is only used for display.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Display name used when the concrete type cannot be named
pub const UNKNOWN_TYPE_NAME: &str = "unknown";

/// Identity of a tracked runtime type
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for a statically known type
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Key for a type known only by its `TypeId`
    #[inline]
    pub fn erased(id: TypeId) -> Self {
        Self {
            id,
            name: UNKNOWN_TYPE_NAME,
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified name as reported by the compiler
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this key carries a real type name
    #[inline]
    pub fn is_named(&self) -> bool {
        self.name != UNKNOWN_TYPE_NAME && !self.name.is_empty()
    }

    /// Name with module paths stripped, used in reports
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// Strip module paths from every path segment of a type name
///
/// `app::ui::Screen<alloc::string::String>` becomes `Screen<String>`.
/// Generic arguments, references, tuples and slices keep their shape.
pub fn short_type_name(full: &str) -> String {
    let full = full.trim();
    if full.is_empty() {
        return UNKNOWN_TYPE_NAME.to_string();
    }

    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();

    for ch in full.chars() {
        match ch {
            '<' | '>' | ',' | '(' | ')' | '[' | ']' | '&' | '*' | ';' | ' ' => {
                out.push_str(last_path_segment(&segment));
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(last_path_segment(&segment));

    if out.is_empty() {
        UNKNOWN_TYPE_NAME.to_string()
    } else {
        out
    }
}

#[inline]
fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}
