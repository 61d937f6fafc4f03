use core::fmt;
use core::hash::{Hash, Hasher};

/// Structural category of a [`Type`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TypeTag {
    Bool,
    Float,
    Int,
    Uint,
    Vector,
    Matrix,
    Array,
    Structure,
    Buffer,
    Texture,
    Heap,
    Accel,
}

impl TypeTag {
    #[inline]
    pub const fn is_scalar(self) -> bool {
        matches!(self, Self::Bool | Self::Float | Self::Int | Self::Uint)
    }

    #[inline]
    pub const fn is_resource(self) -> bool {
        matches!(self, Self::Buffer | Self::Texture | Self::Heap | Self::Accel)
    }
}

/// Interned structural type.
///
/// A `Type` is created once per distinct description string and lives for the
/// rest of the process. Identity doubles as equality: two `&'static Type` are
/// equal iff they point at the same registry entry.
pub struct Type {
    pub(super) description: String,
    pub(super) tag: TypeTag,
    pub(super) size: usize,
    pub(super) alignment: usize,
    pub(super) dimension: usize,
    pub(super) element: Option<&'static Type>,
    pub(super) members: Vec<&'static Type>,
    pub(super) index: usize,
}

impl Type {
    /// Structural signature, e.g. `vector<float,3>`.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Size in bytes as laid out on the device. Resource types report handle size.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Vector width, matrix order, array length or texture dimension; 1 for scalars.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Element type of vectors, arrays, buffers and textures.
    #[inline]
    pub fn element(&self) -> Option<&'static Type> {
        self.element
    }

    /// Member types of a structure, in declaration order.
    #[inline]
    pub fn members(&self) -> &[&'static Type] {
        &self.members
    }

    /// Position of this type in the registry (registration order).
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.tag.is_scalar()
    }

    #[inline]
    pub fn is_resource(&self) -> bool {
        self.tag.is_resource()
    }
}

impl PartialEq for Type {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self, other)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::ptr::hash(self, state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.description)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}
