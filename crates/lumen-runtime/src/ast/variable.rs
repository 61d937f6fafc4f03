use super::{Type, TypeTag};

/// Role of a [`Variable`] inside a recorded body.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VariableTag {
    Local,
    Shared,
    Buffer,
    Texture,
    Heap,
    Accel,
    ThreadId,
    BlockId,
    DispatchId,
    DispatchSize,
}

impl VariableTag {
    /// Tag a formal argument of type `ty` receives.
    pub fn for_argument(ty: &Type) -> Self {
        match ty.tag() {
            TypeTag::Buffer => Self::Buffer,
            TypeTag::Texture => Self::Texture,
            TypeTag::Heap => Self::Heap,
            TypeTag::Accel => Self::Accel,
            _ => Self::Local,
        }
    }

    #[inline]
    pub const fn is_resource(self) -> bool {
        matches!(self, Self::Buffer | Self::Texture | Self::Heap | Self::Accel)
    }

    #[inline]
    pub const fn is_builtin(self) -> bool {
        matches!(
            self,
            Self::ThreadId | Self::BlockId | Self::DispatchId | Self::DispatchSize
        )
    }
}

/// AST leaf: a typed value with a role and a body-unique id.
///
/// Ids are assigned in declaration order by [`super::FunctionBuilder`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Variable {
    ty: &'static Type,
    uid: u32,
    tag: VariableTag,
}

impl Variable {
    #[inline]
    pub(crate) fn new(ty: &'static Type, uid: u32, tag: VariableTag) -> Self {
        Self { ty, uid, tag }
    }

    #[inline]
    pub fn ty(&self) -> &'static Type {
        self.ty
    }

    #[inline]
    pub fn uid(&self) -> u32 {
        self.uid
    }

    #[inline]
    pub fn tag(&self) -> VariableTag {
        self.tag
    }
}
