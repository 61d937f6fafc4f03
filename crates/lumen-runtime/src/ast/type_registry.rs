//! Global, append-only registry of structural types.
//!
//! Responsibilities:
//! - parse structural descriptions (`vector<float,3>`, `struct<8,int,float>`, ...)
//! - hand out exactly one `&'static Type` per description, from any thread
//! - cache `Type::of::<T>()` per thread so repeated lookups skip the lock

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::LazyLock;

use parking_lot::Mutex;

use super::{Type, TypeDesc, TypeTag};
use crate::error::{check, Error, Result};

/// Handle size used for resource-typed values.
const HANDLE_SIZE: usize = 8;

/// Registry contents. Entries are never removed.
#[derive(Default)]
pub struct TypeRegistry {
    types: Vec<&'static Type>,
    by_description: HashMap<&'static str, &'static Type>,
}

static REGISTRY: LazyLock<Mutex<TypeRegistry>> = LazyLock::new(Default::default);

thread_local! {
    static OF_CACHE: RefCell<HashMap<TypeId, &'static Type>> = RefCell::new(HashMap::new());
}

impl TypeRegistry {
    /// Number of registered types.
    pub fn len() -> usize {
        REGISTRY.lock().types.len()
    }

    /// Returns the registered type for `description` without creating it.
    pub fn lookup(description: &str) -> Option<&'static Type> {
        REGISTRY.lock().by_description.get(description).copied()
    }

    /// Runs `f` over all registered types while holding the registry lock.
    pub fn with_types<R>(f: impl FnOnce(&[&'static Type]) -> R) -> R {
        f(&REGISTRY.lock().types)
    }

    fn insert(&mut self, mut draft: Type) -> &'static Type {
        if let Some(&existing) = self.by_description.get(draft.description.as_str()) {
            return existing;
        }
        draft.index = self.types.len();
        let ty: &'static Type = Box::leak(Box::new(draft));
        self.types.push(ty);
        self.by_description.insert(ty.description.as_str(), ty);
        log::trace!("registered type #{} `{}`", ty.index, ty.description);
        ty
    }
}

impl Type {
    /// Builds or looks up the type described by `description`.
    ///
    /// The description must match the canonical grammar exactly (no spaces).
    pub fn from(description: &str) -> Result<&'static Type> {
        check(intern(description))
    }

    /// Returns the canonical type for the Rust type `T`.
    ///
    /// The trait bounds only admit well-formed descriptions: resources cannot
    /// nest inside values and arrays cannot be empty. Both are build errors:
    ///
    /// ```compile_fail
    /// use lumen_runtime::{ast::Type, resource::Heap};
    /// Type::of::<[Heap; 2]>();
    /// ```
    ///
    /// ```compile_fail
    /// use lumen_runtime::{ast::Type, resource::Heap};
    /// Type::of::<(Heap, u32)>();
    /// ```
    ///
    /// ```compile_fail
    /// lumen_runtime::ast::Type::of::<[f32; 0]>();
    /// ```
    pub fn of<T: TypeDesc>() -> &'static Type {
        let key = TypeId::of::<T>();
        if let Some(ty) = OF_CACHE.with_borrow(|cache| cache.get(&key).copied()) {
            return ty;
        }
        let ty = intern(&T::description())
            .expect("TypeDesc bounds only admit well-formed descriptions");
        OF_CACHE.with_borrow_mut(|cache| cache.insert(key, ty));
        ty
    }
}

/// Interns a built-in description literal.
pub(crate) fn known(description: &'static str) -> &'static Type {
    intern(description).expect("built-in descriptions are well-formed")
}

/// Registry lookup with parsing on miss. Errors are returned, never raised.
///
/// Children are interned before the parent, each under its own short lock, so
/// the registry lock only ever guards a table mutation.
pub(crate) fn intern(description: &str) -> Result<&'static Type> {
    if let Some(ty) = REGISTRY.lock().by_description.get(description).copied() {
        return Ok(ty);
    }
    let draft = Parser::new(description).parse().map_err(|reason| {
        Error::InvalidTypeDescription {
            description: description.to_string(),
            reason,
        }
    })?;
    Ok(REGISTRY.lock().insert(draft))
}

// ── parsing ───────────────────────────────────────────────────────────────

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

type ParseResult<T> = std::result::Result<T, String>;

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn parse(mut self) -> ParseResult<Type> {
        let ident = self.ident()?;
        let draft = match ident {
            "bool" => scalar(TypeTag::Bool, 1),
            "float" => scalar(TypeTag::Float, 4),
            "int" => scalar(TypeTag::Int, 4),
            "uint" => scalar(TypeTag::Uint, 4),
            "vector" => self.vector()?,
            "matrix" => self.matrix()?,
            "array" => self.array()?,
            "struct" => self.structure()?,
            "buffer" => self.buffer()?,
            "texture" => self.texture()?,
            "heap" => handle_type(TypeTag::Heap, 0, None),
            "accel" => handle_type(TypeTag::Accel, 0, None),
            other => return Err(format!("unknown type name `{other}`")),
        };
        if self.pos != self.src.len() {
            return Err(format!("trailing characters at offset {}", self.pos));
        }
        Ok(Type {
            description: self.src.to_string(),
            ..draft
        })
    }

    fn vector(&mut self) -> ParseResult<Type> {
        self.expect(b'<')?;
        let elem = self.child()?;
        self.expect(b',')?;
        let n = self.number()?;
        self.expect(b'>')?;
        if !elem.is_scalar() {
            return Err(format!("vector element `{elem}` is not a scalar"));
        }
        if !(2..=4).contains(&n) {
            return Err(format!("vector width {n} is not 2, 3 or 4"));
        }
        let size = elem.size * if n == 3 { 4 } else { n };
        Ok(Type {
            tag: TypeTag::Vector,
            size,
            alignment: size,
            dimension: n,
            element: Some(elem),
            ..empty()
        })
    }

    fn matrix(&mut self) -> ParseResult<Type> {
        self.expect(b'<')?;
        let n = self.number()?;
        self.expect(b'>')?;
        if !(2..=4).contains(&n) {
            return Err(format!("matrix order {n} is not 2, 3 or 4"));
        }
        let column = 4 * if n == 3 { 4 } else { n };
        Ok(Type {
            tag: TypeTag::Matrix,
            size: column * n,
            alignment: column,
            dimension: n,
            ..empty()
        })
    }

    fn array(&mut self) -> ParseResult<Type> {
        self.expect(b'<')?;
        let elem = self.child()?;
        self.expect(b',')?;
        let n = self.number()?;
        self.expect(b'>')?;
        if elem.is_resource() {
            return Err(format!("array element `{elem}` is a resource"));
        }
        if n == 0 {
            return Err("array length must be non-zero".to_string());
        }
        Ok(Type {
            tag: TypeTag::Array,
            size: elem.size * n,
            alignment: elem.alignment,
            dimension: n,
            element: Some(elem),
            ..empty()
        })
    }

    fn structure(&mut self) -> ParseResult<Type> {
        self.expect(b'<')?;
        let alignment = self.number()?;
        if !alignment.is_power_of_two() {
            return Err(format!("struct alignment {alignment} is not a power of two"));
        }
        let mut members = Vec::new();
        let mut offset = 0usize;
        while self.peek() == Some(b',') {
            self.pos += 1;
            let member = self.child()?;
            if member.is_resource() {
                return Err(format!("struct member `{member}` is a resource"));
            }
            offset = offset.next_multiple_of(member.alignment) + member.size;
            members.push(member);
        }
        self.expect(b'>')?;
        if members.is_empty() {
            return Err("struct has no members".to_string());
        }
        Ok(Type {
            tag: TypeTag::Structure,
            size: offset.next_multiple_of(alignment),
            alignment,
            dimension: 1,
            members,
            ..empty()
        })
    }

    fn buffer(&mut self) -> ParseResult<Type> {
        self.expect(b'<')?;
        let elem = self.child()?;
        self.expect(b'>')?;
        if elem.is_resource() {
            return Err(format!("buffer element `{elem}` is a resource"));
        }
        Ok(handle_type(TypeTag::Buffer, 1, Some(elem)))
    }

    fn texture(&mut self) -> ParseResult<Type> {
        self.expect(b'<')?;
        let dim = self.number()?;
        self.expect(b',')?;
        let elem = self.child()?;
        self.expect(b'>')?;
        if dim != 2 && dim != 3 {
            return Err(format!("texture dimension {dim} is not 2 or 3"));
        }
        if !matches!(elem.tag, TypeTag::Float | TypeTag::Int | TypeTag::Uint) {
            return Err(format!("texel type `{elem}` is not float, int or uint"));
        }
        Ok(handle_type(TypeTag::Texture, dim, Some(elem)))
    }

    /// Interns the nested type expression starting at the cursor.
    fn child(&mut self) -> ParseResult<&'static Type> {
        let start = self.pos;
        self.ident()?;
        if self.peek() == Some(b'<') {
            let mut depth = 0usize;
            while let Some(c) = self.peek() {
                self.pos += 1;
                match c {
                    b'<' => depth += 1,
                    b'>' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            if depth != 0 {
                return Err("unbalanced angle brackets".to_string());
            }
        }
        let sub = &self.src[start..self.pos];
        intern(sub).map_err(|err| match err {
            Error::InvalidTypeDescription { reason, .. } => format!("in `{sub}`: {reason}"),
            other => other.to_string(),
        })
    }

    fn ident(&mut self) -> ParseResult<&'a str> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_lowercase() || c == b'_') {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(format!("expected a type name at offset {start}"));
        }
        Ok(&self.src[start..self.pos])
    }

    fn number(&mut self) -> ParseResult<usize> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.src[start..self.pos]
            .parse()
            .map_err(|_| format!("expected a number at offset {start}"))
    }

    fn expect(&mut self, c: u8) -> ParseResult<()> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected `{}` at offset {}", c as char, self.pos))
        }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }
}

fn empty() -> Type {
    Type {
        description: String::new(),
        tag: TypeTag::Bool,
        size: 0,
        alignment: 0,
        dimension: 0,
        element: None,
        members: Vec::new(),
        index: 0,
    }
}

fn scalar(tag: TypeTag, size: usize) -> Type {
    Type {
        tag,
        size,
        alignment: size,
        dimension: 1,
        ..empty()
    }
}

fn handle_type(tag: TypeTag, dimension: usize, element: Option<&'static Type>) -> Type {
    Type {
        tag,
        size: HANDLE_SIZE,
        alignment: HANDLE_SIZE,
        dimension,
        element,
        ..empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use super::*;
    use crate::error::{set_error_policy, ErrorPolicy};

    #[test]
    fn same_description_same_identity() {
        let a = Type::from("vector<float,3>").unwrap();
        let b = Type::from("vector<float,3>").unwrap();
        assert!(core::ptr::eq(a, b));
        assert_eq!(a, Type::of::<glam::Vec3A>());
    }

    #[test]
    fn different_shapes_never_share_identity() {
        let v3 = Type::from("vector<float,3>").unwrap();
        let v4 = Type::from("vector<float,4>").unwrap();
        let s = Type::from("struct<16,float,float,float>").unwrap();
        assert_ne!(v3, v4);
        assert_ne!(v3, s);
        assert_ne!(v4, s);
    }

    #[test]
    fn layouts_follow_device_rules() {
        let v3 = Type::from("vector<float,3>").unwrap();
        assert_eq!((v3.size(), v3.alignment(), v3.dimension()), (16, 16, 3));

        let b3 = Type::from("vector<bool,3>").unwrap();
        assert_eq!((b3.size(), b3.alignment()), (4, 4));

        let m3 = Type::from("matrix<3>").unwrap();
        assert_eq!((m3.size(), m3.alignment()), (48, 16));

        let arr = Type::from("array<int,5>").unwrap();
        assert_eq!((arr.size(), arr.alignment()), (20, 4));
        assert_eq!(arr.element(), Some(Type::of::<i32>()));

        let s = Type::from("struct<8,int,vector<float,2>,bool>").unwrap();
        assert_eq!(s.members().len(), 3);
        assert_eq!(s.size(), 24);
    }

    #[test]
    fn nested_types_are_registered_too() {
        let buf = Type::from("buffer<array<vector<uint,2>,7>>").unwrap();
        assert_eq!(buf.tag(), TypeTag::Buffer);
        let elem = buf.element().unwrap();
        assert_eq!(Some(elem), TypeRegistry::lookup("array<vector<uint,2>,7>"));
        assert!(TypeRegistry::lookup("vector<uint,2>").is_some());
    }

    #[test]
    fn malformed_descriptions_are_rejected() {
        set_error_policy(ErrorPolicy::Return);
        for bad in [
            "double",
            "vector<float,5>",
            "vector<float,3",
            "vector<float, 3>",
            "array<buffer<int>,2>",
            "struct<3,int>",
            "struct<4>",
            "texture<4,float>",
            "texture<2,vector<float,4>>",
            "float>",
        ] {
            let err = Type::from(bad).unwrap_err();
            assert!(
                matches!(err, Error::InvalidTypeDescription { .. }),
                "{bad}: {err}"
            );
            assert!(TypeRegistry::lookup(bad).is_none(), "{bad}");
        }
    }

    #[test]
    fn concurrent_registration_yields_one_entry() {
        const DESC: &str = "struct<4,int,float>";
        let barrier = Barrier::new(2);
        let (a, b) = std::thread::scope(|s| {
            let ta = s.spawn(|| {
                barrier.wait();
                Type::from(DESC).unwrap() as *const Type as usize
            });
            let tb = s.spawn(|| {
                barrier.wait();
                Type::from(DESC).unwrap() as *const Type as usize
            });
            (ta.join().unwrap(), tb.join().unwrap())
        });
        assert_eq!(a, b);
        let count = TypeRegistry::with_types(|types| {
            types.iter().filter(|t| t.description() == DESC).count()
        });
        assert_eq!(count, 1);
        assert_eq!(Type::of::<(i32, f32)>().description(), DESC);
    }

    #[test]
    fn nested_values_of_every_kind_register() {
        use glam::{Mat3A, Vec2, Vec3A};

        use crate::resource::Buffer;

        let ty = Type::of::<Buffer<[(u32, [Vec3A; 2], Mat3A); 4]>>();
        assert_eq!(
            ty.description(),
            "buffer<array<struct<16,uint,array<vector<float,3>,2>,matrix<3>>,4>>"
        );
        assert_eq!(Type::of::<([Vec2; 1],)>().members()[0].dimension(), 1);
        assert_eq!(known("vector<uint,3>").size(), 16);
    }

    #[test]
    fn of_is_stable_across_threads() {
        let here = Type::of::<[glam::UVec4; 3]>() as *const Type as usize;
        let there = std::thread::spawn(|| Type::of::<[glam::UVec4; 3]>() as *const Type as usize)
            .join()
            .unwrap();
        assert_eq!(here, there);
    }
}
