//! Mapping from Rust types to structural type descriptions.

use core::mem::align_of;

use glam::{BVec2, BVec4, IVec2, IVec4, Mat2, Mat3A, Mat4, UVec2, UVec4, Vec2, Vec3A, Vec4};

use crate::resource::{Buffer, Heap, Image, Texel, Volume};
use crate::rtx::Accel;

/// Rust types that have a kernel-visible structural description.
///
/// Use [`crate::ast::Type::of`] to get the interned type; implement this trait
/// for your own `#[repr(C)]` structs with [`lumen_struct!`](crate::lumen_struct).
pub trait TypeDesc: 'static {
    fn description() -> String;
}

/// By-value types: the only ones that may sit inside arrays, structs and buffers.
///
/// `SIZE` and `ALIGNMENT` are the device layout of the description. Scalars,
/// vectors, matrices, arrays of them and [`lumen_struct!`](crate::lumen_struct)
/// structs have `size_of::<Self>() == SIZE`, so their bytes cover the registered
/// type exactly. glam's packed 3-wide types (`Vec3`, `IVec3`, `UVec3`, `Mat3`)
/// are 4 bytes per column short of that and have no mapping; use `Vec3A` and
/// `Mat3A`. Tuples describe layouts only, Rust does not lay them out in order.
pub trait ValueDesc: TypeDesc {
    const SIZE: usize;
    const ALIGNMENT: usize;
}

macro_rules! value_desc {
    ($($ty:ty => $desc:literal, $size:literal, $align:literal);+ $(;)?) => {
        $(
            impl TypeDesc for $ty {
                fn description() -> String {
                    $desc.to_string()
                }
            }
            impl ValueDesc for $ty {
                const SIZE: usize = $size;
                const ALIGNMENT: usize = $align;
            }
        )+
    };
}

value_desc! {
    bool => "bool", 1, 1;
    f32 => "float", 4, 4;
    i32 => "int", 4, 4;
    u32 => "uint", 4, 4;
    BVec2 => "vector<bool,2>", 2, 2;
    BVec4 => "vector<bool,4>", 4, 4;
    Vec2 => "vector<float,2>", 8, 8;
    Vec3A => "vector<float,3>", 16, 16;
    Vec4 => "vector<float,4>", 16, 16;
    IVec2 => "vector<int,2>", 8, 8;
    IVec4 => "vector<int,4>", 16, 16;
    UVec2 => "vector<uint,2>", 8, 8;
    UVec4 => "vector<uint,4>", 16, 16;
    Mat2 => "matrix<2>", 16, 8;
    Mat3A => "matrix<3>", 48, 16;
    Mat4 => "matrix<4>", 64, 16;
}

impl<T: ValueDesc, const N: usize> TypeDesc for [T; N] {
    fn description() -> String {
        const { assert!(N > 0, "zero-length arrays have no device type") };
        format!("array<{},{}>", T::description(), N)
    }
}

impl<T: ValueDesc, const N: usize> ValueDesc for [T; N] {
    const SIZE: usize = T::SIZE * N;
    const ALIGNMENT: usize = T::ALIGNMENT;
}

macro_rules! tuple_desc {
    ($($name:ident),+) => {
        impl<$($name: ValueDesc),+> TypeDesc for ($($name,)+) {
            fn description() -> String {
                let mut s = format!("struct<{}", align_of::<($($name,)+)>());
                $(
                    s.push(',');
                    s.push_str(&$name::description());
                )+
                s.push('>');
                s
            }
        }

        impl<$($name: ValueDesc),+> ValueDesc for ($($name,)+) {
            const ALIGNMENT: usize = align_of::<($($name,)+)>();
            const SIZE: usize = {
                let mut offset = 0usize;
                $(offset = offset.next_multiple_of($name::ALIGNMENT) + $name::SIZE;)+
                offset.next_multiple_of(Self::ALIGNMENT)
            };
        }
    };
}

tuple_desc!(A);
tuple_desc!(A, B);
tuple_desc!(A, B, C);
tuple_desc!(A, B, C, D);

impl<T: ValueDesc> TypeDesc for Buffer<T> {
    fn description() -> String {
        format!("buffer<{}>", T::description())
    }
}

impl<T: Texel> TypeDesc for Image<T> {
    fn description() -> String {
        format!("texture<2,{}>", T::description())
    }
}

impl<T: Texel> TypeDesc for Volume<T> {
    fn description() -> String {
        format!("texture<3,{}>", T::description())
    }
}

impl TypeDesc for Heap {
    fn description() -> String {
        "heap".to_string()
    }
}

impl TypeDesc for Accel {
    fn description() -> String {
        "accel".to_string()
    }
}

/// Implements [`TypeDesc`](crate::ast::TypeDesc) and
/// [`ValueDesc`](crate::ast::ValueDesc) for a `#[repr(C)]` struct.
///
/// Fields must be listed in declaration order with their types. Every field
/// offset and the struct size are checked against the device layout at compile
/// time, so a struct that would bind misplaced bytes does not build.
///
/// ```
/// #[repr(C)]
/// struct Particle {
///     position: glam::Vec3A,
///     mass: f32,
/// }
/// lumen_runtime::lumen_struct!(Particle { position: glam::Vec3A, mass: f32 });
///
/// let ty = lumen_runtime::ast::Type::of::<Particle>();
/// assert_eq!(ty.description(), "struct<16,vector<float,3>,float>");
/// assert_eq!(ty.size(), 32);
/// ```
///
/// `Vec2` is 4-byte aligned in Rust but 8-byte aligned on the device:
///
/// ```compile_fail
/// #[repr(C)]
/// struct Skewed {
///     weight: f32,
///     uv: glam::Vec2,
/// }
/// lumen_runtime::lumen_struct!(Skewed { weight: f32, uv: glam::Vec2 });
/// ```
#[macro_export]
macro_rules! lumen_struct {
    ($name:ty { $($field:ident : $fty:ty),+ $(,)? }) => {
        impl $crate::ast::TypeDesc for $name {
            fn description() -> ::std::string::String {
                let mut s = ::std::format!("struct<{}", ::core::mem::align_of::<$name>());
                $(
                    s.push(',');
                    s.push_str(&<$fty as $crate::ast::TypeDesc>::description());
                )+
                s.push('>');
                s
            }
        }

        impl $crate::ast::ValueDesc for $name {
            const ALIGNMENT: usize = ::core::mem::align_of::<$name>();
            const SIZE: usize = {
                let mut offset = 0usize;
                $(
                    offset = offset.next_multiple_of(<$fty as $crate::ast::ValueDesc>::ALIGNMENT)
                        + <$fty as $crate::ast::ValueDesc>::SIZE;
                )+
                offset.next_multiple_of(Self::ALIGNMENT)
            };
        }

        const _: () = {
            let mut offset = 0usize;
            $(
                offset = offset.next_multiple_of(<$fty as $crate::ast::ValueDesc>::ALIGNMENT);
                assert!(
                    ::core::mem::offset_of!($name, $field) == offset,
                    "lumen_struct!: field is not at its device offset"
                );
                offset += <$fty as $crate::ast::ValueDesc>::SIZE;
            )+
            assert!(
                ::core::mem::size_of::<$name>() == <$name as $crate::ast::ValueDesc>::SIZE,
                "lumen_struct!: struct size differs from its device size (missing fields?)"
            );
        };
    };
}
