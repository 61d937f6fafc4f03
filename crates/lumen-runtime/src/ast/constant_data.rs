//! Content-addressed store for constant arrays embedded in kernel bodies.
//!
//! Responsibilities:
//! - copy constant data into process-lifetime storage exactly once per content
//! - identify stored blocks by a 64-bit hash of element kind + bytes
//! - resolve a hash back to its typed view

use std::collections::HashMap;
use std::sync::LazyLock;

use glam::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};
use parking_lot::Mutex;

use super::{known, Type};
use crate::error::{raise, Error, Result};

/// Element bytes fed to the content hash.
trait HashBytes {
    fn hash_into(slice: &[Self], hasher: &mut blake3::Hasher)
    where
        Self: Sized;
}

impl HashBytes for bool {
    fn hash_into(slice: &[Self], hasher: &mut blake3::Hasher) {
        for &b in slice {
            hasher.update(&[b as u8]);
        }
    }
}

macro_rules! pod_hash_bytes {
    ($($ty:ty),+) => {
        $(
            impl HashBytes for $ty {
                #[inline]
                fn hash_into(slice: &[Self], hasher: &mut blake3::Hasher) {
                    hasher.update(bytemuck::cast_slice(slice));
                }
            }
        )+
    };
}

pod_hash_bytes!(f32, i32, u32, Vec2, Vec3, Vec4, IVec2, IVec3, IVec4, UVec2, UVec3, UVec4, Mat2, Mat3, Mat4);

macro_rules! constant_kinds {
    ($($variant:ident($ty:ty) => $desc:literal),+ $(,)?) => {
        /// Borrowed, typed view over constant elements.
        #[derive(Debug, Copy, Clone, PartialEq)]
        pub enum ConstantView<'a> {
            $($variant(&'a [$ty]),)+
        }

        enum ConstantStorage {
            $($variant(Box<[$ty]>),)+
        }

        impl<'a> ConstantView<'a> {
            /// Number of elements.
            pub fn len(&self) -> usize {
                match self {
                    $(Self::$variant(s) => s.len(),)+
                }
            }

            #[inline]
            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// Type of one element.
            pub fn element_type(&self) -> &'static Type {
                match self {
                    $(Self::$variant(_) => known($desc),)+
                }
            }

            /// Content hash: BLAKE3 over the element signature and the raw element bytes.
            pub fn content_hash(&self) -> u64 {
                let mut hasher = blake3::Hasher::new();
                hasher.update(self.element_type().description().as_bytes());
                hasher.update(&[0]);
                match self {
                    $(Self::$variant(s) => <$ty as HashBytes>::hash_into(s, &mut hasher),)+
                }
                let mut prefix = [0u8; 8];
                prefix.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
                u64::from_le_bytes(prefix)
            }

            fn to_storage(self) -> ConstantStorage {
                match self {
                    $(Self::$variant(s) => ConstantStorage::$variant(s.into()),)+
                }
            }
        }

        impl ConstantStorage {
            fn view(&self) -> ConstantView<'_> {
                match self {
                    $(Self::$variant(s) => ConstantView::$variant(s),)+
                }
            }
        }

        $(
            impl<'a> From<&'a [$ty]> for ConstantView<'a> {
                #[inline]
                fn from(s: &'a [$ty]) -> Self {
                    Self::$variant(s)
                }
            }
        )+
    };
}

constant_kinds! {
    Bool(bool) => "bool",
    Float(f32) => "float",
    Int(i32) => "int",
    Uint(u32) => "uint",
    Float2(Vec2) => "vector<float,2>",
    Float3(Vec3) => "vector<float,3>",
    Float4(Vec4) => "vector<float,4>",
    Int2(IVec2) => "vector<int,2>",
    Int3(IVec3) => "vector<int,3>",
    Int4(IVec4) => "vector<int,4>",
    Uint2(UVec2) => "vector<uint,2>",
    Uint3(UVec3) => "vector<uint,3>",
    Uint4(UVec4) => "vector<uint,4>",
    Float2x2(Mat2) => "matrix<2>",
    Float3x3(Mat3) => "matrix<3>",
    Float4x4(Mat4) => "matrix<4>",
}

/// One stored constant block.
pub struct ConstantData {
    hash: u64,
    storage: ConstantStorage,
}

static STORE: LazyLock<Mutex<HashMap<u64, &'static ConstantData>>> =
    LazyLock::new(Default::default);

impl ConstantData {
    /// Stores a copy of `view` unless identical content is already stored.
    ///
    /// Returns the content hash, which is the only way to refer to the block.
    pub fn create<'a>(view: impl Into<ConstantView<'a>>) -> u64 {
        let view = view.into();
        let hash = view.content_hash();
        let mut store = STORE.lock();
        if let Some(existing) = store.get(&hash) {
            debug_assert_eq!(existing.len(), view.len(), "constant hash collision");
            return hash;
        }
        let data: &'static ConstantData = Box::leak(Box::new(ConstantData {
            hash,
            storage: view.to_storage(),
        }));
        store.insert(hash, data);
        log::trace!(
            "stored constant #{hash:016x} ({} x {})",
            view.len(),
            view.element_type()
        );
        hash
    }

    /// Returns the stored block for `hash`.
    pub fn get(hash: u64) -> Result<&'static ConstantData> {
        match STORE.lock().get(&hash).copied() {
            Some(data) => Ok(data),
            None => raise(Error::UnknownConstant(hash)),
        }
    }

    /// Returns the typed view stored under `hash`.
    pub fn view(hash: u64) -> Result<ConstantView<'static>> {
        Ok(Self::get(hash)?.data())
    }

    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn data(&'static self) -> ConstantView<'static> {
        self.storage.view()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.storage.view().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{set_error_policy, ErrorPolicy};

    #[test]
    fn identical_content_is_stored_once() {
        let a = ConstantData::create(&[1.0f32, 2.0, 3.0][..]);
        let b = ConstantData::create(vec![1.0f32, 2.0, 3.0].as_slice());
        assert_eq!(a, b);

        let view = ConstantData::view(a).unwrap();
        assert_eq!(view, ConstantView::Float(&[1.0, 2.0, 3.0]));
        assert_eq!(view.element_type(), Type::of::<f32>());
        assert!(core::ptr::eq(
            ConstantData::get(a).unwrap(),
            ConstantData::get(b).unwrap()
        ));
    }

    #[test]
    fn distinct_content_gets_distinct_hashes() {
        let a = ConstantData::create(&[1u32, 2, 3][..]);
        let b = ConstantData::create(&[1u32, 2, 4][..]);
        let c = ConstantData::create(&[1u32, 2][..]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn equal_bytes_of_different_kinds_do_not_alias() {
        let ints = ConstantData::create(&[0i32, 0, 0, 0][..]);
        let uints = ConstantData::create(&[0u32, 0, 0, 0][..]);
        let vec = ConstantData::create(&[UVec4::ZERO][..]);
        assert_ne!(ints, uints);
        assert_ne!(uints, vec);
        assert_eq!(ConstantData::get(vec).unwrap().len(), 1);
    }

    #[test]
    fn bool_and_matrix_blocks_round_trip_through_the_store() {
        let flags = ConstantData::create(&[true, false, true][..]);
        assert_eq!(
            ConstantData::view(flags).unwrap(),
            ConstantView::Bool(&[true, false, true])
        );

        let m = ConstantData::create(&[Mat4::IDENTITY, Mat4::ZERO][..]);
        let view = ConstantData::view(m).unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view.element_type().description(), "matrix<4>");
    }

    #[test]
    fn unknown_hash_is_reported() {
        set_error_policy(ErrorPolicy::Return);
        let hash = 0xdead_beef_u64;
        assert_eq!(ConstantData::view(hash).unwrap_err(), Error::UnknownConstant(hash));
    }
}
