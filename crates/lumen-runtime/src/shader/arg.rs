use bytemuck::Pod;
use glam::{IVec2, IVec4, Mat2, Mat3A, Mat4, UVec2, UVec4, Vec2, Vec3A, Vec4};

use super::ShaderInvoke;
use crate::ast::{Type, ValueDesc};
use crate::error::Result;
use crate::resource::{Buffer, BufferView, Heap, Image, ImageView, Texel, Volume, VolumeView};
use crate::rtx::Accel;

/// A value that can fill kernel argument slots.
pub trait KernelArg {
    /// Encodes `self` into the next slot(s) of `invoke`.
    fn bind<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()>;
}

impl<T: ValueDesc> KernelArg for BufferView<'_, T> {
    fn bind<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()> {
        invoke.bind_buffer(
            Type::of::<Buffer<T>>(),
            self.device().id(),
            self.handle(),
            self.offset_bytes(),
        )
    }
}

impl<T: ValueDesc> KernelArg for &Buffer<T> {
    fn bind<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()> {
        invoke.bind_buffer(Type::of::<Buffer<T>>(), self.device().id(), self.handle(), 0)
    }
}

impl<T: Texel> KernelArg for ImageView<'_, T> {
    fn bind<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()> {
        invoke.bind_texture(
            Type::of::<Image<T>>(),
            self.device().id(),
            self.handle(),
            self.offset().extend(0),
        )
    }
}

impl<T: Texel> KernelArg for &Image<T> {
    fn bind<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()> {
        self.as_view().bind(invoke)
    }
}

impl<T: Texel> KernelArg for VolumeView<'_, T> {
    fn bind<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()> {
        invoke.bind_texture(
            Type::of::<Volume<T>>(),
            self.device().id(),
            self.handle(),
            self.offset(),
        )
    }
}

impl<T: Texel> KernelArg for &Volume<T> {
    fn bind<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()> {
        self.as_view().bind(invoke)
    }
}

impl KernelArg for &Heap {
    fn bind<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()> {
        invoke.bind_heap(Type::of::<Heap>(), self.device().id(), self.handle())
    }
}

impl KernelArg for &Accel {
    fn bind<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()> {
        invoke.bind_accel(Type::of::<Accel>(), self.device().id(), self.handle())
    }
}

impl KernelArg for bool {
    fn bind<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()> {
        invoke.bind_uniform(Type::of::<bool>(), &[self as u8])
    }
}

macro_rules! uniform_arg {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl KernelArg for $ty {
                #[inline]
                fn bind<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()> {
                    invoke.bind_uniform(Type::of::<$ty>(), bytemuck::bytes_of(&self))
                }
            }
        )+
    };
}

uniform_arg!(f32, i32, u32, Vec2, Vec3A, Vec4, IVec2, IVec4, UVec2, UVec4, Mat2, Mat3A, Mat4);

/// By-value argument of any plain-data type with a description, such as a
/// [`lumen_struct!`](crate::lumen_struct) struct or an array.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Uniform<T>(pub T);

impl<T: ValueDesc + Pod> KernelArg for Uniform<T> {
    fn bind<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()> {
        const { assert!(core::mem::size_of::<T>() == T::SIZE, "uniform bytes must cover the device type") };
        invoke.bind_uniform(Type::of::<T>(), bytemuck::bytes_of(&self.0))
    }
}

/// A tuple of [`KernelArg`]s bound left to right.
pub trait KernelArgs {
    fn bind_all<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()>;
}

impl KernelArgs for () {
    #[inline]
    fn bind_all<const N: usize>(self, _invoke: &mut ShaderInvoke<'_, N>) -> Result<()> {
        Ok(())
    }
}

macro_rules! kernel_args {
    ($($name:ident),+) => {
        impl<$($name: KernelArg),+> KernelArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn bind_all<const N: usize>(self, invoke: &mut ShaderInvoke<'_, N>) -> Result<()> {
                let ($($name,)+) = self;
                $($name.bind(invoke)?;)+
                Ok(())
            }
        }
    };
}

kernel_args!(A);
kernel_args!(A, B);
kernel_args!(A, B, C);
kernel_args!(A, B, C, D);
kernel_args!(A, B, C, D, E);
kernel_args!(A, B, C, D, E, F);
kernel_args!(A, B, C, D, E, F, G);
kernel_args!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use glam::{Mat4, UVec3};

    use super::*;
    use crate::ast::{Kernel1D, Kernel2D, Usage};
    use crate::command::{Argument, MAX_ARGUMENT_COUNT};
    use crate::error::{set_error_policy, Error, ErrorPolicy};
    use crate::resource::PixelStorage;
    use crate::rtx::AccelBuildHint;
    use crate::testing::mock_device;

    #[test]
    fn buffer_and_scalar_dispatch() {
        let (device, _) = mock_device();
        let data = device.create_buffer::<f32>(1024).unwrap();
        let kernel = Kernel1D::define(|b| {
            let buf = b.buffer_argument::<f32>();
            b.uniform_argument::<u32>();
            b.mark_usage(buf, Usage::ReadWrite);
        });
        let shader = device.compile(&kernel).unwrap();

        let cmd = shader
            .call((data.view(..).unwrap(), 12u32))
            .unwrap()
            .dispatch(1024)
            .unwrap();
        assert_eq!(cmd.dispatch_size, UVec3::new(1024, 1, 1));
        assert_eq!(cmd.handle, shader.handle());
        assert_eq!(cmd.explicit_arguments().len(), 2);
        assert_eq!(
            cmd.explicit_arguments()[0],
            Argument::Buffer {
                variable_uid: 0,
                handle: data.handle(),
                offset_bytes: 0,
                usage: Usage::ReadWrite,
            }
        );
        assert_eq!(
            cmd.explicit_arguments()[1],
            Argument::Uniform {
                variable_uid: 1,
                data: 12u32.to_ne_bytes().to_vec(),
                alignment: 4,
            }
        );
    }

    #[test]
    fn captured_resources_precede_explicit_arguments() {
        let (device, _) = mock_device();
        let data = device.create_buffer::<f32>(64).unwrap();
        let lut = device.create_buffer::<u32>(16).unwrap();
        let image = device
            .create_image::<f32>(PixelStorage::Float4, UVec2::new(4, 4), 1)
            .unwrap();
        let heap = device.create_heap(1024).unwrap();
        let accel = device.create_accel().unwrap();

        let kernel = Kernel1D::define(|b| {
            let out = b.buffer_argument::<f32>();
            b.uniform_argument::<u32>();
            b.mark_usage(out, Usage::Write);
            let accel_var = b.capture_accel(&accel);
            let heap_var = b.capture_heap(&heap);
            let image_var = b.capture_image(&image);
            let lut_var = b.capture_buffer(lut.view(4..).unwrap());
            b.mark_usage(lut_var, Usage::Read);
            b.mark_usage(image_var, Usage::Read);
            let _ = (accel_var, heap_var);
        });
        let shader = device.compile(&kernel).unwrap();
        let cmd = shader.call((&data, 7u32)).unwrap().dispatch(64).unwrap();

        let captured = cmd.captured_arguments();
        assert_eq!(captured.len(), 4);
        assert!(matches!(
            captured[0],
            Argument::Buffer { offset_bytes: 16, usage: Usage::Read, .. }
        ));
        assert!(matches!(captured[1], Argument::Texture { usage: Usage::Read, .. }));
        assert!(matches!(captured[2], Argument::Heap { .. }));
        assert!(matches!(captured[3], Argument::Accel { .. }));
        assert_eq!(cmd.explicit_arguments().len(), 2);
        assert!(matches!(
            cmd.explicit_arguments()[0],
            Argument::Buffer { usage: Usage::Write, .. }
        ));
    }

    #[test]
    fn image_views_bind_a_trailing_offset() {
        let (device, _) = mock_device();
        let image = device
            .create_image::<f32>(PixelStorage::Byte4, UVec2::new(16, 16), 1)
            .unwrap();
        let kernel = Kernel2D::define(|b| {
            b.image_argument::<f32>();
        });
        let shader = device.compile(&kernel).unwrap();

        let region = image
            .as_view()
            .region(UVec2::new(2, 3), UVec2::new(8, 8))
            .unwrap();
        let cmd = shader.invoke().unwrap().arg(region).unwrap().dispatch(8, 8).unwrap();
        assert_eq!(cmd.dispatch_size, UVec3::new(8, 8, 1));
        assert_eq!(cmd.arguments.len(), 2);
        assert!(matches!(cmd.arguments[0], Argument::Texture { .. }));
        assert_eq!(
            cmd.arguments[1],
            Argument::Uniform {
                variable_uid: 1,
                data: bytemuck::bytes_of(&UVec2::new(2, 3)).to_vec(),
                alignment: 8,
            }
        );

        let whole = shader.call((&image,)).unwrap().dispatch(16, 16).unwrap();
        assert_eq!(
            whole.arguments[1],
            Argument::Uniform {
                variable_uid: 1,
                data: vec![0; 8],
                alignment: 8,
            }
        );
    }

    #[test]
    fn heap_accel_and_struct_uniforms() {
        #[repr(C)]
        #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
        struct Params {
            scale: f32,
            count: u32,
        }
        crate::lumen_struct!(Params { scale: f32, count: u32 });

        let (device, _) = mock_device();
        let heap = device.create_heap(256).unwrap();
        let mut accel = device.create_accel().unwrap();
        let mesh = device.create_mesh().unwrap();
        let _ = accel.build(AccelBuildHint::FastTrace, &[&mesh], &[Mat4::IDENTITY]).unwrap();

        let kernel = Kernel1D::define(|b| {
            b.heap_argument();
            b.accel_argument();
            b.uniform_argument::<Params>();
            b.uniform_argument::<bool>();
        });
        let shader = device.compile(&kernel).unwrap();
        let cmd = shader
            .call((&heap, &accel, Uniform(Params { scale: 2.0, count: 3 }), true))
            .unwrap()
            .dispatch(1)
            .unwrap();
        assert!(matches!(cmd.arguments[0], Argument::Heap { variable_uid: 0, .. }));
        assert!(matches!(cmd.arguments[1], Argument::Accel { variable_uid: 1, .. }));
        assert!(matches!(&cmd.arguments[2], Argument::Uniform { data, .. } if data.len() == 8));
        assert!(matches!(&cmd.arguments[3], Argument::Uniform { data, .. } if data == &[1]));
    }

    #[test]
    fn mismatched_arguments_are_reported() {
        set_error_policy(ErrorPolicy::Return);
        let (device, _) = mock_device();
        let data = device.create_buffer::<u32>(4).unwrap();
        let kernel = Kernel1D::define(|b| {
            b.buffer_argument::<f32>();
        });
        let shader = device.compile(&kernel).unwrap();

        // wrong kind
        assert!(matches!(shader.call((1.0f32,)), Err(Error::ArgumentMismatch(_))));
        // wrong element type
        assert!(matches!(shader.call((&data,)), Err(Error::ArgumentMismatch(_))));
        // too few
        assert!(matches!(
            shader.invoke().unwrap().dispatch(4),
            Err(Error::ArgumentMismatch(_))
        ));
        // too many
        let floats = device.create_buffer::<f32>(4).unwrap();
        assert!(matches!(
            shader.call((&floats, 1u32)),
            Err(Error::ArgumentMismatch(_))
        ));
        // zero extent
        assert_eq!(
            shader.call((&floats,)).unwrap().dispatch(0).unwrap_err(),
            Error::InvalidDispatchSize(0, 1, 1)
        );
    }

    #[test]
    fn foreign_resources_are_rejected() {
        set_error_policy(ErrorPolicy::Return);
        let (a, _) = mock_device();
        let (b, _) = mock_device();
        let foreign = b.create_buffer::<f32>(4).unwrap();

        let kernel = Kernel1D::define(|k| {
            k.buffer_argument::<f32>();
        });
        let shader = a.compile(&kernel).unwrap();
        assert!(matches!(shader.call((&foreign,)), Err(Error::DeviceMismatch { .. })));

        let capturing = Kernel1D::define(|k| {
            k.capture_buffer(foreign.as_view());
        });
        assert!(matches!(a.compile(&capturing), Err(Error::DeviceMismatch { .. })));
    }

    #[test]
    fn the_65th_slot_overflows() {
        set_error_policy(ErrorPolicy::Return);
        let (device, _) = mock_device();
        let kernel = Kernel1D::define(|b| {
            for _ in 0..=MAX_ARGUMENT_COUNT {
                b.uniform_argument::<u32>();
            }
        });
        let shader = device.compile(&kernel).unwrap();

        let mut invoke = shader.invoke().unwrap();
        for i in 0..MAX_ARGUMENT_COUNT as u32 {
            invoke = invoke.arg(i).unwrap();
        }
        assert_eq!(invoke.bound(), MAX_ARGUMENT_COUNT);
        assert_eq!(
            invoke.arg(64u32).unwrap_err(),
            Error::TooManyArguments {
                handle: shader.handle(),
                limit: MAX_ARGUMENT_COUNT
            }
        );
    }

    #[test]
    fn uniform_bytes_cover_the_registered_type() {
        #[repr(C)]
        #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
        struct Light {
            direction: Vec3A,
            intensity: f32,
            _pad: [f32; 3],
        }
        crate::lumen_struct!(Light { direction: Vec3A, intensity: f32, _pad: [f32; 3] });

        let (device, _) = mock_device();
        let volume = device
            .create_volume::<f32>(PixelStorage::Float1, UVec3::splat(8), 1)
            .unwrap();
        let kernel = crate::ast::Kernel3D::define(|b| {
            b.uniform_argument::<Vec3A>();
            b.uniform_argument::<Mat3A>();
            b.uniform_argument::<Light>();
            b.volume_argument::<f32>();
        });
        let shader = device.compile(&kernel).unwrap();
        let region = volume
            .as_view()
            .region(UVec3::new(1, 2, 3), UVec3::splat(2))
            .unwrap();
        let light = Light {
            direction: Vec3A::Y,
            intensity: 2.0,
            _pad: [0.0; 3],
        };
        let cmd = shader
            .call((Vec3A::X, Mat3A::IDENTITY, Uniform(light), region))
            .unwrap()
            .dispatch(2, 2, 2)
            .unwrap();

        let uniforms: Vec<_> = cmd
            .arguments
            .iter()
            .filter_map(|arg| match arg {
                Argument::Uniform { variable_uid, data, alignment } => {
                    Some((*variable_uid, data.len(), *alignment))
                }
                _ => None,
            })
            .collect();
        // volume offset is padded to a uint3
        assert_eq!(uniforms, [(0, 16, 16), (1, 48, 16), (2, 32, 16), (4, 16, 16)]);
        for (slot, len, _) in uniforms {
            assert_eq!(len, kernel.function().arguments()[slot as usize].ty().size());
        }
        assert!(matches!(
            &cmd.arguments[4],
            Argument::Uniform { data, .. } if data[..12] == *bytemuck::bytes_of(&UVec3::new(1, 2, 3))
        ));
    }

    #[test]
    fn shaders_share_the_recorded_function() {
        let (device, log) = mock_device();
        let kernel = Kernel1D::define(|b| {
            b.uniform_argument::<f32>();
        });
        let s1 = device.compile(&kernel).unwrap();
        let s2 = device.compile(&kernel).unwrap();
        assert!(std::sync::Arc::ptr_eq(s1.function(), s2.function()));
        assert_ne!(s1.handle(), s2.handle());
        let (h1, h2) = (s1.handle(), s2.handle());
        drop((s1, s2));
        assert_eq!(
            log.destroyed(crate::device::ResourceTag::Shader),
            vec![h1, h2]
        );
    }
}
