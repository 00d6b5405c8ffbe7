/*
Handles, descriptors and the two capability interfaces (device and texture codec) that the
cache, MSAA and loader code talk to.  On Windows these are backed by the hooked device vtable
and the D3DX exports; in tests by `fake::FakeGpu`.
 */
use std::fmt::{Display, Error, Formatter};
use std::path::Path;

use crate::defs::{D3DFORMAT, HRESULT};
use crate::error::DxResult;

/// Opaque COM pointer to a device.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct DevicePtr(pub usize);

/// Opaque COM pointer to a (base) texture.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct TexPtr(pub usize);

/// Opaque COM pointer to a surface.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct SurfPtr(pub usize);

impl Display for DevicePtr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::result::Result<(), Error> {
        write!(f, "{:08x}", self.0)
    }
}

impl Display for TexPtr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::result::Result<(), Error> {
        write!(f, "{:08x}", self.0)
    }
}

impl Display for SurfPtr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::result::Result<(), Error> {
        write!(f, "{:08x}", self.0)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub levels: u32,
    pub usage: u32,
    pub format: D3DFORMAT,
    pub pool: u32,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct SurfaceDesc {
    pub width: u32,
    pub height: u32,
    pub format: D3DFORMAT,
    pub usage: u32,
    pub pool: u32,
    pub multisample: u32,
    pub multisample_quality: u32,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub format: D3DFORMAT,
}

/// The tunable arguments of the D3DX "Ex" texture loaders.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct TexLoadParams {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub usage: u32,
    pub format: D3DFORMAT,
    pub pool: u32,
    pub filter: u32,
    pub mip_filter: u32,
    pub color_key: u32,
}

/// Caller supplied out-parameter addresses (source info, palette) that are forwarded untouched
/// to the real loader.  Zero means the caller passed null.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct LoadOutParams {
    pub src_info: usize,
    pub palette: usize,
}

/// The subset of IDirect3DDevice9 (plus texture/surface methods) used by the fix.  Calls made
/// through this trait go to the real implementation and never back into the interception layer.
pub trait D3D9Device {
    fn create_texture(
        &mut self,
        device: DevicePtr,
        desc: &TextureDesc,
        shared_handle: usize,
    ) -> DxResult<TexPtr>;
    fn create_render_target(
        &mut self,
        device: DevicePtr,
        desc: &SurfaceDesc,
        lockable: bool,
        shared_handle: usize,
    ) -> DxResult<SurfPtr>;
    fn create_depth_stencil_surface(
        &mut self,
        device: DevicePtr,
        desc: &SurfaceDesc,
        discard: bool,
        shared_handle: usize,
    ) -> DxResult<SurfPtr>;
    fn set_texture(&mut self, device: DevicePtr, sampler: u32, tex: Option<TexPtr>) -> HRESULT;
    fn set_render_target(&mut self, device: DevicePtr, index: u32, surf: Option<SurfPtr>)
        -> HRESULT;
    fn set_depth_stencil_surface(&mut self, device: DevicePtr, surf: Option<SurfPtr>) -> HRESULT;
    fn set_sampler_state(&mut self, device: DevicePtr, sampler: u32, state: u32, value: u32)
        -> HRESULT;
    fn stretch_rect(
        &mut self,
        device: DevicePtr,
        src: SurfPtr,
        src_rect: Option<&Rect>,
        dest: SurfPtr,
        dest_rect: Option<&Rect>,
        filter: u32,
    ) -> HRESULT;
    fn update_texture(&mut self, device: DevicePtr, src: TexPtr, dest: TexPtr) -> HRESULT;

    fn get_surface_level(&mut self, tex: TexPtr, level: u32) -> DxResult<SurfPtr>;
    fn surface_desc(&mut self, surf: SurfPtr) -> DxResult<SurfaceDesc>;
    fn level_count(&mut self, tex: TexPtr) -> u32;
    fn add_ref_texture(&mut self, tex: TexPtr) -> u32;
    /// Returns the reference count after the release.  A real device reports an unsigned
    /// count, so over-release only shows up as reaching zero early; fakes that track
    /// over-release may also go negative.
    fn release_texture(&mut self, tex: TexPtr) -> i32;
    fn release_surface(&mut self, surf: SurfPtr) -> i32;
}

/// The D3DX image functions.  Must be callable from the background loader thread.
pub trait TextureCodec: Send + Sync {
    fn create_texture_from_file_in_memory_ex(
        &self,
        device: DevicePtr,
        data: &[u8],
        params: &TexLoadParams,
        out: LoadOutParams,
    ) -> DxResult<TexPtr>;
    fn create_texture_from_file(&self, device: DevicePtr, path: &Path) -> DxResult<TexPtr>;
    fn create_texture_from_file_ex(
        &self,
        device: DevicePtr,
        path: &Path,
        params: &TexLoadParams,
        out: LoadOutParams,
    ) -> DxResult<TexPtr>;
    fn save_texture_to_file(&self, path: &Path, file_format: u32, tex: TexPtr) -> HRESULT;
    fn image_info_from_file_in_memory(&self, data: &[u8]) -> DxResult<ImageInfo>;
    fn image_info_from_file(&self, path: &Path) -> DxResult<ImageInfo>;
}
