use std::ptr::null_mut;

use winapi::ctypes::c_void;
use winapi::shared::d3d9::*;
use winapi::shared::d3d9types::*;
use winapi::shared::minwindef::*;
use winapi::shared::windef::{HWND, RECT};
use winapi::shared::winerror::E_FAIL;
use winapi::um::winnt::{HANDLE, HRESULT, VOID};
use winapi::um::wingdi::RGNDATA;

use shared_dx::error::*;
use shared_dx::types::*;
use shared_dx::util::write_log_file;

use crate::hook_render::*;
use crate::util::{protect_memory, unprotect_memory};

pub type CreateTextureFn = unsafe extern "system" fn(
    THIS: *mut IDirect3DDevice9,
    Width: UINT,
    Height: UINT,
    Levels: UINT,
    Usage: DWORD,
    Format: D3DFORMAT,
    Pool: D3DPOOL,
    ppTexture: *mut *mut IDirect3DTexture9,
    pSharedHandle: *mut HANDLE,
) -> HRESULT;
pub type CreateSurfaceFn = unsafe extern "system" fn(
    THIS: *mut IDirect3DDevice9,
    Width: UINT,
    Height: UINT,
    Format: D3DFORMAT,
    MultiSample: D3DMULTISAMPLE_TYPE,
    MultisampleQuality: DWORD,
    LockableOrDiscard: BOOL,
    ppSurface: *mut *mut IDirect3DSurface9,
    pSharedHandle: *mut HANDLE,
) -> HRESULT;
pub type SetTextureFn = unsafe extern "system" fn(
    THIS: *mut IDirect3DDevice9,
    Stage: DWORD,
    pTexture: *mut IDirect3DBaseTexture9,
) -> HRESULT;
pub type SetRenderTargetFn = unsafe extern "system" fn(
    THIS: *mut IDirect3DDevice9,
    RenderTargetIndex: DWORD,
    pRenderTarget: *mut IDirect3DSurface9,
) -> HRESULT;
pub type SetDepthStencilSurfaceFn =
    unsafe extern "system" fn(THIS: *mut IDirect3DDevice9, pNewZStencil: *mut IDirect3DSurface9) -> HRESULT;
pub type StretchRectFn = unsafe extern "system" fn(
    THIS: *mut IDirect3DDevice9,
    pSourceSurface: *mut IDirect3DSurface9,
    pSourceRect: *const RECT,
    pDestSurface: *mut IDirect3DSurface9,
    pDestRect: *const RECT,
    Filter: D3DTEXTUREFILTERTYPE,
) -> HRESULT;
pub type PresentFn = unsafe extern "system" fn(
    THIS: *mut IDirect3DDevice9,
    pSourceRect: *const RECT,
    pDestRect: *const RECT,
    hDestWindowOverride: HWND,
    pDirtyRegion: *const RGNDATA,
) -> HRESULT;
pub type ResetFn = unsafe extern "system" fn(
    THIS: *mut IDirect3DDevice9,
    pPresentationParameters: *mut D3DPRESENT_PARAMETERS,
) -> HRESULT;
pub type DrawPrimitiveFn = unsafe extern "system" fn(
    THIS: *mut IDirect3DDevice9,
    PrimitiveType: D3DPRIMITIVETYPE,
    StartVertex: UINT,
    PrimitiveCount: UINT,
) -> HRESULT;
pub type DrawIndexedPrimitiveFn = unsafe extern "system" fn(
    THIS: *mut IDirect3DDevice9,
    PrimitiveType: D3DPRIMITIVETYPE,
    BaseVertexIndex: INT,
    MinVertexIndex: UINT,
    NumVertices: UINT,
    startIndex: UINT,
    primCount: UINT,
) -> HRESULT;
pub type DrawPrimitiveUPFn = unsafe extern "system" fn(
    THIS: *mut IDirect3DDevice9,
    PrimitiveType: D3DPRIMITIVETYPE,
    PrimitiveCount: UINT,
    pVertexStreamZeroData: *const VOID,
    VertexStreamZeroStride: UINT,
) -> HRESULT;
pub type DrawIndexedPrimitiveUPFn = unsafe extern "system" fn(
    THIS: *mut IDirect3DDevice9,
    PrimitiveType: D3DPRIMITIVETYPE,
    MinVertexIndex: UINT,
    NumVertices: UINT,
    PrimitiveCount: UINT,
    pIndexData: *const VOID,
    IndexDataFormat: D3DFORMAT,
    pVertexStreamZeroData: *const VOID,
    VertexStreamZeroStride: UINT,
) -> HRESULT;

/// The original device functions, saved before the vtable is patched.  Also the real-device
/// backend for the render fix: calls made through it never re-enter the hooks.
#[derive(Clone, Copy)]
pub struct HookDirect3D9Device {
    pub real_create_texture: CreateTextureFn,
    pub real_create_render_target: CreateSurfaceFn,
    pub real_create_depth_stencil_surface: CreateSurfaceFn,
    pub real_set_texture: SetTextureFn,
    pub real_set_render_target: SetRenderTargetFn,
    pub real_set_depth_stencil_surface: SetDepthStencilSurfaceFn,
    pub real_stretch_rect: StretchRectFn,
    pub real_present: PresentFn,
    pub real_reset: ResetFn,
    pub real_draw_primitive: DrawPrimitiveFn,
    pub real_draw_indexed_primitive: DrawIndexedPrimitiveFn,
    pub real_draw_primitive_up: DrawPrimitiveUPFn,
    pub real_draw_indexed_primitive_up: DrawIndexedPrimitiveUPFn,
}

fn dev(device: DevicePtr) -> *mut IDirect3DDevice9 {
    device.0 as *mut IDirect3DDevice9
}

fn tex(t: TexPtr) -> *mut IDirect3DTexture9 {
    t.0 as *mut IDirect3DTexture9
}

fn surf(s: Option<SurfPtr>) -> *mut IDirect3DSurface9 {
    s.map_or(null_mut(), |s| s.0 as *mut IDirect3DSurface9)
}

fn rect_ptr(r: Option<&Rect>, storage: &mut RECT) -> *const RECT {
    match r {
        None => std::ptr::null(),
        Some(r) => {
            storage.left = r.left;
            storage.top = r.top;
            storage.right = r.right;
            storage.bottom = r.bottom;
            storage as *const RECT
        }
    }
}

impl D3D9Device for HookDirect3D9Device {
    fn create_texture(
        &mut self,
        device: DevicePtr,
        desc: &TextureDesc,
        shared_handle: usize,
    ) -> DxResult<TexPtr> {
        let mut out: *mut IDirect3DTexture9 = null_mut();
        let hr = unsafe {
            (self.real_create_texture)(
                dev(device),
                desc.width,
                desc.height,
                desc.levels,
                desc.usage,
                desc.format,
                desc.pool,
                &mut out,
                shared_handle as *mut HANDLE,
            )
        };
        if hr != 0 || out.is_null() {
            return Err(if hr != 0 { hr } else { E_FAIL });
        }
        Ok(TexPtr(out as usize))
    }

    fn create_render_target(
        &mut self,
        device: DevicePtr,
        desc: &SurfaceDesc,
        lockable: bool,
        shared_handle: usize,
    ) -> DxResult<SurfPtr> {
        let mut out: *mut IDirect3DSurface9 = null_mut();
        let hr = unsafe {
            (self.real_create_render_target)(
                dev(device),
                desc.width,
                desc.height,
                desc.format,
                desc.multisample,
                desc.multisample_quality,
                lockable as BOOL,
                &mut out,
                shared_handle as *mut HANDLE,
            )
        };
        if hr != 0 || out.is_null() {
            return Err(if hr != 0 { hr } else { E_FAIL });
        }
        Ok(SurfPtr(out as usize))
    }

    fn create_depth_stencil_surface(
        &mut self,
        device: DevicePtr,
        desc: &SurfaceDesc,
        discard: bool,
        shared_handle: usize,
    ) -> DxResult<SurfPtr> {
        let mut out: *mut IDirect3DSurface9 = null_mut();
        let hr = unsafe {
            (self.real_create_depth_stencil_surface)(
                dev(device),
                desc.width,
                desc.height,
                desc.format,
                desc.multisample,
                desc.multisample_quality,
                discard as BOOL,
                &mut out,
                shared_handle as *mut HANDLE,
            )
        };
        if hr != 0 || out.is_null() {
            return Err(if hr != 0 { hr } else { E_FAIL });
        }
        Ok(SurfPtr(out as usize))
    }

    fn set_texture(&mut self, device: DevicePtr, sampler: u32, t: Option<TexPtr>) -> HRESULT {
        let t = t.map_or(null_mut(), |t| t.0 as *mut IDirect3DBaseTexture9);
        unsafe { (self.real_set_texture)(dev(device), sampler, t) }
    }

    fn set_render_target(&mut self, device: DevicePtr, index: u32, s: Option<SurfPtr>) -> HRESULT {
        unsafe { (self.real_set_render_target)(dev(device), index, surf(s)) }
    }

    fn set_depth_stencil_surface(&mut self, device: DevicePtr, s: Option<SurfPtr>) -> HRESULT {
        unsafe { (self.real_set_depth_stencil_surface)(dev(device), surf(s)) }
    }

    fn set_sampler_state(&mut self, device: DevicePtr, sampler: u32, state: u32, value: u32) -> HRESULT {
        unsafe { (*dev(device)).SetSamplerState(sampler, state, value) }
    }

    fn stretch_rect(
        &mut self,
        device: DevicePtr,
        src: SurfPtr,
        src_rect: Option<&Rect>,
        dest: SurfPtr,
        dest_rect: Option<&Rect>,
        filter: u32,
    ) -> HRESULT {
        let mut sr: RECT = unsafe { std::mem::zeroed() };
        let mut dr: RECT = unsafe { std::mem::zeroed() };
        unsafe {
            (self.real_stretch_rect)(
                dev(device),
                surf(Some(src)),
                rect_ptr(src_rect, &mut sr),
                surf(Some(dest)),
                rect_ptr(dest_rect, &mut dr),
                filter,
            )
        }
    }

    fn update_texture(&mut self, device: DevicePtr, src: TexPtr, dest: TexPtr) -> HRESULT {
        unsafe {
            (*dev(device)).UpdateTexture(
                src.0 as *mut IDirect3DBaseTexture9,
                dest.0 as *mut IDirect3DBaseTexture9,
            )
        }
    }

    fn get_surface_level(&mut self, t: TexPtr, level: u32) -> DxResult<SurfPtr> {
        let mut out: *mut IDirect3DSurface9 = null_mut();
        let hr = unsafe { (*tex(t)).GetSurfaceLevel(level, &mut out) };
        if hr != 0 || out.is_null() {
            return Err(if hr != 0 { hr } else { E_FAIL });
        }
        Ok(SurfPtr(out as usize))
    }

    fn surface_desc(&mut self, s: SurfPtr) -> DxResult<SurfaceDesc> {
        let mut desc: D3DSURFACE_DESC = unsafe { std::mem::zeroed() };
        let hr = unsafe { (*surf(Some(s))).GetDesc(&mut desc) };
        if hr != 0 {
            return Err(hr);
        }
        Ok(SurfaceDesc {
            width: desc.Width,
            height: desc.Height,
            format: desc.Format,
            usage: desc.Usage,
            pool: desc.Pool,
            multisample: desc.MultiSampleType,
            multisample_quality: desc.MultiSampleQuality,
        })
    }

    fn level_count(&mut self, t: TexPtr) -> u32 {
        unsafe { (*tex(t)).GetLevelCount() }
    }

    fn add_ref_texture(&mut self, t: TexPtr) -> u32 {
        unsafe { (*tex(t)).AddRef() }
    }

    // ULONG count, never negative; the cache detects over-release by an early zero
    fn release_texture(&mut self, t: TexPtr) -> i32 {
        unsafe { (*tex(t)).Release() as i32 }
    }

    fn release_surface(&mut self, s: SurfPtr) -> i32 {
        unsafe { (*surf(Some(s))).Release() as i32 }
    }
}

/// Save the original device functions and point the vtable at the hooks.
pub unsafe fn hook_device(device: *mut IDirect3DDevice9) -> Result<HookDirect3D9Device> {
    write_log_file(&format!("hooking new device: {:x}", device as usize));
    if device.is_null() {
        return Err(HookError::D3D9DeviceHookFailed);
    }

    let vtbl = (*device).lpVtbl as *mut IDirect3DDevice9Vtbl;
    write_log_file(&format!("device vtbl: {:x}", vtbl as usize));
    let vsize = std::mem::size_of::<IDirect3DDevice9Vtbl>();

    if (*vtbl).SetTexture as usize == hook_set_texture as usize {
        write_log_file("error: device already appears to be hooked, skipping");
        return Err(HookError::D3D9DeviceHookFailed);
    }

    let real = HookDirect3D9Device {
        real_create_texture: (*vtbl).CreateTexture,
        real_create_render_target: (*vtbl).CreateRenderTarget,
        real_create_depth_stencil_surface: (*vtbl).CreateDepthStencilSurface,
        real_set_texture: (*vtbl).SetTexture,
        real_set_render_target: (*vtbl).SetRenderTarget,
        real_set_depth_stencil_surface: (*vtbl).SetDepthStencilSurface,
        real_stretch_rect: (*vtbl).StretchRect,
        real_present: (*vtbl).Present,
        real_reset: (*vtbl).Reset,
        real_draw_primitive: (*vtbl).DrawPrimitive,
        real_draw_indexed_primitive: (*vtbl).DrawIndexedPrimitive,
        real_draw_primitive_up: (*vtbl).DrawPrimitiveUP,
        real_draw_indexed_primitive_up: (*vtbl).DrawIndexedPrimitiveUP,
    };

    let old_prot = unprotect_memory(vtbl as *mut c_void, vsize)?;

    (*vtbl).CreateTexture = hook_create_texture;
    (*vtbl).CreateRenderTarget = hook_create_render_target;
    (*vtbl).CreateDepthStencilSurface = hook_create_depth_stencil_surface;
    (*vtbl).SetTexture = hook_set_texture;
    (*vtbl).SetRenderTarget = hook_set_render_target;
    (*vtbl).SetDepthStencilSurface = hook_set_depth_stencil_surface;
    (*vtbl).StretchRect = hook_stretch_rect;
    (*vtbl).Present = hook_present;
    (*vtbl).Reset = hook_reset;
    (*vtbl).DrawPrimitive = hook_draw_primitive;
    (*vtbl).DrawIndexedPrimitive = hook_draw_indexed_primitive;
    (*vtbl).DrawPrimitiveUP = hook_draw_primitive_up;
    (*vtbl).DrawIndexedPrimitiveUP = hook_draw_indexed_primitive_up;

    protect_memory(vtbl as *mut c_void, vsize, old_prot)?;

    Ok(real)
}
