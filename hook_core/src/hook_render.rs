/*
Device and D3DX detours.  Each one forwards to the render fix when the call comes from outside
the fix, and straight to the saved original otherwise (see `ReentryGuard`).  All of this runs
on the game's render thread; loader threads only ever reach the originals.
 */
use std::path::PathBuf;
use std::ptr::{addr_of_mut, null_mut};
use std::sync::Arc;

use winapi::ctypes::c_void;
use winapi::shared::d3d9::*;
use winapi::shared::d3d9types::*;
use winapi::shared::minwindef::*;
use winapi::shared::windef::{HWND, RECT};
use winapi::shared::winerror::{E_FAIL, S_OK};
use winapi::um::wingdi::{PALETTEENTRY, RGNDATA};
use winapi::um::winnt::{HANDLE, HRESULT, LPCSTR, LPCWSTR, VOID};

use shared_dx::error::*;
use shared_dx::types::*;
use shared_dx::util::{set_log_file_path, write_log_file};

use crate::d3dx::{self, D3DXCreateTextureFromFileInMemoryExFn, D3DXIMAGE_INFO, D3DX_DLL};
use crate::fix_config::FixConfig;
use crate::hook_device::{hook_device, HookDirect3D9Device};
use crate::render_fix::RenderFix;
use crate::util::{from_wide_ptr, ReentryGuard};

pub const LOG_FILE: &str = "TSFix.log";

/// Host-supplied inline hook installer: patch `symbol` in `module` to jump to `detour`, and
/// store a callable pointer to the original in `*original`.
pub type InstallHookFn = unsafe extern "system" fn(
    module: LPCWSTR,
    symbol: LPCSTR,
    detour: *mut c_void,
    original: *mut *mut c_void,
) -> BOOL;

static mut DEVICE_REALFN: Option<HookDirect3D9Device> = None;
static mut D3DX_REALFN: Option<D3DXCreateTextureFromFileInMemoryExFn> = None;
static mut RENDER_FIX: Option<RenderFix> = None;

fn real() -> Option<HookDirect3D9Device> {
    unsafe { *addr_of_mut!(DEVICE_REALFN) }
}

fn render_fix() -> Option<&'static mut RenderFix> {
    unsafe { (*addr_of_mut!(RENDER_FIX)).as_mut() }
}

/// The fix, unless this call is a re-entrant one.
fn enter() -> Option<(ReentryGuard, &'static mut RenderFix)> {
    let fix = render_fix()?;
    let guard = ReentryGuard::enter()?;
    Some((guard, fix))
}

fn dptr(device: *mut IDirect3DDevice9) -> DevicePtr {
    DevicePtr(device as usize)
}

fn sptr(s: *mut IDirect3DSurface9) -> Option<SurfPtr> {
    if s.is_null() {
        None
    } else {
        Some(SurfPtr(s as usize))
    }
}

unsafe fn rect(r: *const RECT) -> Option<Rect> {
    r.as_ref().map(|r| Rect {
        left: r.left,
        top: r.top,
        right: r.right,
        bottom: r.bottom,
    })
}

/// Write a created object to the caller's out pointer and convert to an HRESULT.
unsafe fn out_result<T, P>(res: DxResult<T>, out: *mut *mut P, to_ptr: fn(T) -> usize) -> HRESULT {
    match res {
        Ok(v) => {
            if !out.is_null() {
                *out = to_ptr(v) as *mut P;
            }
            S_OK
        }
        Err(hr) => hr,
    }
}

pub unsafe extern "system" fn hook_create_texture(
    THIS: *mut IDirect3DDevice9,
    Width: UINT,
    Height: UINT,
    Levels: UINT,
    Usage: DWORD,
    Format: D3DFORMAT,
    Pool: D3DPOOL,
    ppTexture: *mut *mut IDirect3DTexture9,
    pSharedHandle: *mut HANDLE,
) -> HRESULT {
    let real = match real() {
        Some(r) => r,
        None => return E_FAIL,
    };
    let (_guard, fix) = match enter() {
        Some(x) => x,
        None => {
            return (real.real_create_texture)(
                THIS, Width, Height, Levels, Usage, Format, Pool, ppTexture, pSharedHandle,
            )
        }
    };
    let desc = TextureDesc {
        width: Width,
        height: Height,
        levels: Levels,
        usage: Usage,
        format: Format,
        pool: Pool,
    };
    let res = fix.create_texture(dptr(THIS), &desc, pSharedHandle as usize);
    out_result(res, ppTexture, |t| t.0)
}

pub unsafe extern "system" fn hook_create_render_target(
    THIS: *mut IDirect3DDevice9,
    Width: UINT,
    Height: UINT,
    Format: D3DFORMAT,
    MultiSample: D3DMULTISAMPLE_TYPE,
    MultisampleQuality: DWORD,
    Lockable: BOOL,
    ppSurface: *mut *mut IDirect3DSurface9,
    pSharedHandle: *mut HANDLE,
) -> HRESULT {
    let real = match real() {
        Some(r) => r,
        None => return E_FAIL,
    };
    let (_guard, fix) = match enter() {
        Some(x) => x,
        None => {
            return (real.real_create_render_target)(
                THIS, Width, Height, Format, MultiSample, MultisampleQuality, Lockable, ppSurface,
                pSharedHandle,
            )
        }
    };
    let desc = SurfaceDesc {
        width: Width,
        height: Height,
        format: Format,
        usage: D3DUSAGE_RENDERTARGET,
        pool: D3DPOOL_DEFAULT,
        multisample: MultiSample,
        multisample_quality: MultisampleQuality,
    };
    let res = fix.create_render_target(dptr(THIS), &desc, Lockable != 0, pSharedHandle as usize);
    out_result(res, ppSurface, |s| s.0)
}

pub unsafe extern "system" fn hook_create_depth_stencil_surface(
    THIS: *mut IDirect3DDevice9,
    Width: UINT,
    Height: UINT,
    Format: D3DFORMAT,
    MultiSample: D3DMULTISAMPLE_TYPE,
    MultisampleQuality: DWORD,
    Discard: BOOL,
    ppSurface: *mut *mut IDirect3DSurface9,
    pSharedHandle: *mut HANDLE,
) -> HRESULT {
    let real = match real() {
        Some(r) => r,
        None => return E_FAIL,
    };
    let (_guard, fix) = match enter() {
        Some(x) => x,
        None => {
            return (real.real_create_depth_stencil_surface)(
                THIS, Width, Height, Format, MultiSample, MultisampleQuality, Discard, ppSurface,
                pSharedHandle,
            )
        }
    };
    let desc = SurfaceDesc {
        width: Width,
        height: Height,
        format: Format,
        usage: D3DUSAGE_DEPTHSTENCIL,
        pool: D3DPOOL_DEFAULT,
        multisample: MultiSample,
        multisample_quality: MultisampleQuality,
    };
    let res =
        fix.create_depth_stencil_surface(dptr(THIS), &desc, Discard != 0, pSharedHandle as usize);
    out_result(res, ppSurface, |s| s.0)
}

pub unsafe extern "system" fn hook_set_texture(
    THIS: *mut IDirect3DDevice9,
    Stage: DWORD,
    pTexture: *mut IDirect3DBaseTexture9,
) -> HRESULT {
    let real = match real() {
        Some(r) => r,
        None => return E_FAIL,
    };
    let (_guard, fix) = match enter() {
        Some(x) => x,
        None => return (real.real_set_texture)(THIS, Stage, pTexture),
    };
    let tex = if pTexture.is_null() {
        None
    } else {
        Some(TexPtr(pTexture as usize))
    };
    fix.set_texture(dptr(THIS), Stage, tex)
}

pub unsafe extern "system" fn hook_set_render_target(
    THIS: *mut IDirect3DDevice9,
    RenderTargetIndex: DWORD,
    pRenderTarget: *mut IDirect3DSurface9,
) -> HRESULT {
    let real = match real() {
        Some(r) => r,
        None => return E_FAIL,
    };
    let (_guard, fix) = match enter() {
        Some(x) => x,
        None => return (real.real_set_render_target)(THIS, RenderTargetIndex, pRenderTarget),
    };
    fix.set_render_target(dptr(THIS), RenderTargetIndex, sptr(pRenderTarget))
}

pub unsafe extern "system" fn hook_set_depth_stencil_surface(
    THIS: *mut IDirect3DDevice9,
    pNewZStencil: *mut IDirect3DSurface9,
) -> HRESULT {
    let real = match real() {
        Some(r) => r,
        None => return E_FAIL,
    };
    let (_guard, fix) = match enter() {
        Some(x) => x,
        None => return (real.real_set_depth_stencil_surface)(THIS, pNewZStencil),
    };
    fix.set_depth_stencil_surface(dptr(THIS), sptr(pNewZStencil))
}

pub unsafe extern "system" fn hook_stretch_rect(
    THIS: *mut IDirect3DDevice9,
    pSourceSurface: *mut IDirect3DSurface9,
    pSourceRect: *const RECT,
    pDestSurface: *mut IDirect3DSurface9,
    pDestRect: *const RECT,
    Filter: D3DTEXTUREFILTERTYPE,
) -> HRESULT {
    let real = match real() {
        Some(r) => r,
        None => return E_FAIL,
    };
    let passthrough = pSourceSurface.is_null() || pDestSurface.is_null();
    let (_guard, fix) = match enter() {
        Some(x) if !passthrough => x,
        _ => {
            return (real.real_stretch_rect)(
                THIS,
                pSourceSurface,
                pSourceRect,
                pDestSurface,
                pDestRect,
                Filter,
            )
        }
    };
    let src_rect = rect(pSourceRect);
    let dest_rect = rect(pDestRect);
    fix.stretch_rect(
        dptr(THIS),
        SurfPtr(pSourceSurface as usize),
        src_rect.as_ref(),
        SurfPtr(pDestSurface as usize),
        dest_rect.as_ref(),
        Filter,
    )
}

pub unsafe extern "system" fn hook_present(
    THIS: *mut IDirect3DDevice9,
    pSourceRect: *const RECT,
    pDestRect: *const RECT,
    hDestWindowOverride: HWND,
    pDirtyRegion: *const RGNDATA,
) -> HRESULT {
    let real = match real() {
        Some(r) => r,
        None => return E_FAIL,
    };
    if let Some((_guard, fix)) = enter() {
        fix.end_frame(dptr(THIS));
    }
    (real.real_present)(THIS, pSourceRect, pDestRect, hDestWindowOverride, pDirtyRegion)
}

pub unsafe extern "system" fn hook_reset(
    THIS: *mut IDirect3DDevice9,
    pPresentationParameters: *mut D3DPRESENT_PARAMETERS,
) -> HRESULT {
    let real = match real() {
        Some(r) => r,
        None => return E_FAIL,
    };
    if let Some((_guard, fix)) = enter() {
        if dptr(THIS) == fix.device() {
            fix.reset();
        }
    }
    (real.real_reset)(THIS, pPresentationParameters)
}

fn note_draw(device: *mut IDirect3DDevice9) {
    if let Some((_guard, fix)) = enter() {
        fix.note_draw(dptr(device));
    }
}

pub unsafe extern "system" fn hook_draw_primitive(
    THIS: *mut IDirect3DDevice9,
    PrimitiveType: D3DPRIMITIVETYPE,
    StartVertex: UINT,
    PrimitiveCount: UINT,
) -> HRESULT {
    let real = match real() {
        Some(r) => r,
        None => return E_FAIL,
    };
    note_draw(THIS);
    (real.real_draw_primitive)(THIS, PrimitiveType, StartVertex, PrimitiveCount)
}

pub unsafe extern "system" fn hook_draw_indexed_primitive(
    THIS: *mut IDirect3DDevice9,
    PrimitiveType: D3DPRIMITIVETYPE,
    BaseVertexIndex: INT,
    MinVertexIndex: UINT,
    NumVertices: UINT,
    startIndex: UINT,
    primCount: UINT,
) -> HRESULT {
    let real = match real() {
        Some(r) => r,
        None => return E_FAIL,
    };
    note_draw(THIS);
    (real.real_draw_indexed_primitive)(
        THIS,
        PrimitiveType,
        BaseVertexIndex,
        MinVertexIndex,
        NumVertices,
        startIndex,
        primCount,
    )
}

pub unsafe extern "system" fn hook_draw_primitive_up(
    THIS: *mut IDirect3DDevice9,
    PrimitiveType: D3DPRIMITIVETYPE,
    PrimitiveCount: UINT,
    pVertexStreamZeroData: *const VOID,
    VertexStreamZeroStride: UINT,
) -> HRESULT {
    let real = match real() {
        Some(r) => r,
        None => return E_FAIL,
    };
    note_draw(THIS);
    (real.real_draw_primitive_up)(
        THIS,
        PrimitiveType,
        PrimitiveCount,
        pVertexStreamZeroData,
        VertexStreamZeroStride,
    )
}

pub unsafe extern "system" fn hook_draw_indexed_primitive_up(
    THIS: *mut IDirect3DDevice9,
    PrimitiveType: D3DPRIMITIVETYPE,
    MinVertexIndex: UINT,
    NumVertices: UINT,
    PrimitiveCount: UINT,
    pIndexData: *const VOID,
    IndexDataFormat: D3DFORMAT,
    pVertexStreamZeroData: *const VOID,
    VertexStreamZeroStride: UINT,
) -> HRESULT {
    let real = match real() {
        Some(r) => r,
        None => return E_FAIL,
    };
    note_draw(THIS);
    (real.real_draw_indexed_primitive_up)(
        THIS,
        PrimitiveType,
        MinVertexIndex,
        NumVertices,
        PrimitiveCount,
        pIndexData,
        IndexDataFormat,
        pVertexStreamZeroData,
        VertexStreamZeroStride,
    )
}

pub unsafe extern "system" fn hook_d3dx_create_texture_from_file_in_memory_ex(
    pDevice: *mut IDirect3DDevice9,
    pSrcData: LPCVOID,
    SrcDataSize: UINT,
    Width: UINT,
    Height: UINT,
    MipLevels: UINT,
    Usage: DWORD,
    Format: D3DFORMAT,
    Pool: D3DPOOL,
    Filter: DWORD,
    MipFilter: DWORD,
    ColorKey: D3DCOLOR,
    pSrcInfo: *mut D3DXIMAGE_INFO,
    pPalette: *mut PALETTEENTRY,
    ppTexture: *mut *mut IDirect3DTexture9,
) -> HRESULT {
    let original = match *addr_of_mut!(D3DX_REALFN) {
        Some(f) => f,
        None => return E_FAIL,
    };
    let entered = if pSrcData.is_null() { None } else { enter() };
    let (_guard, fix) = match entered {
        Some(x) => x,
        None => {
            return original(
                pDevice, pSrcData, SrcDataSize, Width, Height, MipLevels, Usage, Format, Pool,
                Filter, MipFilter, ColorKey, pSrcInfo, pPalette, ppTexture,
            )
        }
    };

    let data = std::slice::from_raw_parts(pSrcData as *const u8, SrcDataSize as usize);
    let params = TexLoadParams {
        width: Width,
        height: Height,
        mip_levels: MipLevels,
        usage: Usage,
        format: Format,
        pool: Pool,
        filter: Filter,
        mip_filter: MipFilter,
        color_key: ColorKey,
    };
    let out = LoadOutParams {
        src_info: pSrcInfo as usize,
        palette: pPalette as usize,
    };
    let res = fix.create_texture_from_file_in_memory_ex(dptr(pDevice), data, &params, out);
    out_result(res, ppTexture, |t| t.0)
}

unsafe fn init(
    device: *mut IDirect3DDevice9,
    root: LPCWSTR,
    install_hook: Option<InstallHookFn>,
) -> Result<()> {
    if (*addr_of_mut!(RENDER_FIX)).is_some() {
        return Err(HookError::BadStateError("already initialized".to_owned()));
    }
    let root = PathBuf::from(from_wide_ptr(root)?);

    // keep logging to the temp file if the game dir isn't writable
    if let Err(e) = set_log_file_path(&root.to_string_lossy(), LOG_FILE) {
        write_log_file(&format!("error setting log file path: {:?}", e));
    }

    let conf = FixConfig::load(&root)?;
    let mut fns = d3dx::load_lib()?;

    if let Some(install) = install_hook {
        let module: Vec<u16> = crate::util::to_wide_str(D3DX_DLL);
        let symbol = std::ffi::CString::new("D3DXCreateTextureFromFileInMemoryEx")?;
        let mut original: *mut c_void = null_mut();
        let ok = install(
            module.as_ptr(),
            symbol.as_ptr(),
            hook_d3dx_create_texture_from_file_in_memory_ex as *mut c_void,
            &mut original,
        );
        if ok == FALSE || original.is_null() {
            return Err(HookError::D3DXHookFailed(
                "D3DXCreateTextureFromFileInMemoryEx".to_owned(),
            ));
        }
        fns.D3DXCreateTextureFromFileInMemoryEx = std::mem::transmute(original);
        *addr_of_mut!(D3DX_REALFN) = Some(fns.D3DXCreateTextureFromFileInMemoryEx);
    } else {
        write_log_file("no hook installer given; texture loads won't be intercepted");
    }

    let hooked = match real() {
        Some(r) => r,
        None => {
            let r = hook_device(device)?;
            *addr_of_mut!(DEVICE_REALFN) = Some(r);
            r
        }
    };

    let fix = RenderFix::new(
        conf,
        &root,
        dptr(device),
        Box::new(hooked),
        Arc::new(d3dx::D3dxCodec { fns }),
    )?;
    *addr_of_mut!(RENDER_FIX) = Some(fix);
    write_log_file(&format!(
        "hooked device {:x} on thread {:?}",
        device as usize,
        std::thread::current().id()
    ));
    Ok(())
}

/// Attach the fix to `device`.  `root` is the game directory (config, font and texture tree).
/// Must be called on the render thread.
#[allow(unused)]
#[no_mangle]
pub unsafe extern "system" fn TSFix_Init(
    device: *mut IDirect3DDevice9,
    root: LPCWSTR,
    install_hook: Option<InstallHookFn>,
) -> HRESULT {
    match init(device, root, install_hook) {
        Ok(()) => S_OK,
        Err(e) => {
            write_log_file(&format!("TSFix init failed: {:?}", e));
            E_FAIL
        }
    }
}

/// Release everything the fix holds.  The device hooks stay in place and pass through.
#[allow(unused)]
#[no_mangle]
pub unsafe extern "system" fn TSFix_Shutdown() {
    let _guard = ReentryGuard::enter();
    if let Some(mut fix) = (*addr_of_mut!(RENDER_FIX)).take() {
        fix.shutdown();
    }
}
