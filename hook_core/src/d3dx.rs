use std::path::Path;
use std::ptr::null_mut;

use winapi::shared::d3d9::*;
use winapi::shared::d3d9types::*;
use winapi::shared::minwindef::*;
use winapi::um::winnt::{HRESULT, LPCWSTR};
use winapi::um::wingdi::PALETTEENTRY;

use shared_dx::defs::E_FAIL;
use shared_dx::error::*;
use shared_dx::types::*;
use shared_dx::util::write_log_file;

use crate::util::{self, to_wide_str, ReentryGuard};

pub const D3DX_DLL: &str = "d3dx9_43.dll";

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct D3DXIMAGE_INFO {
    pub Width: UINT,
    pub Height: UINT,
    pub Depth: UINT,
    pub MipLevels: UINT,
    pub Format: D3DFORMAT,
    pub ResourceType: D3DRESOURCETYPE,
    pub ImageFileFormat: UINT,
}

pub type D3DXCreateTextureFromFileInMemoryExFn = unsafe extern "system" fn(
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
) -> HRESULT;

pub type D3DXCreateTextureFromFileWFn = unsafe extern "system" fn(
    pDevice: *mut IDirect3DDevice9,
    pSrcFile: LPCWSTR,
    ppTexture: *mut *mut IDirect3DTexture9,
) -> HRESULT;

pub type D3DXCreateTextureFromFileExWFn = unsafe extern "system" fn(
    pDevice: *mut IDirect3DDevice9,
    pSrcFile: LPCWSTR,
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
) -> HRESULT;

pub type D3DXSaveTextureToFileWFn = unsafe extern "system" fn(
    pDestFile: LPCWSTR,
    DestFormat: UINT,
    pSrcTexture: *mut IDirect3DBaseTexture9,
    pSrcPalette: *const PALETTEENTRY,
) -> HRESULT;

pub type D3DXGetImageInfoFromFileInMemoryFn = unsafe extern "system" fn(
    pSrcData: LPCVOID,
    SrcDataSize: UINT,
    pSrcInfo: *mut D3DXIMAGE_INFO,
) -> HRESULT;

pub type D3DXGetImageInfoFromFileWFn =
    unsafe extern "system" fn(pSrcFile: LPCWSTR, pSrcInfo: *mut D3DXIMAGE_INFO) -> HRESULT;

/// D3DX entry points.  `D3DXCreateTextureFromFileInMemoryEx` is replaced by the original
/// (unhooked) function once the export hook is installed.
#[derive(Clone, Copy)]
pub struct D3DX9Fn {
    pub D3DXCreateTextureFromFileInMemoryEx: D3DXCreateTextureFromFileInMemoryExFn,
    pub D3DXCreateTextureFromFileW: D3DXCreateTextureFromFileWFn,
    pub D3DXCreateTextureFromFileExW: D3DXCreateTextureFromFileExWFn,
    pub D3DXSaveTextureToFileW: D3DXSaveTextureToFileWFn,
    pub D3DXGetImageInfoFromFileInMemory: D3DXGetImageInfoFromFileInMemoryFn,
    pub D3DXGetImageInfoFromFileW: D3DXGetImageInfoFromFileWFn,
}

pub fn load_lib() -> Result<D3DX9Fn> {
    let handle = util::load_lib(D3DX_DLL)?;
    unsafe {
        Ok(D3DX9Fn {
            D3DXCreateTextureFromFileInMemoryEx: std::mem::transmute(util::get_proc_address(
                handle,
                "D3DXCreateTextureFromFileInMemoryEx",
            )?),
            D3DXCreateTextureFromFileW: std::mem::transmute(util::get_proc_address(
                handle,
                "D3DXCreateTextureFromFileW",
            )?),
            D3DXCreateTextureFromFileExW: std::mem::transmute(util::get_proc_address(
                handle,
                "D3DXCreateTextureFromFileExW",
            )?),
            D3DXSaveTextureToFileW: std::mem::transmute(util::get_proc_address(
                handle,
                "D3DXSaveTextureToFileW",
            )?),
            D3DXGetImageInfoFromFileInMemory: std::mem::transmute(util::get_proc_address(
                handle,
                "D3DXGetImageInfoFromFileInMemory",
            )?),
            D3DXGetImageInfoFromFileW: std::mem::transmute(util::get_proc_address(
                handle,
                "D3DXGetImageInfoFromFileW",
            )?),
        })
    }
}

fn wide_path(path: &Path) -> Vec<u16> {
    to_wide_str(&path.to_string_lossy())
}

fn tex_result(hr: HRESULT, tex: *mut IDirect3DTexture9) -> DxResult<TexPtr> {
    if hr != 0 {
        Err(hr)
    } else if tex.is_null() {
        Err(E_FAIL)
    } else {
        Ok(TexPtr(tex as usize))
    }
}

fn image_info(hr: HRESULT, info: &D3DXIMAGE_INFO) -> DxResult<ImageInfo> {
    if hr != 0 {
        return Err(hr);
    }
    Ok(ImageInfo {
        width: info.Width,
        height: info.Height,
        depth: info.Depth,
        mip_levels: info.MipLevels,
        format: info.Format,
    })
}

/// D3DX-backed codec.  Every call holds a `ReentryGuard`, so the device calls D3DX makes
/// internally (on this thread or a loader thread) bypass the fix.
pub struct D3dxCodec {
    pub fns: D3DX9Fn,
}

impl TextureCodec for D3dxCodec {
    fn create_texture_from_file_in_memory_ex(
        &self,
        device: DevicePtr,
        data: &[u8],
        params: &TexLoadParams,
        out: LoadOutParams,
    ) -> DxResult<TexPtr> {
        let _guard = ReentryGuard::enter();
        let mut tex: *mut IDirect3DTexture9 = null_mut();
        let hr = unsafe {
            (self.fns.D3DXCreateTextureFromFileInMemoryEx)(
                device.0 as *mut IDirect3DDevice9,
                data.as_ptr() as LPCVOID,
                data.len() as UINT,
                params.width,
                params.height,
                params.mip_levels,
                params.usage,
                params.format,
                params.pool,
                params.filter,
                params.mip_filter,
                params.color_key,
                out.src_info as *mut D3DXIMAGE_INFO,
                out.palette as *mut PALETTEENTRY,
                &mut tex,
            )
        };
        tex_result(hr, tex)
    }

    fn create_texture_from_file(&self, device: DevicePtr, path: &Path) -> DxResult<TexPtr> {
        let _guard = ReentryGuard::enter();
        let wpath = wide_path(path);
        let mut tex: *mut IDirect3DTexture9 = null_mut();
        let hr = unsafe {
            (self.fns.D3DXCreateTextureFromFileW)(
                device.0 as *mut IDirect3DDevice9,
                wpath.as_ptr(),
                &mut tex,
            )
        };
        tex_result(hr, tex)
    }

    fn create_texture_from_file_ex(
        &self,
        device: DevicePtr,
        path: &Path,
        params: &TexLoadParams,
        out: LoadOutParams,
    ) -> DxResult<TexPtr> {
        let _guard = ReentryGuard::enter();
        let wpath = wide_path(path);
        let mut tex: *mut IDirect3DTexture9 = null_mut();
        let hr = unsafe {
            (self.fns.D3DXCreateTextureFromFileExW)(
                device.0 as *mut IDirect3DDevice9,
                wpath.as_ptr(),
                params.width,
                params.height,
                params.mip_levels,
                params.usage,
                params.format,
                params.pool,
                params.filter,
                params.mip_filter,
                params.color_key,
                out.src_info as *mut D3DXIMAGE_INFO,
                out.palette as *mut PALETTEENTRY,
                &mut tex,
            )
        };
        tex_result(hr, tex)
    }

    fn save_texture_to_file(&self, path: &Path, file_format: u32, tex: TexPtr) -> HRESULT {
        let _guard = ReentryGuard::enter();
        let wpath = wide_path(path);
        let hr = unsafe {
            (self.fns.D3DXSaveTextureToFileW)(
                wpath.as_ptr(),
                file_format,
                tex.0 as *mut IDirect3DBaseTexture9,
                std::ptr::null(),
            )
        };
        if hr != 0 {
            write_log_file(&format!("D3DXSaveTextureToFileW {:?} failed: {:x}", path, hr));
        }
        hr
    }

    fn image_info_from_file_in_memory(&self, data: &[u8]) -> DxResult<ImageInfo> {
        let mut info = D3DXIMAGE_INFO::default();
        let hr = unsafe {
            (self.fns.D3DXGetImageInfoFromFileInMemory)(
                data.as_ptr() as LPCVOID,
                data.len() as UINT,
                &mut info,
            )
        };
        image_info(hr, &info)
    }

    fn image_info_from_file(&self, path: &Path) -> DxResult<ImageInfo> {
        let wpath = wide_path(path);
        let mut info = D3DXIMAGE_INFO::default();
        let hr = unsafe { (self.fns.D3DXGetImageInfoFromFileW)(wpath.as_ptr(), &mut info) };
        image_info(hr, &info)
    }
}
