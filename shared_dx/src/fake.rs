//! In-memory device and codec.  Every call is recorded, handles are plain counters and
//! reference counts are tracked per object so tests can check that the fix releases exactly
//! what it acquired.  Clones share state, so one clone can serve as the device while another
//! (wrapped in an Arc) serves as the codec.
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use fnv::FnvHashMap;

use crate::defs::*;
use crate::error::DxResult;
use crate::types::*;

/// Dimensions reported for any image file on disk.
pub const FILE_IMAGE_SIZE: u32 = 512;
pub const FILE_IMAGE_LEVELS: u32 = 10;

#[derive(Clone, Debug, PartialEq)]
pub enum FakeCall {
    CreateTexture(TextureDesc),
    CreateRenderTarget(SurfaceDesc),
    CreateDepthStencilSurface(SurfaceDesc),
    SetTexture(u32, Option<TexPtr>),
    SetRenderTarget(u32, Option<SurfPtr>),
    SetDepthStencilSurface(Option<SurfPtr>),
    SetSamplerState(u32, u32, u32),
    StretchRect(SurfPtr, SurfPtr, u32),
    UpdateTexture(TexPtr, TexPtr),
    DecodeMemory(TexLoadParams),
    LoadFile(PathBuf),
    FileInfo(PathBuf),
    SaveTexture(PathBuf, u32),
}

struct FakeState {
    next_handle: usize,
    refs: FnvHashMap<usize, i32>,
    textures: FnvHashMap<usize, TextureDesc>,
    surfaces: FnvHashMap<usize, SurfaceDesc>,
    level0: FnvHashMap<usize, usize>,
    calls: Vec<FakeCall>,
    fail_surfaces: bool,
    fail_file_loads: bool,
    fail_decodes: bool,
    image_format: D3DFORMAT,
}

impl FakeState {
    fn alloc(&mut self) -> usize {
        let h = self.next_handle;
        self.next_handle += 0x10;
        self.refs.insert(h, 1);
        h
    }

    fn new_texture(&mut self, desc: TextureDesc) -> TexPtr {
        let h = self.alloc();
        self.textures.insert(h, desc);
        TexPtr(h)
    }

    fn new_surface(&mut self, desc: SurfaceDesc) -> SurfPtr {
        let h = self.alloc();
        self.surfaces.insert(h, desc);
        SurfPtr(h)
    }

    fn add_ref(&mut self, h: usize) -> i32 {
        let r = self.refs.entry(h).or_insert(0);
        *r += 1;
        *r
    }

    fn release(&mut self, h: usize) -> i32 {
        let r = self.refs.entry(h).or_insert(0);
        *r -= 1;
        *r
    }

    fn decoded_texture(&mut self, params: &TexLoadParams) -> TexPtr {
        let pick = |v: u32, default: u32| {
            if v == 0 || v >= D3DX_FROM_FILE {
                default
            } else {
                v
            }
        };
        let format = match params.format {
            D3DFMT_UNKNOWN | D3DFMT_FROM_FILE => self.image_format,
            f => f,
        };
        let desc = TextureDesc {
            width: pick(params.width, 256),
            height: pick(params.height, 256),
            levels: pick(params.mip_levels, 9),
            usage: params.usage,
            format,
            pool: params.pool,
        };
        self.new_texture(desc)
    }
}

#[derive(Clone)]
pub struct FakeGpu {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGpu {
    pub fn new() -> Self {
        FakeGpu {
            state: Arc::new(Mutex::new(FakeState {
                next_handle: 0x1000,
                refs: FnvHashMap::default(),
                textures: FnvHashMap::default(),
                surfaces: FnvHashMap::default(),
                level0: FnvHashMap::default(),
                calls: vec![],
                fail_surfaces: false,
                fail_file_loads: false,
                fail_decodes: false,
                image_format: D3DFMT_DXT1,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        // a test that panicked while holding the lock has already failed; keep going so the
        // remaining assertions report something useful
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn device_ptr() -> DevicePtr {
        DevicePtr(0xD3D9)
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn count_calls<F: Fn(&FakeCall) -> bool>(&self, f: F) -> usize {
        self.lock().calls.iter().filter(|c| f(c)).count()
    }

    pub fn decodes(&self) -> usize {
        self.count_calls(|c| matches!(c, FakeCall::DecodeMemory(_)))
    }

    pub fn stretch_rects(&self) -> usize {
        self.count_calls(|c| matches!(c, FakeCall::StretchRect(..)))
    }

    pub fn last_call(&self) -> Option<FakeCall> {
        self.lock().calls.last().cloned()
    }

    pub fn ref_count(&self, handle: usize) -> i32 {
        self.lock().refs.get(&handle).copied().unwrap_or(0)
    }

    pub fn texture_desc(&self, tex: TexPtr) -> Option<TextureDesc> {
        self.lock().textures.get(&tex.0).copied()
    }

    /// Create a texture directly, as if the game had obtained it some other way.
    pub fn make_texture(&self, desc: TextureDesc) -> TexPtr {
        self.lock().new_texture(desc)
    }

    pub fn make_surface(&self, desc: SurfaceDesc) -> SurfPtr {
        self.lock().new_surface(desc)
    }

    pub fn set_fail_surfaces(&self, fail: bool) {
        self.lock().fail_surfaces = fail;
    }

    pub fn set_fail_file_loads(&self, fail: bool) {
        self.lock().fail_file_loads = fail;
    }

    pub fn set_fail_decodes(&self, fail: bool) {
        self.lock().fail_decodes = fail;
    }

    pub fn set_image_format(&self, format: D3DFORMAT) {
        self.lock().image_format = format;
    }
}

impl D3D9Device for FakeGpu {
    fn create_texture(
        &mut self,
        _device: DevicePtr,
        desc: &TextureDesc,
        _shared_handle: usize,
    ) -> DxResult<TexPtr> {
        let mut st = self.lock();
        st.calls.push(FakeCall::CreateTexture(*desc));
        Ok(st.new_texture(*desc))
    }

    fn create_render_target(
        &mut self,
        _device: DevicePtr,
        desc: &SurfaceDesc,
        _lockable: bool,
        _shared_handle: usize,
    ) -> DxResult<SurfPtr> {
        let mut st = self.lock();
        st.calls.push(FakeCall::CreateRenderTarget(*desc));
        if st.fail_surfaces {
            return Err(D3DERR_NOTAVAILABLE);
        }
        let desc = SurfaceDesc {
            usage: D3DUSAGE_RENDERTARGET,
            ..*desc
        };
        Ok(st.new_surface(desc))
    }

    fn create_depth_stencil_surface(
        &mut self,
        _device: DevicePtr,
        desc: &SurfaceDesc,
        _discard: bool,
        _shared_handle: usize,
    ) -> DxResult<SurfPtr> {
        let mut st = self.lock();
        st.calls.push(FakeCall::CreateDepthStencilSurface(*desc));
        if st.fail_surfaces {
            return Err(D3DERR_NOTAVAILABLE);
        }
        let desc = SurfaceDesc {
            usage: D3DUSAGE_DEPTHSTENCIL,
            ..*desc
        };
        Ok(st.new_surface(desc))
    }

    fn set_texture(&mut self, _device: DevicePtr, sampler: u32, tex: Option<TexPtr>) -> HRESULT {
        self.lock().calls.push(FakeCall::SetTexture(sampler, tex));
        S_OK
    }

    fn set_render_target(
        &mut self,
        _device: DevicePtr,
        index: u32,
        surf: Option<SurfPtr>,
    ) -> HRESULT {
        self.lock().calls.push(FakeCall::SetRenderTarget(index, surf));
        S_OK
    }

    fn set_depth_stencil_surface(&mut self, _device: DevicePtr, surf: Option<SurfPtr>) -> HRESULT {
        self.lock().calls.push(FakeCall::SetDepthStencilSurface(surf));
        S_OK
    }

    fn set_sampler_state(
        &mut self,
        _device: DevicePtr,
        sampler: u32,
        state: u32,
        value: u32,
    ) -> HRESULT {
        self.lock()
            .calls
            .push(FakeCall::SetSamplerState(sampler, state, value));
        S_OK
    }

    fn stretch_rect(
        &mut self,
        _device: DevicePtr,
        src: SurfPtr,
        _src_rect: Option<&Rect>,
        dest: SurfPtr,
        _dest_rect: Option<&Rect>,
        filter: u32,
    ) -> HRESULT {
        self.lock().calls.push(FakeCall::StretchRect(src, dest, filter));
        S_OK
    }

    fn update_texture(&mut self, _device: DevicePtr, src: TexPtr, dest: TexPtr) -> HRESULT {
        let mut st = self.lock();
        st.calls.push(FakeCall::UpdateTexture(src, dest));
        let (s, d) = match (st.textures.get(&src.0), st.textures.get(&dest.0)) {
            (Some(s), Some(d)) => (*s, *d),
            _ => return D3DERR_INVALIDCALL,
        };
        // system memory into video memory only, same top level and format
        if s.pool != D3DPOOL_SYSTEMMEM
            || d.pool != D3DPOOL_DEFAULT
            || (s.width, s.height, s.format) != (d.width, d.height, d.format)
            || s.levels < d.levels
        {
            return D3DERR_INVALIDCALL;
        }
        S_OK
    }

    fn get_surface_level(&mut self, tex: TexPtr, level: u32) -> DxResult<SurfPtr> {
        let mut st = self.lock();
        let tdesc = match st.textures.get(&tex.0) {
            Some(d) => *d,
            None => return Err(D3DERR_INVALIDCALL),
        };
        if level != 0 {
            // only the top level is ever requested
            return Err(D3DERR_INVALIDCALL);
        }
        if let Some(&s) = st.level0.get(&tex.0) {
            st.add_ref(s);
            return Ok(SurfPtr(s));
        }
        let surf = st.new_surface(SurfaceDesc {
            width: tdesc.width,
            height: tdesc.height,
            format: tdesc.format,
            usage: tdesc.usage,
            pool: tdesc.pool,
            multisample: D3DMULTISAMPLE_NONE,
            multisample_quality: 0,
        });
        st.level0.insert(tex.0, surf.0);
        Ok(surf)
    }

    fn surface_desc(&mut self, surf: SurfPtr) -> DxResult<SurfaceDesc> {
        self.lock()
            .surfaces
            .get(&surf.0)
            .copied()
            .ok_or(D3DERR_INVALIDCALL)
    }

    fn level_count(&mut self, tex: TexPtr) -> u32 {
        self.lock()
            .textures
            .get(&tex.0)
            .map(|d| d.levels.max(1))
            .unwrap_or(0)
    }

    fn add_ref_texture(&mut self, tex: TexPtr) -> u32 {
        self.lock().add_ref(tex.0).max(0) as u32
    }

    fn release_texture(&mut self, tex: TexPtr) -> i32 {
        self.lock().release(tex.0)
    }

    fn release_surface(&mut self, surf: SurfPtr) -> i32 {
        self.lock().release(surf.0)
    }
}

impl TextureCodec for FakeGpu {
    fn create_texture_from_file_in_memory_ex(
        &self,
        _device: DevicePtr,
        _data: &[u8],
        params: &TexLoadParams,
        _out: LoadOutParams,
    ) -> DxResult<TexPtr> {
        let mut st = self.lock();
        st.calls.push(FakeCall::DecodeMemory(*params));
        if st.fail_decodes {
            return Err(D3DERR_INVALIDCALL);
        }
        Ok(st.decoded_texture(params))
    }

    fn create_texture_from_file(&self, _device: DevicePtr, path: &Path) -> DxResult<TexPtr> {
        let mut st = self.lock();
        st.calls.push(FakeCall::LoadFile(path.to_path_buf()));
        if st.fail_file_loads {
            return Err(D3DERR_INVALIDCALL);
        }
        Ok(st.decoded_texture(&TexLoadParams::default()))
    }

    fn create_texture_from_file_ex(
        &self,
        _device: DevicePtr,
        path: &Path,
        params: &TexLoadParams,
        _out: LoadOutParams,
    ) -> DxResult<TexPtr> {
        let mut st = self.lock();
        st.calls.push(FakeCall::LoadFile(path.to_path_buf()));
        if st.fail_file_loads {
            return Err(D3DERR_INVALIDCALL);
        }
        Ok(st.decoded_texture(params))
    }

    fn save_texture_to_file(&self, path: &Path, file_format: u32, _tex: TexPtr) -> HRESULT {
        self.lock()
            .calls
            .push(FakeCall::SaveTexture(path.to_path_buf(), file_format));
        S_OK
    }

    fn image_info_from_file_in_memory(&self, _data: &[u8]) -> DxResult<ImageInfo> {
        let st = self.lock();
        Ok(ImageInfo {
            width: 256,
            height: 256,
            depth: 1,
            mip_levels: 1,
            format: st.image_format,
        })
    }

    fn image_info_from_file(&self, path: &Path) -> DxResult<ImageInfo> {
        let mut st = self.lock();
        st.calls.push(FakeCall::FileInfo(path.to_path_buf()));
        if st.fail_file_loads {
            return Err(D3DERR_INVALIDCALL);
        }
        Ok(ImageInfo {
            width: FILE_IMAGE_SIZE,
            height: FILE_IMAGE_SIZE,
            depth: 1,
            mip_levels: FILE_IMAGE_LEVELS,
            format: st.image_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_refcounts() {
        let gpu = FakeGpu::new();
        let mut dev = gpu.clone();
        let tex = dev
            .create_texture(FakeGpu::device_ptr(), &TextureDesc::default(), 0)
            .unwrap();
        assert_eq!(gpu.ref_count(tex.0), 1);
        assert_eq!(dev.add_ref_texture(tex), 2);
        assert_eq!(dev.release_texture(tex), 1);
        assert_eq!(dev.release_texture(tex), 0);
        assert_eq!(dev.release_texture(tex), -1);
    }

    #[test]
    fn test_fake_surface_level_is_stable() {
        let gpu = FakeGpu::new();
        let mut dev = gpu.clone();
        let desc = TextureDesc {
            width: 64,
            height: 32,
            levels: 1,
            usage: D3DUSAGE_RENDERTARGET,
            format: D3DFMT_A8R8G8B8,
            pool: D3DPOOL_DEFAULT,
        };
        let tex = gpu.make_texture(desc);
        let a = dev.get_surface_level(tex, 0).unwrap();
        let b = dev.get_surface_level(tex, 0).unwrap();
        assert_eq!(a, b);
        assert_eq!(gpu.ref_count(a.0), 2);
        let sd = dev.surface_desc(a).unwrap();
        assert_eq!((sd.width, sd.height, sd.format), (64, 32, D3DFMT_A8R8G8B8));
        assert!(dev.get_surface_level(TexPtr(1), 0).is_err());
    }

    #[test]
    fn test_fake_update_texture_pools() {
        let gpu = FakeGpu::new();
        let mut dev = gpu.clone();
        let desc = TextureDesc {
            width: 128,
            height: 128,
            levels: 8,
            usage: 0,
            format: D3DFMT_DXT5,
            pool: D3DPOOL_SYSTEMMEM,
        };
        let src = gpu.make_texture(desc);
        let vid = gpu.make_texture(TextureDesc {
            usage: D3DUSAGE_DYNAMIC,
            pool: D3DPOOL_DEFAULT,
            ..desc
        });
        let managed = gpu.make_texture(TextureDesc {
            pool: D3DPOOL_MANAGED,
            ..desc
        });
        let smaller = gpu.make_texture(TextureDesc {
            width: 64,
            pool: D3DPOOL_DEFAULT,
            ..desc
        });
        let dev_ptr = FakeGpu::device_ptr();
        assert_eq!(dev.update_texture(dev_ptr, src, vid), S_OK);
        assert_eq!(dev.update_texture(dev_ptr, src, managed), D3DERR_INVALIDCALL);
        assert_eq!(dev.update_texture(dev_ptr, vid, src), D3DERR_INVALIDCALL);
        assert_eq!(dev.update_texture(dev_ptr, src, smaller), D3DERR_INVALIDCALL);
    }
}
