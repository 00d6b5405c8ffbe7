/*
The interception context.  One `RenderFix` exists per managed device; every intercepted entry
point is a method on it.  Calls for any other device go straight through.

Ownership: the cache, the MSAA tables and the draw state are touched only from the render
thread, through `&mut self`.  The load queue is the one piece shared with worker threads.
 */
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use msaa::{decide, CreateDecision, CreationPolicy, MsaaConfig, MsaaManager, MsaaResetStats};
use shared_dx::defs::*;
use shared_dx::error::{DxResult, Result};
use shared_dx::format::{format_to_str, pool_to_str, usage_to_str};
use shared_dx::types::*;
use shared_dx::util::{elapsed_ms, log_timestamp, write_log_file};
use tex_cache::{checksum, CacheResetStats, TextureCache, TextureDirs};
use tex_load::{DestHandoff, LoadQueue};

use crate::fix_config::FixConfig;
use crate::frame_trace::FrameTracer;

/// Checksum of the game's font texture.
pub const FONT_CRC32: u32 = 0xef2d_9b55;
pub const FONT_FILE: &str = "font.dds";

/// Frame length used to express cache savings in frames (30 fps).
const FRAME_TIME_MS: f64 = 33.3;

/// UI textures below this size in either dimension skip mip generation; textures at or above
/// it get a full chain when `full_mipmaps` is on.
const MIP_POLICY_SIZE: u32 = 128;

/// Render state the game-specific code flips between passes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawState {
    pub draws: u32,
    /// New render targets may get a multisampled shadow.
    pub has_msaa: bool,
    /// Shadows are substituted and resolved.
    pub use_msaa: bool,
    /// While set, binding the first texture binds the second instead.
    pub blur_proxy: Option<(TexPtr, TexPtr)>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub cache: CacheResetStats,
    pub msaa: Option<MsaaResetStats>,
}

pub struct RenderFix {
    pub conf: FixConfig,
    device: DevicePtr,
    real: Box<dyn D3D9Device>,
    codec: Arc<dyn TextureCodec>,
    pub cache: TextureCache,
    pub msaa: MsaaManager,
    pub dirs: TextureDirs,
    load_queue: Arc<LoadQueue>,
    pub draw_state: DrawState,
    pub tracer: FrameTracer,
    pub font_tex: Option<TexPtr>,
    font_path: PathBuf,
    policy: CreationPolicy,
    frames: u64,
}

impl RenderFix {
    /// `root` is the game directory: the config, the font override and the texture tree are
    /// found relative to it.
    pub fn new(
        conf: FixConfig,
        root: &Path,
        device: DevicePtr,
        real: Box<dyn D3D9Device>,
        codec: Arc<dyn TextureCodec>,
    ) -> Result<Self> {
        write_log_file(&format!(
            "[ Tex. Mgr ] Texture manager starting at {}",
            log_timestamp()
        ));
        write_log_file(&format!("{}", conf));

        let tex_root = conf.texture_root(root);
        if conf.textures.dump {
            std::fs::create_dir_all(&tex_root)?;
        }
        let dirs = TextureDirs::enumerate(&tex_root)?;

        let msaa = MsaaManager::new(MsaaConfig {
            samples: conf.render.msaa_samples,
            quality: conf.render.msaa_quality,
            conservative: conf.render.conservative_msaa,
        });
        let policy = CreationPolicy {
            output_width: conf.render.output_width,
            output_height: conf.render.output_height,
            postproc_ratio: conf.render.postproc_ratio,
        };
        let draw_state = DrawState {
            has_msaa: msaa.enabled(),
            use_msaa: msaa.enabled(),
            ..DrawState::default()
        };

        Ok(RenderFix {
            cache: TextureCache::new(conf.textures.log),
            tracer: FrameTracer::new(conf.system.trace),
            font_path: root.join(FONT_FILE),
            conf,
            device,
            real,
            codec,
            msaa,
            dirs,
            load_queue: LoadQueue::new(),
            draw_state,
            font_tex: None,
            policy,
            frames: 0,
        })
    }

    pub fn device(&self) -> DevicePtr {
        self.device
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn pending_loads(&self) -> usize {
        self.load_queue.len()
    }

    fn msaa_active(&self) -> bool {
        self.msaa.active(self.draw_state.use_msaa)
    }

    pub fn create_texture(
        &mut self,
        device: DevicePtr,
        desc: &TextureDesc,
        shared_handle: usize,
    ) -> DxResult<TexPtr> {
        if device != self.device {
            return self.real.create_texture(device, desc, shared_handle);
        }

        let msaa_applicable = self.msaa.enabled() && self.draw_state.has_msaa;
        let (new_desc, shadow) = match decide(desc, msaa_applicable, &self.policy) {
            CreateDecision::Reject => return Err(E_FAIL),
            CreateDecision::Create { desc, shadow } => (desc, shadow),
        };

        if self.conf.textures.log {
            write_log_file(&format!(
                "[Load Trace] >> Creating Texture: ({} x {}), Format: {}, Usage: [{}], Pool: {}",
                desc.width,
                desc.height,
                format_to_str(desc.format, true),
                usage_to_str(desc.usage),
                pool_to_str(desc.pool)
            ));
        }

        let tex = self.real.create_texture(device, &new_desc, shared_handle)?;
        if shadow {
            self.msaa
                .create_shadow(self.real.as_mut(), device, tex, &new_desc);
        }
        Ok(tex)
    }

    pub fn create_render_target(
        &mut self,
        device: DevicePtr,
        desc: &SurfaceDesc,
        lockable: bool,
        shared_handle: usize,
    ) -> DxResult<SurfPtr> {
        if device == self.device {
            write_log_file(&format!(
                "[Unexpected][!] IDirect3DDevice9::CreateRenderTarget ({}, {}, {}, {}, {}, {})",
                desc.width,
                desc.height,
                desc.format,
                desc.multisample,
                desc.multisample_quality,
                lockable as u32
            ));
        }
        self.real
            .create_render_target(device, desc, lockable, shared_handle)
    }

    pub fn create_depth_stencil_surface(
        &mut self,
        device: DevicePtr,
        desc: &SurfaceDesc,
        discard: bool,
        shared_handle: usize,
    ) -> DxResult<SurfPtr> {
        if device == self.device {
            write_log_file(&format!(
                "[Unexpected][!] IDirect3DDevice9::CreateDepthStencilSurface ({}, {}, {}, {}, {}, {})",
                desc.width,
                desc.height,
                desc.format,
                desc.multisample,
                desc.multisample_quality,
                discard as u32
            ));
        }
        self.real
            .create_depth_stencil_surface(device, desc, discard, shared_handle)
    }

    pub fn set_texture(&mut self, device: DevicePtr, sampler: u32, tex: Option<TexPtr>) -> HRESULT {
        if device != self.device {
            return self.real.set_texture(device, sampler, tex);
        }

        self.tracer.set_texture(sampler, tex);

        if tex.is_some() && tex == self.font_tex {
            for state in [D3DSAMP_ADDRESSU, D3DSAMP_ADDRESSV, D3DSAMP_ADDRESSW] {
                self.real
                    .set_sampler_state(device, sampler, state, D3DTADDRESS_CLAMP);
            }
        }

        if let Some((from, proxy)) = self.draw_state.blur_proxy {
            if tex == Some(from) && from != proxy {
                self.tracer.proxy(from, proxy);
                return self.set_texture(device, sampler, Some(proxy));
            }
        }

        if let Some(t) = tex {
            if self.msaa_active() {
                let draws = self.draw_state.draws;
                self.msaa
                    .resolve_for_texture(self.real.as_mut(), device, t, draws);
            }
        }

        self.real.set_texture(device, sampler, tex)
    }

    pub fn set_render_target(
        &mut self,
        device: DevicePtr,
        index: u32,
        surf: Option<SurfPtr>,
    ) -> HRESULT {
        if device != self.device {
            return self.real.set_render_target(device, index, surf);
        }

        self.tracer.set_render_target(index, surf);

        let surf = if self.msaa_active() {
            self.msaa
                .bind_render_target(index, surf, self.draw_state.draws)
        } else {
            surf
        };
        self.real.set_render_target(device, index, surf)
    }

    pub fn set_depth_stencil_surface(&mut self, device: DevicePtr, surf: Option<SurfPtr>) -> HRESULT {
        if device != self.device {
            return self.real.set_depth_stencil_surface(device, surf);
        }

        self.tracer.set_depth_stencil(surf);

        let surf = if self.msaa_active() {
            self.msaa.substitute_depth_stencil(surf)
        } else {
            surf
        };
        self.real.set_depth_stencil_surface(device, surf)
    }

    pub fn stretch_rect(
        &mut self,
        device: DevicePtr,
        src: SurfPtr,
        src_rect: Option<&Rect>,
        dest: SurfPtr,
        dest_rect: Option<&Rect>,
        filter: u32,
    ) -> HRESULT {
        if device == self.device && self.tracer.wants_stretch_rect() {
            let src_desc = match src_rect {
                None => self.real.surface_desc(src).ok(),
                Some(_) => None,
            };
            let dest_desc = match dest_rect {
                None => self.real.surface_desc(dest).ok(),
                Some(_) => None,
            };
            self.tracer.stretch_rect(
                src_rect,
                src_desc.as_ref(),
                dest_rect,
                dest_desc.as_ref(),
            );
        }
        self.real
            .stretch_rect(device, src, src_rect, dest, dest_rect, filter)
    }

    /// Any draw call on the managed device.
    pub fn note_draw(&mut self, device: DevicePtr) {
        if device == self.device {
            self.draw_state.draws = self.draw_state.draws.wrapping_add(1);
        }
    }

    /// Present: resolve whatever is still dirty, then commit one background load.
    pub fn end_frame(&mut self, device: DevicePtr) {
        if device != self.device {
            return;
        }
        if self.msaa_active() {
            let draws = self.draw_state.draws;
            self.msaa
                .resolve_all_dirty(self.real.as_mut(), device, draws);
        }
        self.load_queue.drain_one(self.real.as_mut(), device);
        self.frames += 1;
    }

    /// Device reset: drop every reference the fix holds on device objects.
    pub fn reset(&mut self) -> ResetReport {
        let cache = self.cache.reset(self.real.as_mut());
        // released with the cache; the next font load sets it again
        self.font_tex = None;

        let msaa = if self.msaa.enabled() {
            Some(self.msaa.reset(self.real.as_mut()))
        } else {
            None
        };

        write_log_file("[ Tex. Mgr ] ----------- Finished ------------ ");
        ResetReport { cache, msaa }
    }

    pub fn shutdown(&mut self) -> ResetReport {
        while self
            .load_queue
            .drain_one(self.real.as_mut(), self.device)
            .is_some()
        {}

        let report = self.reset();

        let saved = self.cache.time_saved_ms();
        write_log_file(&format!(
            "[Perf Stats] At shutdown: {:7.2} seconds ({:7.2} frames) saved by cache",
            saved / 1000.0,
            saved / FRAME_TIME_MS
        ));
        write_log_file(&format!(
            "[Perf Stats] {} cache hits, {} MSAA resolves over {} frames",
            self.cache.hits(),
            self.msaa.resolves(),
            self.frames
        ));
        report
    }

    /// The D3DX in-memory loader, with cache, custom overrides and dumping layered on top.
    pub fn create_texture_from_file_in_memory_ex(
        &mut self,
        device: DevicePtr,
        data: &[u8],
        params: &TexLoadParams,
        out: LoadOutParams,
    ) -> DxResult<TexPtr> {
        if device != self.device {
            return self
                .codec
                .create_texture_from_file_in_memory_ex(device, data, params, out);
        }

        let start = Instant::now();
        let tconf = self.conf.textures.clone();
        let mut params = *params;

        let mut checksum = checksum(data);
        // never shared, never dumped
        if params.usage == D3DUSAGE_DYNAMIC || params.usage == D3DUSAGE_RENDERTARGET {
            checksum = 0;
        }

        if tconf.cache && checksum != 0 {
            if let Some(tex) = self.cache.acquire(self.real.as_mut(), checksum) {
                return Ok(tex);
            }
        }

        // D3DX can only read back dynamic textures when saving
        if params.pool == D3DPOOL_DEFAULT
            && tconf.dump
            && !self.dirs.is_dumped(checksum)
            && !self.dirs.is_custom(checksum)
        {
            params.usage = D3DUSAGE_DYNAMIC;
        }

        params.filter = D3DX_FILTER_LINEAR | D3DX_FILTER_DITHER;
        params.mip_filter = D3DX_FILTER_BOX;

        let mip_policy = params.pool == D3DPOOL_DEFAULT
            && params.usage != D3DUSAGE_DYNAMIC
            && !tconf.dump;
        if mip_policy
            && tconf.optimize_ui
            && (params.width < MIP_POLICY_SIZE || params.height < MIP_POLICY_SIZE)
        {
            params.mip_levels = 1;
        }
        if mip_policy
            && tconf.full_mipmaps
            && (params.width >= MIP_POLICY_SIZE || params.height >= MIP_POLICY_SIZE)
        {
            params.mip_levels = D3DX_DEFAULT;
        }

        let mut result: DxResult<TexPtr> = Err(E_FAIL);
        let mut pending: Option<Arc<DestHandoff>> = None;

        if checksum == FONT_CRC32 {
            result = self.load_font(device);
        } else if self.dirs.is_custom(checksum) {
            if tconf.async_custom {
                if let Some((handoff, placeholder)) =
                    self.queue_custom_load(device, checksum, &params)
                {
                    params = placeholder;
                    pending = Some(handoff);
                }
            }
            if pending.is_none() {
                result = self.load_custom(device, checksum, &params, out);
            }
        }

        let injected = result.is_ok() || pending.is_some();
        if result.is_err() {
            result = self
                .codec
                .create_texture_from_file_in_memory_ex(device, data, &params, out);
        }

        if let Some(handoff) = pending {
            match result {
                Ok(tex) => {
                    // keeps the placeholder alive until the real image is copied in
                    if handoff.provide(tex) {
                        self.real.add_ref_texture(tex);
                    }
                }
                Err(_) => handoff.abandon(),
            }
        }

        let load_ms = elapsed_ms(&start);

        let tex = result?;

        if tconf.cache && checksum != 0 {
            self.cache.insert(self.real.as_mut(), checksum, tex, load_ms);
        }

        if tconf.log {
            let levels = self.real.level_count(tex);
            write_log_file(&format!(
                "[Load Trace] Texture:   ({} x {}) * <LODs: {}> - FAST_CRC32: {:X}",
                params.width, params.height, levels, checksum
            ));
            write_log_file(&format!(
                "[Load Trace]              Usage: {:<20} - Format: {:<20}",
                usage_to_str(params.usage),
                format_to_str(params.format, true)
            ));
            write_log_file(&format!(
                "[Load Trace]                Pool: {}",
                pool_to_str(params.pool)
            ));
            write_log_file(&format!("[Load Trace]      Load Time: {:6.4} ms", load_ms));
        }

        if tconf.dump && !injected && checksum != 0 && !self.dirs.is_dumped(checksum) {
            self.dump_texture(data, tex, checksum);
        }

        Ok(tex)
    }

    fn load_font(&mut self, device: DevicePtr) -> DxResult<TexPtr> {
        if !self.font_path.is_file() {
            return Err(E_FAIL);
        }
        match self.codec.create_texture_from_file(device, &self.font_path) {
            Ok(tex) => {
                write_log_file("[   Font   ] Loading user-defined font... done");
                self.font_tex = Some(tex);
                Ok(tex)
            }
            Err(hr) => {
                write_log_file(&format!(
                    "[   Font   ] Loading user-defined font... failed ({:x})",
                    hr
                ));
                Err(hr)
            }
        }
    }

    fn load_custom(
        &mut self,
        device: DevicePtr,
        checksum: u32,
        params: &TexLoadParams,
        out: LoadOutParams,
    ) -> DxResult<TexPtr> {
        let path = self.dirs.custom_path(checksum);
        let custom = TexLoadParams {
            width: 0,
            height: 0,
            mip_levels: 0,
            format: D3DFMT_UNKNOWN,
            filter: D3DX_DEFAULT,
            mip_filter: D3DX_DEFAULT,
            ..*params
        };
        let out = LoadOutParams {
            src_info: 0,
            palette: out.palette,
        };

        let start = Instant::now();
        let res = self
            .codec
            .create_texture_from_file_ex(device, &path, &custom, out);
        match res {
            Ok(_) => write_log_file(&format!(
                "[Custom Tex] Loading custom texture for checksum ({:08x})... done ({:5.2} MiB in {:9.4} ms)",
                checksum,
                self.dirs.custom_size(checksum) as f64 / (1024.0 * 1024.0),
                elapsed_ms(&start)
            )),
            Err(hr) => write_log_file(&format!(
                "[Custom Tex] Loading custom texture for checksum ({:08x})... failed ({:x})",
                checksum, hr
            )),
        }
        res
    }

    /// Start a background decode of the custom file into system memory.  Also returns the
    /// parameters for the placeholder the game gets meanwhile: a dynamic DEFAULT pool texture
    /// with the file's size, format and levels, so the finished image can be copied straight
    /// into it with UpdateTexture.  None if the file can't be inspected or the worker couldn't
    /// be started; the caller then loads synchronously.
    fn queue_custom_load(
        &mut self,
        device: DevicePtr,
        checksum: u32,
        params: &TexLoadParams,
    ) -> Option<(Arc<DestHandoff>, TexLoadParams)> {
        let codec = self.codec.clone();
        let path = self.dirs.custom_path(checksum);
        let info = match self.codec.image_info_from_file(&path) {
            Ok(i) => i,
            Err(hr) => {
                write_log_file(&format!(
                    "[Custom Tex] >> ERROR: no image info for {:08x} (hr: {:x})",
                    checksum, hr
                ));
                return None;
            }
        };
        let placeholder = TexLoadParams {
            width: info.width,
            height: info.height,
            mip_levels: info.mip_levels.max(1),
            format: info.format,
            usage: D3DUSAGE_DYNAMIC,
            pool: D3DPOOL_DEFAULT,
            ..*params
        };
        let sysmem = TexLoadParams {
            usage: 0,
            pool: D3DPOOL_SYSTEMMEM,
            ..placeholder
        };
        let timeout = Duration::from_millis(self.conf.textures.load_timeout_ms);

        let res = self.load_queue.spawn_load(checksum, timeout, move || {
            codec.create_texture_from_file_ex(device, &path, &sysmem, LoadOutParams::default())
        });
        match res {
            Ok(h) => {
                write_log_file(&format!(
                    "[Custom Tex] Queued background load of custom texture ({:08x})",
                    checksum
                ));
                Some((h, placeholder))
            }
            Err(e) => {
                write_log_file(&format!(
                    "[Custom Tex] >> ERROR: can't start background load for {:08x}: {:?}",
                    checksum, e
                ));
                None
            }
        }
    }

    fn dump_texture(&mut self, data: &[u8], tex: TexPtr, checksum: u32) {
        let info = match self.codec.image_info_from_file_in_memory(data) {
            Ok(i) => i,
            Err(hr) => {
                write_log_file(&format!(
                    "[Dump Tex.] >> ERROR: no image info for {:08x} (hr: {:x})",
                    checksum, hr
                ));
                return;
            }
        };

        let fmt_name = format_to_str(info.format, false);
        let dir = self.dirs.dump_dir(&fmt_name);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            write_log_file(&format!(
                "[Dump Tex.] >> ERROR: can't create {:?}: {}",
                dir, e
            ));
            return;
        }

        let path = self.dirs.dump_path(&fmt_name, checksum);
        self.tracer.dumping = true;
        let hr = self.codec.save_texture_to_file(&path, D3DXIFF_PNG, tex);
        self.tracer.dumping = false;

        if succeeded(hr) {
            self.dirs.mark_dumped(checksum);
        } else {
            write_log_file(&format!(
                "[Dump Tex.] >> ERROR: save of {:?} failed (hr: {:x})",
                path, hr
            ));
        }
    }
}
