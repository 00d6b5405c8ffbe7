use std::cell::Cell;
use std::ffi::OsString;

use winapi::shared::minwindef::{FARPROC, HMODULE};
use winapi::um::libloaderapi::{GetModuleHandleW, GetProcAddress, LoadLibraryW};

use shared_dx::error::*;

pub unsafe fn protect_memory(
    target: *mut winapi::ctypes::c_void,
    size: usize,
    protection: u32,
) -> Result<u32> {
    let process = winapi::um::processthreadsapi::GetCurrentProcess();
    let mut old_protection = winapi::um::winnt::PAGE_READWRITE;
    if winapi::um::memoryapi::VirtualProtectEx(
        process,
        target,
        size,
        protection,
        (&mut old_protection) as *mut u32,
    ) > 0
    {
        Ok(old_protection)
    } else {
        Err(HookError::ProtectFailed)
    }
}

pub unsafe fn unprotect_memory(target: *mut winapi::ctypes::c_void, size: usize) -> Result<u32> {
    protect_memory(target, size, winapi::um::winnt::PAGE_READWRITE)
}

/// Handle of an already loaded module, loading it if the game hasn't yet.
pub fn load_lib(name: &str) -> Result<HMODULE> {
    let wide: Vec<u16> = to_wide_str(name);
    let mut handle = unsafe { GetModuleHandleW(wide.as_ptr()) };
    if handle.is_null() {
        handle = unsafe { LoadLibraryW(wide.as_ptr()) };
    }
    if handle.is_null() {
        Err(HookError::LoadLibFailed(name.to_owned()))
    } else {
        Ok(handle)
    }
}

pub fn get_proc_address(h: HMODULE, name: &str) -> Result<FARPROC> {
    use std::ffi::CString;

    if h.is_null() {
        return Err(HookError::GetProcAddressFailed("null handle".to_owned()));
    }
    let csname = CString::new(name)?;
    let addr = unsafe { GetProcAddress(h, csname.as_ptr()) };
    if addr.is_null() {
        Err(HookError::GetProcAddressFailed(format!(
            "{} not found in module",
            name
        )))
    } else {
        Ok(addr)
    }
}

pub fn to_wide_str(s: &str) -> Vec<u16> {
    use std::ffi::OsStr;
    use std::iter::once;
    use std::os::windows::ffi::OsStrExt;

    OsStr::new(s).encode_wide().chain(once(0)).collect()
}

/// Null terminated wide string from the host.
pub unsafe fn from_wide_ptr(ws: *const u16) -> Result<String> {
    use std::os::windows::prelude::*;

    if ws.is_null() {
        return Err(HookError::BadStateError("null string".to_owned()));
    }
    let mut len = 0;
    while *ws.add(len) != 0 {
        len += 1;
    }
    let s = std::slice::from_raw_parts(ws, len);
    let s = OsString::from_wide(s).into_string()?;
    Ok(s)
}

thread_local! {
    static IN_HOOK: Cell<bool> = Cell::new(false);
}

/// Marks the current thread as inside the fix.  Device calls made while one is alive (ours, or
/// the ones D3DX makes on our behalf) go straight to the real functions.
pub struct ReentryGuard(());

impl ReentryGuard {
    /// None if the thread is already inside.
    pub fn enter() -> Option<ReentryGuard> {
        IN_HOOK.with(|h| {
            if h.get() {
                None
            } else {
                h.set(true);
                Some(ReentryGuard(()))
            }
        })
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        IN_HOOK.with(|h| h.set(false));
    }
}
