use crate::error::{HookError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Instant, SystemTime};

const LOG_TIME: bool = true;
const DEFAULT_LOG_NAME: &str = "TSFix_Textures.log";

lazy_static! {
    static ref LOG_FILE_NAME: Mutex<String> = Mutex::new(String::new());
    static ref LOG_INIT_TIME: Mutex<SystemTime> = Mutex::new(SystemTime::now());
    /// Tests that inspect the log file hold this for their duration so that other tests in the
    /// same binary don't redirect or interleave with it.
    pub static ref LOG_EXCL_LOCK: Mutex<()> = Mutex::new(());
}

pub fn set_log_file_path(path: &str, name: &str) -> Result<()> {
    let lock = LOG_FILE_NAME.lock();
    match lock {
        Err(e) => Err(HookError::BadStateError(format!("lock error: {}", e))),
        Ok(mut fname) => {
            let mut p = PathBuf::from(path);
            p.push(name);
            *fname = p.to_string_lossy().into_owned();
            Ok(())
        }
    }
}

/// Return the log file path or "" if there was an error.  This function will temporarily lock
/// a global mutex protecting access to the variable.
pub fn get_log_file_path() -> String {
    let lock = LOG_FILE_NAME.lock();
    match lock {
        Err(e) => {
            eprintln!("TSFix: can't read log file path due to lock error: {}", e);
            "".to_owned()
        }
        Ok(fname) => (*fname).to_owned(),
    }
}

pub fn write_log_file(msg: &str) {
    use std::env::temp_dir;
    use std::fs::OpenOptions;
    use std::io::Write;

    let lock = LOG_FILE_NAME.lock();
    match lock {
        Err(e) => {
            eprintln!("TSFix: can't write log file due to lock error: {}", e);
        }
        Ok(mut fname) => {
            if (*fname).is_empty() {
                let mut td = temp_dir();
                td.push(DEFAULT_LOG_NAME);
                match td.as_path().to_str() {
                    None => {
                        eprintln!("TSFix: error getting temp path");
                        return;
                    }
                    Some(p) => {
                        *fname = p.to_owned();
                    }
                }
            }

            let time_ms = if LOG_TIME {
                match LOG_INIT_TIME.lock() {
                    Ok(start) => {
                        let since_start = SystemTime::now()
                            .duration_since(*start)
                            .unwrap_or_else(|_| std::time::Duration::from_millis(0));
                        since_start.as_millis() as u32
                    }
                    Err(_) => 0_u32,
                }
            } else {
                0
            };

            let tid = std::thread::current().id();

            let w = || -> std::io::Result<()> {
                let mut f = OpenOptions::new().create(true).append(true).open(&*fname)?;
                writeln!(f, "{:?}/{}ms: {}\r", tid, time_ms, msg)?;
                Ok(())
            };

            w().unwrap_or_else(|e| eprintln!("TSFix: log file write error: {}", e));
        }
    };
}

/// Point the log at a fresh file in the temp directory and return its path.  The guard
/// argument proves the caller holds `LOG_EXCL_LOCK`.
pub fn prep_log_file(_lock: &MutexGuard<()>, name: &str) -> Result<String> {
    let td = std::env::temp_dir();
    let full = td.join(name);
    if full.exists() {
        std::fs::remove_file(&full)?;
    }
    let dir = td
        .to_str()
        .ok_or_else(|| HookError::BadStateError("temp dir is not utf8".to_owned()))?;
    set_log_file_path(dir, name)?;
    Ok(full.to_string_lossy().into_owned())
}

/// Local wall clock time in the format used for log banners.
pub fn log_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

pub fn elapsed_ms(since: &Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

/// Size of the file in bytes, or 0 if it can't be read.
pub fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
