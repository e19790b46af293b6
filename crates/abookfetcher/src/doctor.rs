//! Environment readiness check.

use std::path::{Path, PathBuf};

use crate::config::FetcherConfig;
use crate::process::find_ffmpeg;
use crate::renderer::chromium::find_chromium;

/// What the fetcher would use on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorReport {
    pub chromium: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub temp_root: PathBuf,
    pub temp_root_writable: bool,
}

impl DoctorReport {
    pub fn is_ready(&self) -> bool {
        self.chromium.is_some() && self.ffmpeg.is_some() && self.temp_root_writable
    }
}

/// Resolve external tools the same way a fetch would.
pub fn check(config: &FetcherConfig) -> DoctorReport {
    let chromium = match &config.chromium_path {
        Some(p) => p.exists().then(|| p.clone()),
        None => find_chromium(),
    };
    let ffmpeg = match &config.ffmpeg_path {
        Some(p) => p.exists().then(|| p.clone()),
        None => find_ffmpeg(),
    };
    DoctorReport {
        chromium,
        ffmpeg,
        temp_root: config.temp_root.clone(),
        temp_root_writable: is_writable_dir(&config.temp_root),
    }
}

fn is_writable_dir(dir: &Path) -> bool {
    let marker = dir.join(format!(".abookfetcher-doctor-{}", uuid::Uuid::new_v4()));
    match std::fs::write(&marker, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&marker);
            true
        }
        Err(_) => false,
    }
}

/// Print the report in the `[OK]` / `[!!]` checklist format.
pub fn print(report: &DoctorReport) {
    println!("abookfetcher doctor");
    println!("===================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &report.chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome/Chromium or set ABOOK_CHROMIUM_PATH."
        ),
    }
    match &report.ffmpeg {
        Some(path) => println!("[OK] ffmpeg found: {}", path.display()),
        None => println!("[!!] ffmpeg NOT found. Install ffmpeg or set ABOOK_FFMPEG_PATH."),
    }
    if report.temp_root_writable {
        println!("[OK] Temp directory {} is writable", report.temp_root.display());
    } else {
        println!(
            "[!!] Temp directory {} is not writable. Set ABOOK_TMPDIR.",
            report.temp_root.display()
        );
    }

    println!();
    if report.is_ready() {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
}
