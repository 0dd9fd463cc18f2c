use std::path::{Path, PathBuf};

use clap::Parser;
use tfscore::{FuseAdapter, MountContext, DEFAULT_TOTAL_BLOCKS};

/// The diskfile always lives at `<cwd>/DISKFILE` (spec §6); no environment
/// variable or flag overrides it.
const DISKFILE_PATH: &str = "DISKFILE";

#[derive(Parser, Debug)]
struct Args {
    /// Directory to mount the filesystem at.
    mountpoint: PathBuf,

    /// Stay attached to the controlling terminal instead of daemonizing.
    #[arg(short = 'f', long)]
    foreground: bool,

    /// FUSE mount option, may be repeated (e.g. -o allow_other).
    #[arg(short = 'o', long)]
    options: Vec<String>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let diskfile = Path::new(DISKFILE_PATH);
    if !diskfile.exists() {
        let uid = unsafe { libc::getuid() };
        let gid = unsafe { libc::getgid() };
        let now = now_unix();
        if let Err(e) = MountContext::mkfs(diskfile, DEFAULT_TOTAL_BLOCKS, uid, gid, now) {
            log::error!("mkfs failed: {e}");
            std::process::exit(1);
        }
    }

    let ctx = match MountContext::init(diskfile) {
        Ok(ctx) => ctx,
        Err(e) => {
            log::error!("mount failed: {e}");
            std::process::exit(1);
        }
    };

    let mount_options: Vec<fuser::MountOption> = args
        .options
        .iter()
        .map(|o| fuser::MountOption::CUSTOM(o.clone()))
        .collect();

    if !args.foreground {
        log::warn!("daemonizing is not implemented; running in the foreground");
    }

    log::info!("mounting at {}", args.mountpoint.display());
    if let Err(e) = fuser::mount2(FuseAdapter::new(ctx), &args.mountpoint, &mount_options) {
        log::error!("fuse mount failed: {e}");
        std::process::exit(1);
    }
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
