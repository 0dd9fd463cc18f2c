use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use tfscore::{MountContext, DEFAULT_TOTAL_BLOCKS};

#[derive(Parser, Debug)]
struct Args {
    /// Diskfile to create.
    #[arg(short, long, default_value = "DISKFILE")]
    output: PathBuf,

    /// Total number of blocks to format.
    #[arg(long, default_value_t = DEFAULT_TOTAL_BLOCKS)]
    blocks: u64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let uid = unsafe { libc::getuid() };
    let gid = unsafe { libc::getgid() };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    match MountContext::mkfs(&args.output, args.blocks, uid, gid, now) {
        Ok(()) => log::info!("wrote {} ({} blocks)", args.output.display(), args.blocks),
        Err(e) => {
            log::error!("mkfs failed: {e}");
            std::process::exit(1);
        }
    }
}
