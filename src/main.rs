use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fuser::MountOption;
use log::{error, info, warn};

use twolevelfs::disk::Disk;
use twolevelfs::bitmap::Bitmap;
use twolevelfs::fuse_fs::TwoLevelFs;

/// A two-level 8.3 userspace filesystem over a fixed-size disk image.
#[derive(Parser, Debug)]
#[command(name = "twolevelfs", version, about)]
struct Args {
    /// Path to the disk image file (created if it does not exist).
    image: PathBuf,

    /// Directory to mount the filesystem onto.
    mountpoint: PathBuf,

    /// Stay attached to the terminal. `fuser` never daemonizes on its own,
    /// so this currently only affects logging; it is kept for CLI
    /// compatibility with the original's `-f`.
    #[arg(short, long)]
    foreground: bool,

    /// Raise log verbosity. Repeatable (-v, -vv, -vvv). `RUST_LOG` takes
    /// precedence over this when set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

/// Registers a best-effort `Ctrl+C`/`SIGINT`/`SIGTERM` handler that asks
/// the kernel to unmount `mountpoint`. The resulting `FUSE_DESTROY` request
/// runs our own `Filesystem::destroy`, flushing the bitmap, before
/// `fuser::mount2` returns — matching a clean `fusermount -u` shutdown.
fn install_unmount_on_interrupt(mountpoint: PathBuf) {
    let result = ctrlc::set_handler(move || {
        warn!("received interrupt, requesting unmount of {}", mountpoint.display());
        if let Err(e) = std::process::Command::new("fusermount")
            .arg("-u")
            .arg(&mountpoint)
            .status()
        {
            error!("failed to invoke fusermount -u: {e}");
        }
    });
    if let Err(e) = result {
        warn!("failed to install interrupt handler: {e}");
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.foreground {
        info!("running in foreground");
    }

    let disk = match Disk::create_if_missing(&args.image) {
        Ok(disk) => disk,
        Err(e) => {
            error!("failed to open disk image {}: {e}", args.image.display());
            return ExitCode::FAILURE;
        }
    };

    let bitmap = match Bitmap::init(&disk) {
        Ok(bitmap) => bitmap,
        Err(e) => {
            error!("failed to load bitmap: {e}");
            return ExitCode::FAILURE;
        }
    };

    install_unmount_on_interrupt(args.mountpoint.clone());

    let options = vec![
        MountOption::FSName("twolevelfs".to_string()),
        MountOption::AutoUnmount,
    ];

    info!("mounting {} at {}", args.image.display(), args.mountpoint.display());
    match fuser::mount2(TwoLevelFs::new(disk, bitmap), &args.mountpoint, &options) {
        Ok(()) => {
            info!("unmounted cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("mount failed: {e}");
            ExitCode::FAILURE
        }
    }
}
