/*
 * semantic-fs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use clap::{App, Arg};
use log::{debug, info};
use semantic_fs::common::settings::config::HashMapSource;
use semantic_fs::common::settings::{ensure_dir, Settings};
use semantic_fs::common::types::file_perms::UMask;
use semantic_fs::fuse::TagFilesystem;
use semantic_fs::{common, fuse};
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TAG: &str = "main";

/// Defaults computed once, before the `clap::App` is built, so its
/// `Arg::default_value`s can borrow them for the lifetime of `main`.
struct ArgDefaults {
    uid: String,
    gid: String,
    permissions: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let uid = unsafe { libc::getuid() };
    let gid = unsafe { libc::getgid() };
    let umask = UMask::default();

    let defaults = ArgDefaults {
        uid: uid.to_string(),
        gid: gid.to_string(),
        permissions: format!("{:o}", umask.dir_perms().mode()),
    };

    let version_str = common::version_str();
    let matches = App::new("semantic-fs")
        .version(&*version_str)
        .about("Mounts a tag-based semantic view of a directory")
        .settings(&[clap::AppSettings::ArgRequiredElseHelp])
        .arg(
            Arg::with_name("datastore")
                .required(true)
                .help("Directory the semantic view is backed by"),
        )
        .arg(
            Arg::with_name("mountpoint")
                .required(true)
                .help("Where to mount the semantic view"),
        )
        .arg(
            Arg::with_name("verbosity")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .arg(
            Arg::with_name("prefix")
                .long("prefix")
                .takes_value(true)
                .help("Overrides the semantic prefix character (default '_')"),
        )
        .arg(
            Arg::with_name("uid")
                .long("uid")
                .takes_value(true)
                .default_value(&defaults.uid)
                .help("Uid reported for the mount"),
        )
        .arg(
            Arg::with_name("gid")
                .long("gid")
                .takes_value(true)
                .default_value(&defaults.gid)
                .help("Gid reported for the mount"),
        )
        .arg(
            Arg::with_name("permissions")
                .long("permissions")
                .takes_value(true)
                .default_value(&defaults.permissions)
                .help("Octal permissions reported for directories"),
        )
        .get_matches();

    let maybe_log = match matches.occurrences_of("verbosity") {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    };

    if let Some(log_level) = maybe_log {
        setup_mount_logging(log_level)?;
    }

    let datastore_root = PathBuf::from(matches.value_of("datastore").expect("datastore required"))
        .canonicalize()?;
    let mountpoint = PathBuf::from(matches.value_of("mountpoint").expect("mountpoint required"));

    if cfg!(target_os = "linux") && !mountpoint.exists() {
        return Err(format!("Mountpoint does not exist: {}", mountpoint.display()).into());
    }

    let mut cli_source = HashMapSource(Default::default());
    cli_source.0.insert(
        "mount.uid".to_string(),
        matches.value_of("uid").expect("uid has a default").parse::<i64>()?.into(),
    );
    cli_source.0.insert(
        "mount.gid".to_string(),
        matches.value_of("gid").expect("gid has a default").parse::<i64>()?.into(),
    );
    cli_source.0.insert(
        "mount.permissions".to_string(),
        matches.value_of("permissions").expect("permissions has a default").into(),
    );
    if let Some(prefix) = matches.value_of("prefix") {
        cli_source.0.insert("symbols.semantic_prefix".to_string(), prefix.into());
    }

    let settings = Arc::new(Settings::from_sources(datastore_root.clone(), mountpoint.clone(), cli_source)?);

    info!(
        target: TAG,
        "Mounting {} at {}",
        datastore_root.display(),
        mountpoint.display()
    );

    let fsname = format!("semantic-fs:{}", datastore_root.display());
    let fuse_conf = fuse::util::make_fuse_config();
    let mount_conf = fuse::util::make_mount_config(&fsname);

    let fsh = TagFilesystem::new(settings);
    let _mount_handle = fuse_sys::mount(&mountpoint, fsh, false, fuse_conf, mount_conf)?;

    let sigint = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::SIGINT, Arc::clone(&sigint))?;

    while !sigint.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }
    info!(target: TAG, "Got SIGINT, unmounting and cleaning up");

    Ok(())
}

/// Sets up the rotating file logger, mirroring the supertag mount command's
/// logging: always write to a rotating log in the platform's data
/// directory, and additionally echo to stdout since this binary never
/// forks into the background.
fn setup_mount_logging(log_level: log::LevelFilter) -> Result<(), Box<dyn Error>> {
    let log_dir = common::settings::Settings::config_dir()
        .map(|d| d.join("logs"))
        .ok_or("Could not determine a config directory for this platform")?;
    ensure_dir(&log_dir)?;

    let rotating_log = common::log::RotatingLogger::new(log_dir, "%Y-%m-%d-%H.log".to_string(), 6, 100)?;

    let mut outputs: Vec<fern::Output> = vec![From::<Box<dyn log::Log>>::from(Box::new(rotating_log))];
    outputs.push(std::io::stdout().into());

    common::log::setup_logger(log_level, outputs)?;
    debug!(target: TAG, "Logger initialized at level {:?}", log_level);
    Ok(())
}
