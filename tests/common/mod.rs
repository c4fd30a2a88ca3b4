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

#![allow(dead_code)]

use fuse_sys::MountHandle;
use parking_lot::Mutex;
use semantic_fs::common::settings::config::HashMapSource;
use semantic_fs::common::settings::Settings;
use semantic_fs::common::types::file_perms::UMask;
use semantic_fs::fuse;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// An instance of `Fixture` represents a mounted semantic view over a
/// temporary datastore directory. Dropping it unmounts and cleans up,
/// since the last `Arc<Mutex<MountHandle>>` going out of scope runs
/// `MountHandle`'s `Drop` impl.
pub struct Fixture {
    pub datastore: tempfile::TempDir,
    pub mountpoint: tempfile::TempDir,
    pub settings: Arc<Settings>,
    handle: Arc<Mutex<MountHandle>>,
}

impl Fixture {
    pub fn new() -> Self {
        let datastore = tempfile::Builder::new().prefix("semfs-ds-").tempdir().unwrap();
        let mountpoint = tempfile::Builder::new().prefix("semfs-mnt-").tempdir().unwrap();

        let ds_path = datastore.path().canonicalize().unwrap();
        let mp_path = mountpoint.path().canonicalize().unwrap();

        let uid = unsafe { libc::getuid() };
        let gid = unsafe { libc::getgid() };
        let perms = UMask::default().dir_perms();

        let mut cli_source = HashMapSource(Default::default());
        cli_source.0.insert("mount.uid".to_string(), (uid as i64).into());
        cli_source.0.insert("mount.gid".to_string(), (gid as i64).into());
        cli_source
            .0
            .insert("mount.permissions".to_string(), perms.octal_string().into());

        let settings = Arc::new(Settings::from_sources(ds_path, mp_path.clone(), cli_source).unwrap());

        let ops = fuse::TagFilesystem::new(settings.clone());
        let fuse_conf = fuse::util::make_fuse_config();
        let mut mount_conf = fuse::util::make_mount_config("itest");
        mount_conf.daemon_timeout = Some(1);

        let handle = fuse_sys::mount(&mp_path, ops, false, fuse_conf, mount_conf).unwrap();

        // give the fuse event loop a moment to come up before the first syscall
        std::thread::sleep(Duration::from_millis(150));

        Fixture {
            datastore,
            mountpoint,
            settings,
            handle,
        }
    }

    /// A path under the mount, e.g. `f.mounted("/_sem/_t1/x")`.
    pub fn mounted(&self, virtual_path: &str) -> PathBuf {
        let rel = virtual_path.trim_start_matches('/');
        self.mountpoint.path().canonicalize().unwrap().join(rel)
    }

    /// The same path, resolved to where it actually lives on the host
    /// filesystem, bypassing the mount entirely.
    pub fn physical(&self, virtual_path: &str) -> PathBuf {
        self.settings.physical_path(Path::new(virtual_path)).unwrap()
    }

    pub fn readdir_names(&self, virtual_path: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.mounted(virtual_path))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}
