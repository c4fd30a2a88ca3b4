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

use crate::common::constants::DEVICE_ID;
use crate::common::err::SemResult;
use fuse_sys::conf::{FuseConfig, MountConfig};
use fuse_sys::{stat, timespec, O_RDWR, O_WRONLY};
use nix::sys::stat::lstat;
use std::ffi::CString;
use std::fs::OpenOptions;
use std::path::Path;

/// A platform-neutral view of the fields we need out of `lstat`, converted
/// into fuse's raw `stat` at the end. Keeping this intermediate struct
/// avoids scattering `#[cfg(target_os = ...)]` across every call site that
/// builds a `stat`.
struct Stat {
    device: u64,
    inode: u64,
    mode: libc::mode_t,
    nlink: u64,
    uid: u32,
    gid: u32,
    size: i64,
    atime: timespec,
    mtime: timespec,
    ctime: timespec,
    #[cfg(target_os = "macos")]
    birthtime: timespec,
}

impl From<Stat> for stat {
    fn from(s: Stat) -> Self {
        #[cfg(target_os = "linux")]
        return stat {
            st_dev: s.device,
            st_ino: s.inode,
            st_nlink: s.nlink,
            st_mode: s.mode,
            st_uid: s.uid,
            st_gid: s.gid,
            __pad0: 0,
            st_rdev: 0,
            st_size: s.size,
            st_blksize: 4096,
            st_blocks: 8,
            st_atim: s.atime,
            st_mtim: s.mtime,
            st_ctim: s.ctime,
            __glibc_reserved: [0; 3],
        };

        #[cfg(target_os = "macos")]
        return stat {
            st_dev: s.device as i32,
            st_mode: s.mode as u16,
            st_nlink: s.nlink as u16,
            st_ino: s.inode,
            st_uid: s.uid,
            st_gid: s.gid,
            st_rdev: 0,
            st_atimespec: s.atime,
            st_mtimespec: s.mtime,
            st_ctimespec: s.ctime,
            st_birthtimespec: s.birthtime,
            st_size: s.size,
            st_blocks: 8,
            st_blksize: 0,
            st_flags: 0,
            st_gen: 0,
            st_lspare: 0,
            st_qspare: [0; 2],
        };
    }
}

/// Builds a fuse `stat` for `physical` by calling `lstat` and optionally
/// overriding the reported size, per §4.8's getattr contract: a GhostFile's
/// buffered `filesize` wins over whatever is actually on disk.
pub fn lstat_to_fuse(physical: &Path, size_override: Option<u64>) -> SemResult<stat> {
    let st = lstat(physical)?;
    let size = size_override.unwrap_or(st.st_size as u64) as i64;
    Ok(Stat {
        device: st.st_dev as u64,
        inode: st.st_ino,
        mode: st.st_mode,
        nlink: st.st_nlink as u64,
        uid: st.st_uid,
        gid: st.st_gid,
        size,
        atime: timespec {
            tv_sec: st.st_atime,
            tv_nsec: st.st_atime_nsec,
        },
        mtime: timespec {
            tv_sec: st.st_mtime,
            tv_nsec: st.st_mtime_nsec,
        },
        ctime: timespec {
            tv_sec: st.st_ctime,
            tv_nsec: st.st_ctime_nsec,
        },
        #[cfg(target_os = "macos")]
        birthtime: timespec {
            tv_sec: st.st_birthtime,
            tv_nsec: st.st_birthtime_nsec,
        },
    }
    .into())
}

pub fn make_mount_config(fsname: &str) -> MountConfig {
    let mut mount_conf = MountConfig::default();
    mount_conf.fsname = Some(fsname.to_string());
    mount_conf.subtype = Some("semantic".to_string());
    mount_conf.default_permissions = Some(true);
    mount_conf.allow_other = Some(true);

    #[cfg(target_os = "macos")]
    {
        mount_conf.volname = Some(fsname.to_string());
        mount_conf.local = Some(true);
        mount_conf.noappledouble = Some(true);
        mount_conf.daemon_timeout = Some(5);
    }
    mount_conf
}

pub fn make_fuse_config() -> FuseConfig {
    let mut fuse_conf = FuseConfig::default();
    // the datastore can be edited out from under the mount, so don't let the
    // kernel cache attributes or dentries across calls
    fuse_conf.attr_timeout = Some(0);
    fuse_conf.entry_timeout = Some(0);
    fuse_conf.hard_remove = Some(true);
    fuse_conf.kernel_cache = Some(false);
    fuse_conf
}

pub fn open_opts_from_mode(opts: &mut OpenOptions, mode: i32) -> &OpenOptions {
    // O_RDONLY is 0, so we start from read-only and upgrade based on the bits present
    let mut fopts = opts.read(true).write(false);

    let mode = mode as u32;
    if mode & O_RDWR > 0 {
        fopts = fopts.read(true).write(true)
    } else if mode & O_WRONLY > 0 {
        fopts = fopts.read(false).write(true)
    }
    fopts
}

pub fn truncate(path: &Path, offset: i64) -> std::io::Result<()> {
    let c_path = CString::new(path.to_string_lossy().to_string()).unwrap();
    let err = unsafe { libc::truncate(c_path.as_ptr(), offset) };
    if err == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lstat_reports_physical_size_by_default() {
        let dir = tempdir().unwrap();
        let f = dir.path().join("a");
        std::fs::write(&f, b"hello").unwrap();
        let st = lstat_to_fuse(&f, None).unwrap();
        assert_eq!(st.st_size, 5);
    }

    #[test]
    fn lstat_honors_size_override() {
        let dir = tempdir().unwrap();
        let f = dir.path().join("a");
        std::fs::write(&f, b"hello").unwrap();
        let st = lstat_to_fuse(&f, Some(0)).unwrap();
        assert_eq!(st.st_size, 0);
    }
}
