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

use crate::common;
use crate::common::err::SemanticFsError;
use crate::common::fsops;
use crate::common::fsops::existence::exists;
use crate::common::ghost_table::{GhostKey, GhostTable};
use crate::common::settings::Settings;
use crate::common::types::PathKind;
use crate::fuse::util;
use fuse_sys::{fuse_file_info, new_statvfs, O_RDWR, O_WRONLY};
use fuse_sys::{stat, statvfs};
use fuse_sys::{mode_t, off_t};
use fuse_sys::{FileEntry, Filesystem, FuseHandle, FuseResult, Request};
use log::debug;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::os::unix::io::{FromRawFd, IntoRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

const OP_TAG: &str = "fs_op";

mod getattr;
mod readdir;

/// The FUSE dispatcher: the only object in the crate that is simultaneously
/// process-wide state (the `GhostTable`) and the thing libfuse calls into.
/// Every operation here is a thin adapter between `fuse_sys::Filesystem`'s
/// C-shaped signatures and the pure functions in `common::fsops`.
pub struct TagFilesystem {
    settings: Arc<Settings>,
    ghosts: GhostTable,
    handle: Option<Arc<FuseHandle>>,
}

impl TagFilesystem {
    #[must_use]
    pub fn new(settings: Arc<Settings>) -> Self {
        TagFilesystem {
            settings,
            ghosts: GhostTable::new(),
            handle: None,
        }
    }

    fn write_intent(flags: i32) -> bool {
        let flags = flags as u32;
        flags & O_RDWR > 0 || flags & O_WRONLY > 0
    }

    /// Turns a virtual path with a live ghost-table entry into the key that
    /// identifies it, without allocating when there isn't one.
    fn ghost_key(&self, path: &Path) -> FuseResult<Option<GhostKey>> {
        Ok(self.ghosts.key_for_virtual(path))
    }
}

impl Filesystem for TagFilesystem {
    /// Sets up our thread-local request id based on a global atomic counter,
    /// matched by `common::log::setup_logger`'s format string.
    fn init_request_id(&self) {
        common::log::REQUEST_ID.with(|f| {
            let req_id = common::log::REQ_COUNTER.fetch_add(1, Ordering::SeqCst);
            *f.borrow_mut() = req_id;
        });
    }

    fn getattr(&self, req: &Request, path: &Path) -> FuseResult<stat> {
        self.getattr_impl(req, path)
    }

    fn readdir(&self, req: &Request, path: &Path) -> FuseResult<Box<dyn Iterator<Item = FileEntry>>> {
        self.readdir_impl(req, path)
    }

    fn readlink(&self, _req: &Request, path: &Path) -> FuseResult<PathBuf> {
        let physical = self.settings.physical_path(path)?;
        Ok(std::fs::read_link(&physical)?)
    }

    /// Symlinks are only meaningful for a standard path or a tagged object —
    /// an entry point or tag is a physical directory the dispatcher owns,
    /// and letting a symlink stand in for one would let a tag chain lead
    /// somewhere the existence predicate can't validate.
    fn symlink(&self, _req: &Request, src: &Path, dst: &Path) -> FuseResult<()> {
        if exists(&self.settings, dst) {
            return Err(SemanticFsError::Exists(dst.to_owned()).into());
        }

        let info = self.settings.pathinfo(dst)?;
        match info.kind() {
            PathKind::EntryPoint | PathKind::Tag => Err(SemanticFsError::NotSupported(
                "symlinks cannot stand in for an entry point or tag".to_string(),
            )
            .into()),
            PathKind::Standard | PathKind::TaggedObject => {
                let name = common::get_filename(dst)?;
                self.settings.reject_reserved(name)?;

                let physical = self.settings.physical_path(dst)?;
                std::os::unix::fs::symlink(src, &physical)?;

                if info.is_tagged_object() {
                    let mut folder = fsops::load_folder(&self.settings, info.entrypoint())?;
                    let object_name = info.object_name();
                    let tags: HashSet<String> = info.tag_chain().iter().cloned().collect();
                    if folder.filetags().has_file(object_name) {
                        folder.filetags_mut().assign_tags(object_name, &tags)?;
                    } else {
                        folder.filetags_mut().add_file(object_name, tags)?;
                    }
                    fsops::save_folder(&self.settings, &folder)?;
                }
                Ok(())
            }
        }
    }

    /// §4.8 `create`/§4.6: create the physical/metadata state via
    /// `fsops::create`, then open the new file for write and (only if this
    /// call actually produced a fresh inode) seed and zero its GhostFile.
    fn create(&self, _req: &Request, path: &Path, _mode: mode_t) -> FuseResult<RawFd> {
        let info = self.settings.pathinfo(path)?;
        let (physical, created) = fsops::create::create(&self.settings, path)?;

        let file = OpenOptions::new().read(true).write(true).open(&physical)?;
        let fd = file.into_raw_fd();

        if info.is_tagged_object() {
            let key = GhostKey {
                physical,
                virtual_path: path.to_owned(),
            };
            self.ghosts.acquire(key.clone(), fd)?;
            if created {
                self.ghosts.truncate(&key, 0);
            }
        }
        Ok(fd)
    }

    /// §4.6: open with write intent on a tagged object add-refs a GhostFile;
    /// everything else is a plain host-FS open.
    fn open(&self, _req: &Request, path: &Path, fi: *const fuse_file_info) -> FuseResult<RawFd> {
        if !exists(&self.settings, path) {
            return Err(SemanticFsError::NotFound(path.to_owned()).into());
        }

        let info = self.settings.pathinfo(path)?;
        let physical = self.settings.physical_path(path)?;
        let flags = unsafe { (*fi).flags };

        let mut opts = OpenOptions::new();
        util::open_opts_from_mode(&mut opts, flags);
        let file = opts.open(&physical)?;
        let fd = file.into_raw_fd();

        if info.is_tagged_object() && Self::write_intent(flags) {
            let key = GhostKey {
                physical,
                virtual_path: path.to_owned(),
            };
            self.ghosts.acquire(key, fd)?;
        }
        Ok(fd)
    }

    fn read(&self, _req: &Request, path: &Path, buf: &mut [u8], offset: off_t, fi: *const fuse_file_info) -> FuseResult<usize> {
        let fh = unsafe { (*fi).fh as RawFd };

        if let Some(key) = self.ghost_key(path)? {
            let file = unsafe { std::fs::File::from_raw_fd(fh) };
            let result = self.ghosts.read(&key, buf.len() as u64, offset, &file);
            std::mem::forget(file);

            if let Some(result) = result {
                let data = result?;
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                return Ok(n);
            }
        }

        unsafe {
            let n = libc::pread(fh, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), offset);
            if n == -1 {
                Err(std::io::Error::last_os_error().into())
            } else {
                Ok(n as usize)
            }
        }
    }

    fn write(&self, _req: &Request, path: &Path, data: &[u8], offset: off_t, fi: *const fuse_file_info) -> FuseResult<usize> {
        let fh = unsafe { (*fi).fh as RawFd };

        if let Some(key) = self.ghost_key(path)? {
            let file = unsafe { std::fs::File::from_raw_fd(fh) };
            let result = self.ghosts.write(&key, data, offset, &file);
            std::mem::forget(file);

            if let Some(result) = result {
                return Ok(result?);
            }
        }

        unsafe {
            let seeked = libc::lseek(fh, offset, libc::SEEK_SET);
            if seeked == -1 {
                return Err(std::io::Error::last_os_error().into());
            }
            let written = libc::write(fh, data.as_ptr() as *const libc::c_void, data.len());
            if written == -1 {
                Err(std::io::Error::last_os_error().into())
            } else {
                Ok(written as usize)
            }
        }
    }

    /// `truncate(2)` is path-addressed, not fd-addressed, so a live ghost is
    /// found by virtual path rather than by the (absent, for this call) fd.
    fn truncate(&self, _req: &Request, path: &Path, offset: off_t) -> FuseResult<()> {
        let length = offset.max(0) as u64;
        if let Some(key) = self.ghost_key(path)? {
            self.ghosts.truncate(&key, length);
            return Ok(());
        }

        let physical = self.settings.physical_path(path)?;
        util::truncate(&physical, offset)?;
        Ok(())
    }

    /// §4.6 release: commit and de-ref the GhostFile for any descriptor that
    /// went through `acquire`; otherwise just close the fd, same as the
    /// trait's default.
    fn release(&self, _req: &Request, _path: &Path, fi: *const fuse_file_info) -> FuseResult<()> {
        let fh = unsafe { (*fi).fh as RawFd };
        if self.ghosts.is_write_fd(fh) {
            self.ghosts.release(fh)?;
        } else {
            unsafe {
                let _fh = std::fs::File::from_raw_fd(fh);
            }
        }
        Ok(())
    }

    fn rmdir(&self, _req: &Request, path: &Path) -> FuseResult<()> {
        fsops::rmdir::rmdir(&self.settings, path)?;
        Ok(())
    }

    fn unlink(&self, _req: &Request, path: &Path) -> FuseResult<()> {
        fsops::unlink::unlink(&self.settings, path)?;
        Ok(())
    }

    fn mkdir(&self, _req: &Request, path: &Path, mode: mode_t) -> FuseResult<()> {
        fsops::mkdir::mkdir(&self.settings, path, mode)?;
        Ok(())
    }

    fn rename(&self, _req: &Request, old: &Path, new: &Path) -> FuseResult<()> {
        fsops::rename::rename(&self.settings, old, new)?;
        Ok(())
    }

    fn statfs(&self, _req: &Request, _path: &Path) -> FuseResult<statvfs> {
        let mut res = new_statvfs();
        res.f_bsize = 4096;
        res.f_frsize = 4096;

        #[cfg(target_os = "macos")]
        {
            res.f_blocks = ((100 * 1024u64.pow(3u32)) / res.f_bsize) as u32;
        }
        #[cfg(not(target_os = "macos"))]
        {
            res.f_blocks = (100 * 1024u64.pow(3u32)) / res.f_bsize;
        }

        res.f_bfree = res.f_blocks;
        res.f_bavail = res.f_blocks;
        Ok(res)
    }

    fn set_handle(&mut self, handle: Arc<FuseHandle>) {
        debug!(target: OP_TAG, "setting fuse handle");
        self.handle = Some(handle);
    }
}
