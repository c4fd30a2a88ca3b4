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

use fuse_sys::err::FuseErrno;
use nix::errno::Errno;
use std::error::Error;
use std::io::ErrorKind;
use std::path::PathBuf;

pub type SemResult<T> = Result<T, SemanticFsError>;

/// Error kinds per the error handling design: one variant per trigger named
/// there, plus the usual IO/Other escape hatches.
pub enum SemanticFsError {
    NotFound(PathBuf),
    Exists(PathBuf),
    InvalidArgument(String),
    NotADirectory(PathBuf),
    IsDirectory(PathBuf),
    NotEmpty(PathBuf),
    NotSupported(String),
    PermissionDenied(PathBuf),
    InvalidFormat(String),
    MissingNode(String),
    DuplicateNode(String),
    MissingFile(String),
    DuplicateFile(String),
    Io(std::io::Error),
    Other(Box<dyn Error>),
}

impl From<std::io::Error> for SemanticFsError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::NotFound => Self::NotFound(PathBuf::new()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(PathBuf::new()),
            ErrorKind::AlreadyExists => Self::Exists(PathBuf::new()),
            _ => Self::Io(e),
        }
    }
}

impl From<nix::Error> for SemanticFsError {
    fn from(e: nix::Error) -> Self {
        Self::Other(Box::new(e))
    }
}

impl Error for SemanticFsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<SemanticFsError> for FuseErrno {
    fn from(e: SemanticFsError) -> Self {
        let errno = match &e {
            SemanticFsError::NotFound(_) => Errno::ENOENT,
            SemanticFsError::Exists(_) => Errno::EEXIST,
            SemanticFsError::InvalidArgument(_) => Errno::EINVAL,
            SemanticFsError::NotADirectory(_) => Errno::ENOTDIR,
            SemanticFsError::IsDirectory(_) => Errno::EISDIR,
            SemanticFsError::NotEmpty(_) => Errno::ENOTEMPTY,
            SemanticFsError::NotSupported(_) => Errno::ENOTSUP,
            SemanticFsError::PermissionDenied(_) => Errno::EACCES,
            SemanticFsError::InvalidFormat(_) => Errno::EIO,
            SemanticFsError::MissingNode(_) | SemanticFsError::MissingFile(_) => Errno::ENOENT,
            SemanticFsError::DuplicateNode(_) | SemanticFsError::DuplicateFile(_) => Errno::EEXIST,
            SemanticFsError::Io(io) => Errno::from_i32(io.raw_os_error().unwrap_or(Errno::EIO as i32)),
            SemanticFsError::Other(_) => Errno::EIO,
        };
        Self {
            errno,
            original: Some(Box::new(e)),
        }
    }
}

impl std::fmt::Display for SemanticFsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Self::NotFound(p) => write!(f, "Not found: {}", p.display()),
            Self::Exists(p) => write!(f, "Already exists: {}", p.display()),
            Self::InvalidArgument(s) => write!(f, "Invalid argument: {}", s),
            Self::NotADirectory(p) => write!(f, "Not a directory: {}", p.display()),
            Self::IsDirectory(p) => write!(f, "Is a directory: {}", p.display()),
            Self::NotEmpty(p) => write!(f, "Not empty: {}", p.display()),
            Self::NotSupported(s) => write!(f, "Not supported: {}", s),
            Self::PermissionDenied(p) => write!(f, "Permission denied: {}", p.display()),
            Self::InvalidFormat(s) => write!(f, "Invalid format: {}", s),
            Self::MissingNode(n) => write!(f, "No such tag: {}", n),
            Self::DuplicateNode(n) => write!(f, "Tag already exists: {}", n),
            Self::MissingFile(n) => write!(f, "No such file in semantic folder: {}", n),
            Self::DuplicateFile(n) => write!(f, "File already exists in semantic folder: {}", n),
            Self::Io(e) => write!(f, "IO error: {:?}", e),
            Self::Other(e) => write!(f, "Error: {:?}", e),
        }
    }
}

impl std::fmt::Debug for SemanticFsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        std::fmt::Display::fmt(self, f)
    }
}
