use std::fs::{File, Metadata, OpenOptions};
use std::io::{self, Error, ErrorKind};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

// of course we can also write "file & 0o040 != 0", but this makes the intent explicit
enum Op {
    Read = 4,
    Write = 2,
}
enum Category {
    Group = 1,
    World = 0,
}

fn mode(who: Category, what: Op) -> u32 {
    (what as u32) << (3 * who as u32)
}

/// The owner/group/mode a policy source must have to be trusted (spec.md §5's
/// "configured sudoers-uid"/"configured sudoers-mode"/"configured sudoers-gid"),
/// settable per `open()` call via the `sudoers_uid`/`sudoers_gid`/`sudoers_mode`
/// plugin settings. Defaults match the real `/etc/sudoers`: root-owned, mode 0440.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SudoersTrust {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
}

impl Default for SudoersTrust {
    fn default() -> Self {
        SudoersTrust {
            uid: 0,
            gid: 0,
            mode: 0o440,
        }
    }
}

/// Open a policy source using the security checks real sudo applies to `/etc/sudoers`:
/// the file must match `trust` exactly; its parent directory (checked only for
/// `@include`d files, never the top-level source) must be root-owned and not
/// writable by anyone but root, regardless of `trust`.
pub fn secure_open_sudoers(
    path: impl AsRef<Path>,
    check_parent_dir: bool,
    trust: &SudoersTrust,
) -> io::Result<File> {
    let path = path.as_ref();
    let error = |msg| Error::new(ErrorKind::PermissionDenied, msg);

    if check_parent_dir {
        let Some(parent_dir) = path.parent() else {
            return Err(error(format!(
                "{} has no valid parent directory",
                path.display()
            )));
        };
        directory_checks(parent_dir, std::fs::metadata(parent_dir)?)?;
    }

    let file = OpenOptions::new().read(true).open(path)?;
    let meta = file.metadata()?;
    if !meta.is_file() {
        return Err(error(format!("{} is not a regular file", path.display())));
    }
    file_checks(path, meta, trust)?;

    Ok(file)
}

fn directory_checks(path: &Path, meta: Metadata) -> io::Result<()> {
    let error = |msg| Error::new(ErrorKind::PermissionDenied, msg);

    let path_mode = meta.permissions().mode();
    if meta.uid() != 0 {
        Err(error(format!("{} must be owned by root", path.display())))
    } else if meta.gid() != 0 && (path_mode & mode(Category::Group, Op::Write) != 0) {
        Err(error(format!(
            "{} cannot be group-writable",
            path.display()
        )))
    } else if path_mode & mode(Category::World, Op::Write) != 0 {
        Err(error(format!(
            "{} cannot be world-writable",
            path.display()
        )))
    } else {
        Ok(())
    }
}

fn file_checks(path: &Path, meta: Metadata, trust: &SudoersTrust) -> io::Result<()> {
    let error = |msg| Error::new(ErrorKind::PermissionDenied, msg);

    let path_mode = meta.permissions().mode() & 0o7777;
    if meta.uid() != trust.uid {
        Err(error(format!(
            "{} must be owned by uid {}",
            path.display(),
            trust.uid
        )))
    } else if path_mode != trust.mode {
        Err(error(format!(
            "{} must be mode {:04o}",
            path.display(),
            trust.mode
        )))
    } else if path_mode & mode(Category::Group, Op::Read) != 0 && meta.gid() != trust.gid {
        Err(error(format!(
            "{} must be owned by gid {}",
            path.display(),
            trust.gid
        )))
    } else {
        Ok(())
    }
}
