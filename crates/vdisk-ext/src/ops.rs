//! High-level file operations, composed of the engine primitives and gated
//! by the session's UGO permissions.

use regex::Regex;

use crate::fs::path::{components, join, normalize, split};
use crate::fs::{journal, ExtFs, ROOT_INODE};
use crate::perm::{can_read, can_write, owns};
use crate::session::Session;
use crate::structures::inode::{Inode, Perm};
use crate::users::{read_users, write_users, UserRecord};
use crate::{FsError, Result};

/// Default permissions for entries created through the command surface.
pub const DEFAULT_PERM: i32 = 664;

fn default_perm() -> Perm {
    Perm::from_octal(DEFAULT_PERM).expect("664 is a valid permission triple")
}

/// Post-action journal append; EXT2 filesystems simply skip it.
fn journal_op(fs: &ExtFs, op: &str, path: &str, content: &str) {
    if fs.is_ext3() {
        if let Err(e) = journal::append(fs, op, path, content) {
            log::warn!("journal append failed for {op} {path}: {e}");
        }
    }
}

/// Creates a directory; with `parents` every missing ancestor is created
/// too (`mkdir -p`). Each creation point requires write permission on the
/// directory it extends.
pub fn mkdir(fs: &mut ExtFs, session: &Session, path: &str, parents: bool) -> Result<()> {
    let path = normalize(path);
    if fs.resolve(&path).is_ok() {
        return Err(FsError::AlreadyExists(path));
    }

    let segments = components(&path);
    let mut current = ROOT_INODE;
    let mut walked = "/".to_string();
    for (index, segment) in segments.iter().enumerate() {
        let inode = fs.read_inode(current)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory(walked));
        }
        match fs.find_in_dir(&inode, segment)? {
            Some(ino) => current = ino,
            None => {
                if index + 1 < segments.len() && !parents {
                    return Err(FsError::NotFound(walked));
                }
                if !can_write(session, &inode) {
                    return Err(FsError::PermissionDenied(walked));
                }
                current =
                    fs.create_dir_at(current, segment, session.uid, session.gid, default_perm())?;
            }
        }
        walked = join(&walked, segment);
    }

    journal_op(fs, "mkdir", &path, "");
    Ok(())
}

/// Creates (or overwrites) a file with the given content; with `parents`
/// missing directories are created first.
pub fn mkfile(
    fs: &mut ExtFs,
    session: &Session,
    path: &str,
    parents: bool,
    content: &[u8],
) -> Result<()> {
    let path = normalize(path);
    let (parent, name) = split(&path);
    if name.is_empty() {
        return Err(FsError::BadParam("a file name is required".into()));
    }

    let parent_ino = match fs.resolve(&parent) {
        Ok(ino) => ino,
        Err(FsError::NotFound(_)) if parents => {
            mkdir(fs, session, &parent, true)?;
            fs.resolve(&parent)?
        }
        Err(e) => return Err(e),
    };
    let parent_inode = fs.read_inode(parent_ino)?;
    if !parent_inode.is_dir() {
        return Err(FsError::NotADirectory(parent));
    }
    if !can_write(session, &parent_inode) {
        return Err(FsError::PermissionDenied(parent));
    }

    match fs.find_in_dir(&parent_inode, &name)? {
        Some(existing) => {
            let inode = fs.read_inode(existing)?;
            if !inode.is_file() {
                return Err(FsError::AlreadyExists(path));
            }
            if !can_write(session, &inode) {
                return Err(FsError::PermissionDenied(path));
            }
            fs.overwrite_file(existing, content)?;
        }
        None => {
            fs.create_file_at(
                parent_ino,
                &name,
                content,
                session.uid,
                session.gid,
                default_perm(),
            )?;
        }
    }

    journal_op(
        fs,
        "mkfile",
        &path,
        &String::from_utf8_lossy(content),
    );
    Ok(())
}

/// Builds mkfile content from the `-size`/`-cont` parameters: an explicit
/// content wins (a host file path is read, any other text is literal), a
/// size produces that many bytes of cyclic `0123456789`.
pub fn mkfile_content(size: Option<i64>, cont: Option<&str>) -> Result<Vec<u8>> {
    if let Some(cont) = cont {
        let host = std::path::Path::new(cont);
        if host.is_file() {
            return Ok(std::fs::read(host)?);
        }
        return Ok(cont.as_bytes().to_vec());
    }
    let size = size.unwrap_or(0);
    if size < 0 {
        return Err(FsError::BadParam("size must not be negative".into()));
    }
    Ok((0..size).map(|i| b'0' + (i % 10) as u8).collect())
}

/// Reads a file's content as text. Requires read permission.
pub fn cat(fs: &ExtFs, session: &Session, path: &str) -> Result<String> {
    let path = normalize(path);
    let ino = fs.resolve(&path)?;
    let inode = fs.read_inode(ino)?;
    if !inode.is_file() {
        return Err(FsError::NotAFile(path));
    }
    if !can_read(session, &inode) {
        return Err(FsError::PermissionDenied(path));
    }
    let content = fs.read_inode_content(&inode)?;
    Ok(String::from_utf8_lossy(&content).into_owned())
}

/// Overwrites a file's content. Requires write permission.
pub fn edit(fs: &mut ExtFs, session: &Session, path: &str, content: &[u8]) -> Result<()> {
    let path = normalize(path);
    let ino = fs.resolve(&path)?;
    let inode = fs.read_inode(ino)?;
    if !inode.is_file() {
        return Err(FsError::NotAFile(path));
    }
    if !can_write(session, &inode) {
        return Err(FsError::PermissionDenied(path));
    }
    fs.overwrite_file(ino, content)?;
    journal_op(fs, "edit", &path, &String::from_utf8_lossy(content));
    Ok(())
}

/// Removes a file or directory tree. Directory removal is all-or-nothing:
/// when any descendant lacks write permission the whole operation aborts
/// before touching anything.
pub fn remove(fs: &mut ExtFs, session: &Session, path: &str) -> Result<()> {
    let path = normalize(path);
    let ino = fs.resolve(&path)?;
    if ino == ROOT_INODE {
        return Err(FsError::RootProtected);
    }
    let inode = fs.read_inode(ino)?;

    let (parent, _) = split(&path);
    let parent_inode = fs.read_inode(fs.resolve(&parent)?)?;
    if !can_write(session, &parent_inode) || !can_write(session, &inode) {
        return Err(FsError::PermissionDenied(path));
    }

    if inode.is_file() {
        fs.remove_file(&path)?;
    } else {
        if let Some(denied) = first_denied(fs, session, &inode, &path)? {
            return Err(FsError::PermissionDenied(denied));
        }
        remove_tree(fs, &path)?;
    }
    journal_op(fs, "remove", &path, "");
    Ok(())
}

/// Depth-first scan for a descendant the session may not remove.
fn first_denied(
    fs: &ExtFs,
    session: &Session,
    dir: &Inode,
    dir_path: &str,
) -> Result<Option<String>> {
    for (name, ino) in fs.dir_children(dir)? {
        let child_path = join(dir_path, &name);
        let child = fs.read_inode(ino)?;
        if !can_write(session, &child) {
            return Ok(Some(child_path));
        }
        if child.is_dir() {
            if let Some(denied) = first_denied(fs, session, &child, &child_path)? {
                return Ok(Some(denied));
            }
        }
    }
    Ok(None)
}

fn remove_tree(fs: &mut ExtFs, path: &str) -> Result<()> {
    let ino = fs.resolve(path)?;
    let inode = fs.read_inode(ino)?;
    if inode.is_file() {
        return fs.remove_file(path);
    }
    for (name, _) in fs.dir_children(&inode)? {
        remove_tree(fs, &join(path, &name))?;
    }
    fs.remove_empty_dir(path)
}

/// Renames an entry in place. Requires write permission on the entry and
/// its parent directory.
pub fn rename(fs: &mut ExtFs, session: &Session, path: &str, new_name: &str) -> Result<()> {
    let path = normalize(path);
    if new_name.len() > crate::structures::block::DIR_NAME_LEN {
        return Err(FsError::BadParam(format!(
            "name '{new_name}' exceeds {} bytes",
            crate::structures::block::DIR_NAME_LEN
        )));
    }
    let ino = fs.resolve(&path)?;
    if ino == ROOT_INODE {
        return Err(FsError::RootProtected);
    }
    let inode = fs.read_inode(ino)?;
    let (parent, old_name) = split(&path);
    let parent_ino = fs.resolve(&parent)?;
    let parent_inode = fs.read_inode(parent_ino)?;

    if !can_write(session, &inode) || !can_write(session, &parent_inode) {
        return Err(FsError::PermissionDenied(path));
    }
    if fs.find_in_dir(&parent_inode, new_name)?.is_some() {
        return Err(FsError::AlreadyExists(join(&parent, new_name)));
    }

    fs.remove_dir_entry(parent_ino, &old_name)?;
    fs.add_dir_entry(parent_ino, new_name, ino)
}

/// Copies a file or directory tree into the directory `to`. Entries the
/// session cannot read are skipped rather than failing the whole copy.
pub fn copy(fs: &mut ExtFs, session: &Session, from: &str, to: &str) -> Result<()> {
    let from = normalize(from);
    let to = normalize(to);

    let src_ino = fs.resolve(&from)?;
    let src = fs.read_inode(src_ino)?;
    if !can_read(session, &src) {
        return Err(FsError::PermissionDenied(from));
    }

    let dst_ino = fs.resolve(&to)?;
    let dst = fs.read_inode(dst_ino)?;
    if !dst.is_dir() {
        return Err(FsError::NotADirectory(to));
    }
    if !can_write(session, &dst) {
        return Err(FsError::PermissionDenied(to));
    }

    let (_, name) = split(&from);
    if fs.find_in_dir(&dst, &name)?.is_some() {
        return Err(FsError::AlreadyExists(join(&to, &name)));
    }
    copy_node(fs, session, src_ino, dst_ino, &name)
}

fn copy_node(
    fs: &mut ExtFs,
    session: &Session,
    src_ino: i32,
    dst_parent: i32,
    name: &str,
) -> Result<()> {
    let src = fs.read_inode(src_ino)?;
    if src.is_file() {
        let content = fs.read_inode_content(&src)?;
        fs.create_file_at(
            dst_parent,
            name,
            &content,
            session.uid,
            session.gid,
            src.perm(),
        )?;
        return Ok(());
    }

    let new_dir = fs.create_dir_at(dst_parent, name, session.uid, session.gid, src.perm())?;
    for (child_name, child_ino) in fs.dir_children(&src)? {
        let child = fs.read_inode(child_ino)?;
        if !can_read(session, &child) {
            log::warn!("copy skips unreadable entry '{child_name}'");
            continue;
        }
        copy_node(fs, session, child_ino, new_dir, &child_name)?;
    }
    Ok(())
}

/// Moves a file or directory into the directory `to` by relinking it (no
/// data migration). Requires write permission on the entry, its old parent
/// and the destination directory.
pub fn move_entry(fs: &mut ExtFs, session: &Session, from: &str, to: &str) -> Result<()> {
    let from = normalize(from);
    let to = normalize(to);
    if to == from || to.starts_with(&format!("{from}/")) {
        return Err(FsError::BadParam(
            "cannot move a directory into itself".into(),
        ));
    }

    let ino = fs.resolve(&from)?;
    if ino == ROOT_INODE {
        return Err(FsError::RootProtected);
    }
    let inode = fs.read_inode(ino)?;
    let (old_parent, name) = split(&from);
    let old_parent_ino = fs.resolve(&old_parent)?;
    let old_parent_inode = fs.read_inode(old_parent_ino)?;

    let dst_ino = fs.resolve(&to)?;
    let dst = fs.read_inode(dst_ino)?;
    if !dst.is_dir() {
        return Err(FsError::NotADirectory(to));
    }
    if !can_write(session, &inode)
        || !can_write(session, &old_parent_inode)
        || !can_write(session, &dst)
    {
        return Err(FsError::PermissionDenied(from));
    }
    if fs.find_in_dir(&dst, &name)?.is_some() {
        return Err(FsError::AlreadyExists(join(&to, &name)));
    }

    fs.add_dir_entry(dst_ino, &name, ino)?;
    fs.remove_dir_entry(old_parent_ino, &name)?;

    // A moved directory's ".." entry follows it to the new parent.
    if inode.is_dir() {
        if let Some(block) = inode.direct_blocks().next() {
            let mut data = fs.read_dir_block(block)?;
            if let Some(dotdot) = data
                .entries
                .iter_mut()
                .find(|e| !e.is_free() && e.name.matches(".."))
            {
                dotdot.inode = dst_ino;
                fs.write_dir_block(block, &data)?;
            }
        }
    }
    Ok(())
}

/// Converts a `find` glob to an anchored regex: `?` matches one character,
/// `*` one or more, everything else is literal.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\?", ".")
        .replace(r"\*", ".+");
    Regex::new(&format!("^{escaped}$"))
        .map_err(|e| FsError::BadParam(format!("bad search pattern '{pattern}': {e}")))
}

/// Pre-order search below `root` for names matching the glob. Subtrees the
/// session cannot read are pruned silently.
pub fn find(fs: &ExtFs, session: &Session, root: &str, pattern: &str) -> Result<Vec<String>> {
    let root = normalize(root);
    let regex = glob_to_regex(pattern)?;
    let root_ino = fs.resolve(&root)?;
    let root_inode = fs.read_inode(root_ino)?;
    if !can_read(session, &root_inode) {
        return Ok(Vec::new());
    }

    let mut matches = Vec::new();
    find_walk(fs, session, &root_inode, &root, &regex, &mut matches)?;
    Ok(matches)
}

fn find_walk(
    fs: &ExtFs,
    session: &Session,
    dir: &Inode,
    dir_path: &str,
    regex: &Regex,
    matches: &mut Vec<String>,
) -> Result<()> {
    for (name, ino) in fs.dir_children(dir)? {
        let child = fs.read_inode(ino)?;
        if !can_read(session, &child) {
            continue;
        }
        let child_path = join(dir_path, &name);
        if regex.is_match(&name) {
            matches.push(child_path.clone());
        }
        if child.is_dir() {
            find_walk(fs, session, &child, &child_path, regex, matches)?;
        }
    }
    Ok(())
}

/// Changes an entry's permissions. Only root or the owner may; the
/// recursive variant continues past entries it cannot change.
pub fn chmod(
    fs: &mut ExtFs,
    session: &Session,
    path: &str,
    octal: i32,
    recursive: bool,
) -> Result<()> {
    let path = normalize(path);
    let perm = Perm::from_octal(octal)?;
    let ino = fs.resolve(&path)?;
    let inode = fs.read_inode(ino)?;
    if !owns(session, &inode) {
        return Err(FsError::PermissionDenied(path));
    }
    apply_perm(fs, session, ino, perm, recursive)
}

fn apply_perm(
    fs: &mut ExtFs,
    session: &Session,
    ino: i32,
    perm: Perm,
    recursive: bool,
) -> Result<()> {
    let mut inode = fs.read_inode(ino)?;
    if owns(session, &inode) {
        inode.perm = perm.0;
        inode.touch_modified();
        fs.write_inode(ino, &inode)?;
    } else {
        log::warn!("chmod skips inode {ino}: not the owner");
    }
    if recursive && inode.is_dir() {
        for (_, child) in fs.dir_children(&inode)? {
            apply_perm(fs, session, child, perm, true)?;
        }
    }
    Ok(())
}

/// Changes an entry's owner to `user` (uid and the user's group gid). Only
/// root or the current owner may; the recursive variant continues past
/// entries it cannot change.
pub fn chown(
    fs: &mut ExtFs,
    session: &Session,
    path: &str,
    user: &str,
    recursive: bool,
) -> Result<()> {
    let path = normalize(path);
    let db = read_users(fs)?;
    let record = db
        .find_user(user)
        .ok_or_else(|| FsError::UserMissing(user.to_string()))?;
    let (uid, gid) = match record {
        UserRecord::User { id, group, .. } => {
            let gid = db
                .find_group(group)
                .map(|g| g.id())
                .ok_or_else(|| FsError::GroupMissing(group.clone()))?;
            (*id, gid)
        }
        UserRecord::Group { .. } => return Err(FsError::UserMissing(user.to_string())),
    };

    let ino = fs.resolve(&path)?;
    let inode = fs.read_inode(ino)?;
    if !owns(session, &inode) {
        return Err(FsError::PermissionDenied(path));
    }
    apply_owner(fs, session, ino, uid, gid, recursive)
}

fn apply_owner(
    fs: &mut ExtFs,
    session: &Session,
    ino: i32,
    uid: i32,
    gid: i32,
    recursive: bool,
) -> Result<()> {
    let mut inode = fs.read_inode(ino)?;
    if owns(session, &inode) {
        inode.uid = uid;
        inode.gid = gid;
        inode.touch_modified();
        fs.write_inode(ino, &inode)?;
    } else {
        log::warn!("chown skips inode {ino}: not the owner");
    }
    if recursive && inode.is_dir() {
        for (_, child) in fs.dir_children(&inode)? {
            apply_owner(fs, session, child, uid, gid, true)?;
        }
    }
    Ok(())
}

// users.txt command family (root only) -----------------------------------

fn require_root(session: &Session) -> Result<()> {
    if !session.is_root() {
        return Err(FsError::NotRoot);
    }
    Ok(())
}

pub fn mkgrp(fs: &mut ExtFs, session: &Session, name: &str) -> Result<()> {
    require_root(session)?;
    let mut db = read_users(fs)?;
    db.add_group(name)?;
    write_users(fs, &db)?;
    journal_op(fs, "mkgrp", "/users.txt", name);
    Ok(())
}

pub fn rmgrp(fs: &mut ExtFs, session: &Session, name: &str) -> Result<()> {
    require_root(session)?;
    let mut db = read_users(fs)?;
    db.remove_group(name)?;
    write_users(fs, &db)
}

pub fn mkusr(fs: &mut ExtFs, session: &Session, user: &str, pass: &str, grp: &str) -> Result<()> {
    require_root(session)?;
    let mut db = read_users(fs)?;
    db.add_user(user, pass, grp)?;
    write_users(fs, &db)?;
    journal_op(fs, "mkusr", "/users.txt", user);
    Ok(())
}

pub fn rmusr(fs: &mut ExtFs, session: &Session, user: &str) -> Result<()> {
    require_root(session)?;
    let mut db = read_users(fs)?;
    db.remove_user(user)?;
    write_users(fs, &db)
}

pub fn chgrp(fs: &mut ExtFs, session: &Session, user: &str, grp: &str) -> Result<()> {
    require_root(session)?;
    let mut db = read_users(fs)?;
    db.change_group(user, grp)?;
    write_users(fs, &db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::tests::scratch_fs;
    use crate::fs::FsKind;
    use crate::session::login;

    const MIB: i64 = 1024 * 1024;

    fn fs_and_root() -> (tempfile::TempDir, ExtFs, Session) {
        let (dir, fs) = scratch_fs(FsKind::Ext2, MIB);
        let session = login(&fs, None, "root", "123", "681A").unwrap();
        (dir, fs, session)
    }

    /// A second, unprivileged user (uid 2, gid 2 in group "devs").
    fn add_plain_user(fs: &mut ExtFs, session: &Session) -> Session {
        mkgrp(fs, session, "devs").unwrap();
        mkusr(fs, session, "ana", "pw", "devs").unwrap();
        login(fs, None, "ana", "pw", "681A").unwrap()
    }

    #[test]
    fn mkdir_requires_parents_flag_for_deep_paths() {
        let (_d, mut fs, root) = fs_and_root();
        assert!(matches!(
            mkdir(&mut fs, &root, "/a/b/c", false),
            Err(FsError::NotFound(_))
        ));
        mkdir(&mut fs, &root, "/a/b/c", true).unwrap();
        assert!(fs.resolve("/a/b/c").is_ok());
        assert!(matches!(
            mkdir(&mut fs, &root, "/a/b/c", true),
            Err(FsError::AlreadyExists(_))
        ));
    }

    #[test]
    fn mkfile_and_cat_round_trip() {
        let (_d, mut fs, root) = fs_and_root();
        let content = mkfile_content(Some(10), None).unwrap();
        assert_eq!(content, b"0123456789");
        mkfile(&mut fs, &root, "/a.txt", false, &content).unwrap();
        assert_eq!(cat(&fs, &root, "/a.txt").unwrap(), "0123456789");

        // Literal -cont text wins over -size.
        let content = mkfile_content(Some(4), Some("hello")).unwrap();
        assert_eq!(content, b"hello");
    }

    #[test]
    fn cat_enforces_read_permission() {
        let (_d, mut fs, root) = fs_and_root();
        mkfile(&mut fs, &root, "/secret.txt", false, b"top").unwrap();
        chmod(&mut fs, &root, "/secret.txt", 600, false).unwrap();

        let ana = add_plain_user(&mut fs, &root);
        assert!(matches!(
            cat(&fs, &ana, "/secret.txt"),
            Err(FsError::PermissionDenied(_))
        ));
        assert_eq!(cat(&fs, &root, "/secret.txt").unwrap(), "top");
    }

    #[test]
    fn edit_overwrites_in_place() {
        let (_d, mut fs, root) = fs_and_root();
        mkfile(&mut fs, &root, "/f.txt", false, b"one").unwrap();
        edit(&mut fs, &root, "/f.txt", b"two").unwrap();
        assert_eq!(cat(&fs, &root, "/f.txt").unwrap(), "two");
    }

    #[test]
    fn remove_directory_is_all_or_nothing() {
        let (_d, mut fs, root) = fs_and_root();
        mkdir(&mut fs, &root, "/data/inner", true).unwrap();
        mkfile(&mut fs, &root, "/data/inner/f.txt", false, b"x").unwrap();

        // A write-protected descendant aborts the whole removal.
        chmod(&mut fs, &root, "/data/inner/f.txt", 444, false).unwrap();
        let ana = add_plain_user(&mut fs, &root);
        chmod(&mut fs, &root, "/", 777, false).unwrap();
        chmod(&mut fs, &root, "/data", 777, false).unwrap();
        chmod(&mut fs, &root, "/data/inner", 777, false).unwrap();
        assert!(matches!(
            remove(&mut fs, &ana, "/data"),
            Err(FsError::PermissionDenied(_))
        ));
        assert!(fs.resolve("/data/inner/f.txt").is_ok());

        // Root removes the whole tree.
        remove(&mut fs, &root, "/data").unwrap();
        assert!(fs.resolve("/data").is_err());
    }

    #[test]
    fn rename_keeps_the_inode() {
        let (_d, mut fs, root) = fs_and_root();
        mkfile(&mut fs, &root, "/old.txt", false, b"data").unwrap();
        let ino = fs.resolve("/old.txt").unwrap();
        rename(&mut fs, &root, "/old.txt", "new.txt").unwrap();
        assert_eq!(fs.resolve("/new.txt").unwrap(), ino);
        assert!(fs.resolve("/old.txt").is_err());
    }

    #[test]
    fn copy_replicates_trees_and_skips_unreadable() {
        let (_d, mut fs, root) = fs_and_root();
        mkdir(&mut fs, &root, "/src", false).unwrap();
        mkfile(&mut fs, &root, "/src/a.txt", false, b"a").unwrap();
        mkfile(&mut fs, &root, "/src/hidden.txt", false, b"h").unwrap();
        chmod(&mut fs, &root, "/src/hidden.txt", 600, false).unwrap();
        chmod(&mut fs, &root, "/src", 755, false).unwrap();
        mkdir(&mut fs, &root, "/dst", false).unwrap();
        chmod(&mut fs, &root, "/dst", 777, false).unwrap();

        let ana = add_plain_user(&mut fs, &root);
        copy(&mut fs, &ana, "/src", "/dst").unwrap();
        assert_eq!(cat(&fs, &ana, "/dst/src/a.txt").unwrap(), "a");
        assert!(fs.resolve("/dst/src/hidden.txt").is_err());

        // The source is untouched.
        assert!(fs.resolve("/src/hidden.txt").is_ok());
    }

    #[test]
    fn move_relinks_without_copying() {
        let (_d, mut fs, root) = fs_and_root();
        mkdir(&mut fs, &root, "/a/deep", true).unwrap();
        mkfile(&mut fs, &root, "/a/deep/f.txt", false, b"x").unwrap();
        mkdir(&mut fs, &root, "/b", false).unwrap();

        let ino = fs.resolve("/a/deep").unwrap();
        move_entry(&mut fs, &root, "/a/deep", "/b").unwrap();
        assert_eq!(fs.resolve("/b/deep").unwrap(), ino);
        assert_eq!(cat(&fs, &root, "/b/deep/f.txt").unwrap(), "x");
        assert!(fs.resolve("/a/deep").is_err());

        assert!(matches!(
            move_entry(&mut fs, &root, "/b", "/b/deep"),
            Err(FsError::BadParam(_))
        ));
    }

    #[test]
    fn find_matches_globs_in_preorder() {
        let (_d, mut fs, root) = fs_and_root();
        mkdir(&mut fs, &root, "/docs/sub", true).unwrap();
        mkfile(&mut fs, &root, "/docs/a.txt", false, b"").unwrap();
        mkfile(&mut fs, &root, "/docs/sub/b.txt", false, b"").unwrap();
        mkfile(&mut fs, &root, "/docs/sub/c.md", false, b"").unwrap();

        // Pre-order over the stored entry order: "sub" was created first.
        let hits = find(&fs, &root, "/docs", "*.txt").unwrap();
        assert_eq!(hits, ["/docs/sub/b.txt", "/docs/a.txt"]);

        let hits = find(&fs, &root, "/", "?.md").unwrap();
        assert_eq!(hits, ["/docs/sub/c.md"]);
    }

    #[test]
    fn chmod_and_chown_require_ownership() {
        let (_d, mut fs, root) = fs_and_root();
        mkfile(&mut fs, &root, "/f.txt", false, b"x").unwrap();
        let ana = add_plain_user(&mut fs, &root);
        assert!(matches!(
            chmod(&mut fs, &ana, "/f.txt", 777, false),
            Err(FsError::PermissionDenied(_))
        ));

        chown(&mut fs, &root, "/f.txt", "ana", false).unwrap();
        let inode = fs.read_inode(fs.resolve("/f.txt").unwrap()).unwrap();
        assert_eq!((inode.uid, inode.gid), (2, 2));
        // Now ana owns it.
        chmod(&mut fs, &ana, "/f.txt", 640, false).unwrap();
        let inode = fs.read_inode(fs.resolve("/f.txt").unwrap()).unwrap();
        assert_eq!(inode.perm().to_octal(), 640);
    }

    #[test]
    fn user_commands_require_root() {
        let (_d, mut fs, root) = fs_and_root();
        let ana = add_plain_user(&mut fs, &root);
        assert!(matches!(
            mkgrp(&mut fs, &ana, "x"),
            Err(FsError::NotRoot)
        ));
        assert!(matches!(
            mkusr(&mut fs, &ana, "bob", "pw", "devs"),
            Err(FsError::NotRoot)
        ));
        assert!(matches!(rmusr(&mut fs, &ana, "ana"), Err(FsError::NotRoot)));
    }

    #[test]
    fn glob_conversion() {
        assert!(glob_to_regex("*.txt").unwrap().is_match("a.txt"));
        assert!(!glob_to_regex("*.txt").unwrap().is_match(".txt"));
        assert!(glob_to_regex("a?c").unwrap().is_match("abc"));
        assert!(!glob_to_regex("a?c").unwrap().is_match("ac"));
        assert!(glob_to_regex("a+b").unwrap().is_match("a+b"));
        assert!(!glob_to_regex("a+b").unwrap().is_match("aab"));
    }
}
