//! UGO permission checks.

use crate::session::Session;
use crate::structures::inode::{Access, Inode, Perm};

/// Whether the session may access the inode with the requested rights.
///
/// Root bypasses every check. Otherwise the owner digit applies when the
/// session uid matches, the group digit when the gid matches, and the other
/// digit in every remaining case.
pub fn can_access(session: &Session, inode: &Inode, access: Access) -> bool {
    if session.is_root() {
        return true;
    }
    let perm = inode.perm();
    let digit = if session.uid == inode.uid {
        perm.owner()
    } else if session.gid == inode.gid {
        perm.group()
    } else {
        perm.other()
    };
    Perm::digit_allows(digit, access)
}

pub fn can_read(session: &Session, inode: &Inode) -> bool {
    can_access(session, inode, Access::READ)
}

pub fn can_write(session: &Session, inode: &Inode) -> bool {
    can_access(session, inode, Access::WRITE)
}

/// chown/chmod rule: root or the owning uid.
pub fn owns(session: &Session, inode: &Inode) -> bool {
    session.is_root() || session.uid == inode.uid
}
