//! The single-slot login session.

use crate::fs::ExtFs;
use crate::users::{read_users, UserRecord};
use crate::{FsError, Result};

/// Uid of the superuser; permission checks do not apply to it.
pub const ROOT_UID: i32 = 1;

/// An authenticated user bound to one mounted partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub uid: i32,
    pub gid: i32,
    pub mount_id: String,
}

impl Session {
    pub fn is_root(&self) -> bool {
        self.uid == ROOT_UID
    }
}

/// Validates credentials against the partition's `users.txt` and builds the
/// session. The caller owns the single active-session slot; pass its current
/// content as `active` so a second login fails.
pub fn login(
    fs: &ExtFs,
    active: Option<&Session>,
    username: &str,
    password: &str,
    mount_id: &str,
) -> Result<Session> {
    if active.is_some() {
        return Err(FsError::SessionActive);
    }

    let db = read_users(fs)?;
    let user = db.find_user(username).ok_or(FsError::BadCredentials)?;
    let (uid, group) = match user {
        UserRecord::User {
            id,
            group,
            password: stored,
            ..
        } => {
            if stored != password {
                return Err(FsError::BadCredentials);
            }
            (*id, group.clone())
        }
        UserRecord::Group { .. } => return Err(FsError::BadCredentials),
    };
    let gid = db
        .find_group(&group)
        .map(|g| g.id())
        .ok_or_else(|| FsError::GroupMissing(group.clone()))?;

    log::debug!("session opened for {username} (uid {uid}, gid {gid}) on {mount_id}");
    Ok(Session {
        username: username.to_string(),
        uid,
        gid,
        mount_id: mount_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::tests::scratch_fs;
    use crate::fs::FsKind;
    use crate::users::write_users;

    #[test]
    fn root_login_succeeds() {
        let (_dir, fs) = scratch_fs(FsKind::Ext2, 1024 * 1024);
        let session = login(&fs, None, "root", "123", "681A").unwrap();
        assert_eq!(session.uid, 1);
        assert_eq!(session.gid, 1);
        assert!(session.is_root());
        assert_eq!(session.mount_id, "681A");
    }

    #[test]
    fn wrong_password_and_unknown_user_fail() {
        let (_dir, fs) = scratch_fs(FsKind::Ext2, 1024 * 1024);
        assert!(matches!(
            login(&fs, None, "root", "wrong", "681A"),
            Err(FsError::BadCredentials)
        ));
        assert!(matches!(
            login(&fs, None, "ghost", "123", "681A"),
            Err(FsError::BadCredentials)
        ));
    }

    #[test]
    fn second_login_is_rejected() {
        let (_dir, fs) = scratch_fs(FsKind::Ext2, 1024 * 1024);
        let session = login(&fs, None, "root", "123", "681A").unwrap();
        assert!(matches!(
            login(&fs, Some(&session), "root", "123", "681A"),
            Err(FsError::SessionActive)
        ));
    }

    #[test]
    fn group_row_supplies_the_gid() {
        let (_dir, mut fs) = scratch_fs(FsKind::Ext2, 1024 * 1024);
        let mut db = crate::users::read_users(&fs).unwrap();
        db.add_group("devs").unwrap();
        db.add_user("ana", "pw", "devs").unwrap();
        write_users(&mut fs, &db).unwrap();

        let session = login(&fs, None, "ana", "pw", "681A").unwrap();
        assert_eq!(session.uid, 2);
        assert_eq!(session.gid, 2);
        assert!(!session.is_root());
    }
}
