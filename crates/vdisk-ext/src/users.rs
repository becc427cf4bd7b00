//! The `users.txt` account database.
//!
//! Line grammar: `ID, U, group, user, password` for users and
//! `ID, G, group` for groups. Malformed lines are dropped on parse. A record
//! with `ID == 0` is a tombstone: physically retained, logically deleted.

use crate::fs::{ExtFs, USERS_HEAD_BLOCK, USERS_INODE};
use crate::structures::block::{FileBlock, BLOCK_SIZE};
use crate::structures::inode::DIRECT_BLOCKS;
use crate::{FsError, Result};

/// Maximum length of user, password and group names.
pub const NAME_LIMIT: usize = 10;

/// One parsed line of `users.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRecord {
    Group {
        id: i32,
        name: String,
    },
    User {
        id: i32,
        group: String,
        name: String,
        password: String,
    },
}

impl UserRecord {
    /// Parses one line; `None` for blank or malformed input.
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < 3 {
            return None;
        }
        let id: i32 = parts[0].parse().ok()?;
        match parts[1] {
            "G" => Some(Self::Group {
                id,
                name: parts[2].to_string(),
            }),
            "U" if parts.len() >= 5 => Some(Self::User {
                id,
                group: parts[2].to_string(),
                name: parts[3].to_string(),
                password: parts[4].to_string(),
            }),
            _ => None,
        }
    }

    pub fn serialize(&self) -> String {
        match self {
            Self::Group { id, name } => format!("{id}, G, {name}"),
            Self::User {
                id,
                group,
                name,
                password,
            } => format!("{id}, U, {group}, {name}, {password}"),
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            Self::Group { id, .. } | Self::User { id, .. } => *id,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.id() == 0
    }
}

/// The in-memory users database, preserving line order (tombstones
/// included).
#[derive(Debug, Clone, Default)]
pub struct UsersDb {
    pub records: Vec<UserRecord>,
}

impl UsersDb {
    pub fn parse(content: &str) -> Self {
        Self {
            records: content.lines().filter_map(UserRecord::parse).collect(),
        }
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&record.serialize());
            out.push('\n');
        }
        out
    }

    pub fn find_user(&self, name: &str) -> Option<&UserRecord> {
        self.records.iter().find(
            |r| matches!(r, UserRecord::User { id, name: n, .. } if *id != 0 && n == name),
        )
    }

    pub fn find_group(&self, name: &str) -> Option<&UserRecord> {
        self.records.iter().find(
            |r| matches!(r, UserRecord::Group { id, name: n } if *id != 0 && n == name),
        )
    }

    pub fn next_user_id(&self) -> i32 {
        self.records
            .iter()
            .filter_map(|r| match r {
                UserRecord::User { id, .. } => Some(*id),
                _ => None,
            })
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn next_group_id(&self) -> i32 {
        self.records
            .iter()
            .filter_map(|r| match r {
                UserRecord::Group { id, .. } => Some(*id),
                _ => None,
            })
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn add_group(&mut self, name: &str) -> Result<()> {
        check_name(name)?;
        if self.find_group(name).is_some() {
            return Err(FsError::GroupExists(name.to_string()));
        }
        self.records.push(UserRecord::Group {
            id: self.next_group_id(),
            name: name.to_string(),
        });
        Ok(())
    }

    pub fn remove_group(&mut self, name: &str) -> Result<()> {
        let target = self
            .records
            .iter_mut()
            .find(|r| matches!(r, UserRecord::Group { id, name: n } if *id != 0 && n == name))
            .ok_or_else(|| FsError::GroupMissing(name.to_string()))?;
        if let UserRecord::Group { id, .. } = target {
            *id = 0;
        }
        Ok(())
    }

    pub fn add_user(&mut self, name: &str, password: &str, group: &str) -> Result<()> {
        check_name(name)?;
        check_name(password)?;
        check_name(group)?;
        if self.find_user(name).is_some() {
            return Err(FsError::UserExists(name.to_string()));
        }
        if self.find_group(group).is_none() {
            return Err(FsError::GroupMissing(group.to_string()));
        }
        self.records.push(UserRecord::User {
            id: self.next_user_id(),
            group: group.to_string(),
            name: name.to_string(),
            password: password.to_string(),
        });
        Ok(())
    }

    pub fn remove_user(&mut self, name: &str) -> Result<()> {
        let target = self
            .records
            .iter_mut()
            .find(|r| matches!(r, UserRecord::User { id, name: n, .. } if *id != 0 && n == name))
            .ok_or_else(|| FsError::UserMissing(name.to_string()))?;
        if let UserRecord::User { id, .. } = target {
            *id = 0;
        }
        Ok(())
    }

    /// Moves a user to another (existing) group.
    pub fn change_group(&mut self, user: &str, group: &str) -> Result<()> {
        if self.find_group(group).is_none() {
            return Err(FsError::GroupMissing(group.to_string()));
        }
        let target = self
            .records
            .iter_mut()
            .find(|r| matches!(r, UserRecord::User { id, name: n, .. } if *id != 0 && n == user))
            .ok_or_else(|| FsError::UserMissing(user.to_string()))?;
        if let UserRecord::User { group: g, .. } = target {
            *g = group.to_string();
        }
        Ok(())
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FsError::BadParam("name must not be empty".into()));
    }
    if name.len() > NAME_LIMIT {
        return Err(FsError::BadParam(format!(
            "'{name}' exceeds the {NAME_LIMIT}-character limit"
        )));
    }
    Ok(())
}

/// Reads and parses `users.txt` from the filesystem.
pub fn read_users(fs: &ExtFs) -> Result<UsersDb> {
    let inode = fs.read_inode(USERS_INODE)?;
    let content = fs.read_inode_content(&inode)?;
    Ok(UsersDb::parse(&String::from_utf8_lossy(&content)))
}

/// Serializes the database back into `users.txt`.
///
/// The file keeps its head block and grows into the consecutive block
/// indices `head + i`, which the formatter reserved in the block bitmap for
/// exactly this purpose. Content past the 12-block window is rejected.
pub fn write_users(fs: &mut ExtFs, db: &UsersDb) -> Result<()> {
    let content = db.serialize();
    let bytes = content.as_bytes();
    let blocks_needed = bytes.len().div_ceil(BLOCK_SIZE as usize).max(1);
    if blocks_needed > DIRECT_BLOCKS {
        return Err(FsError::NoFreeBlocks);
    }

    let mut inode = fs.read_inode(USERS_INODE)?;
    // Block 0 is the root directory; a zeroed or unassigned head (after a
    // simulated loss) falls back to the reserved window.
    let head = if inode.block[0] > 0 {
        inode.block[0]
    } else {
        USERS_HEAD_BLOCK
    };

    for i in 0..DIRECT_BLOCKS {
        inode.block[i] = if i < blocks_needed {
            head + i as i32
        } else {
            crate::structures::inode::FREE_PTR
        };
    }
    for (i, chunk) in bytes.chunks(BLOCK_SIZE as usize).enumerate() {
        fs.write_file_block(head + i as i32, &FileBlock::from_slice(chunk))?;
    }

    inode.size = bytes.len() as i32;
    inode.touch_modified();
    fs.write_inode(USERS_INODE, &inode)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fs::tests::scratch_fs;
    use crate::fs::{FsKind, INITIAL_USERS};

    #[test]
    fn parse_round_trip() {
        let db = UsersDb::parse(INITIAL_USERS);
        assert_eq!(db.records.len(), 2);
        assert_eq!(db.serialize(), INITIAL_USERS);
    }

    #[test]
    fn malformed_lines_are_dropped() {
        let db = UsersDb::parse("garbage\n1, G, root\n2, X, what\n,\n1, U, root, root, 123\n");
        assert_eq!(db.records.len(), 2);
        assert!(db.find_group("root").is_some());
        assert!(db.find_user("root").is_some());
    }

    #[test]
    fn ids_grow_per_kind_and_skip_tombstones() {
        let mut db = UsersDb::parse(INITIAL_USERS);
        db.add_group("devs").unwrap();
        db.add_user("ana", "pw", "devs").unwrap();
        assert_eq!(db.find_group("devs").unwrap().id(), 2);
        assert_eq!(db.find_user("ana").unwrap().id(), 2);

        db.remove_user("ana").unwrap();
        assert!(db.find_user("ana").is_none());
        // The tombstone stays in the file; ids restart from the live maximum.
        assert_eq!(db.records.len(), 4);
        db.add_user("ana", "pw", "devs").unwrap();
        assert_eq!(db.find_user("ana").unwrap().id(), 2);
    }

    #[test]
    fn duplicate_and_missing_validations() {
        let mut db = UsersDb::parse(INITIAL_USERS);
        assert!(matches!(
            db.add_group("root"),
            Err(FsError::GroupExists(_))
        ));
        assert!(matches!(
            db.add_user("root", "pw", "root"),
            Err(FsError::UserExists(_))
        ));
        assert!(matches!(
            db.add_user("bob", "pw", "ghosts"),
            Err(FsError::GroupMissing(_))
        ));
        assert!(matches!(
            db.add_user("waytoolongname", "pw", "root"),
            Err(FsError::BadParam(_))
        ));
        assert!(matches!(db.remove_user("nobody"), Err(FsError::UserMissing(_))));
    }

    #[test]
    fn change_group_requires_target_group() {
        let mut db = UsersDb::parse(INITIAL_USERS);
        db.add_group("devs").unwrap();
        db.add_user("ana", "pw", "root").unwrap();
        db.change_group("ana", "devs").unwrap();
        match db.find_user("ana").unwrap() {
            UserRecord::User { group, .. } => assert_eq!(group, "devs"),
            _ => unreachable!(),
        }
        assert!(matches!(
            db.change_group("ana", "ghosts"),
            Err(FsError::GroupMissing(_))
        ));
    }

    #[test]
    fn users_file_grows_into_consecutive_blocks() {
        let (_dir, mut fs) = scratch_fs(FsKind::Ext2, 1024 * 1024);
        let mut db = read_users(&fs).unwrap();
        db.add_group("devs").unwrap();
        for i in 0..6 {
            db.add_user(&format!("user{i}"), "secret", "devs").unwrap();
        }
        write_users(&mut fs, &db).unwrap();

        let inode = fs.read_inode(USERS_INODE).unwrap();
        let blocks: Vec<i32> = inode.direct_blocks().collect();
        assert!(blocks.len() > 1);
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(*block, USERS_HEAD_BLOCK + i as i32);
        }

        let back = read_users(&fs).unwrap();
        assert_eq!(back.serialize(), db.serialize());

        // Shrinking back releases the tail pointers again.
        let small = UsersDb::parse(INITIAL_USERS);
        write_users(&mut fs, &small).unwrap();
        let inode = fs.read_inode(USERS_INODE).unwrap();
        assert_eq!(inode.direct_blocks().count(), 1);
    }
}
