//! Command dispatch: one [`Shell`] owns the mount registry and the active
//! session and maps parsed commands onto the core crates.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use vdisk_ext::fs::{journal, ExtFs, FsKind};
use vdisk_ext::report::{render, Report};
use vdisk_ext::session::{login, Session};
use vdisk_ext::ops;
use vdisk_part::manager::{DeleteMode, PartitionKind, PartitionSpec};
use vdisk_part::mount::MountRegistry;
use vdisk_part::{create_disk, disk_info, remove_disk, Fit, Unit};

use crate::parser::{tokenize, RawCommand};

/// Result of executing one line.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to print (blank line, comment, or a quiet command).
    Quiet,
    /// Text for stdout.
    Text(String),
    /// The `exit` command.
    Exit,
}

/// The interpreter state: mounted partitions and the (single) session.
#[derive(Default)]
pub struct Shell {
    registry: MountRegistry,
    session: Option<Session>,
}

impl Shell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and executes one input line.
    pub fn execute_line(&mut self, line: &str) -> Result<Outcome> {
        match tokenize(line)? {
            None => Ok(Outcome::Quiet),
            Some(raw) => self.dispatch(raw),
        }
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| anyhow!("no active session, login first"))
    }

    /// The filesystem of the mounted partition `id`.
    fn fs_for_id(&self, id: &str) -> Result<ExtFs> {
        let mount = self.registry.get(id)?;
        Ok(ExtFs::open_mounted(mount)?)
    }

    /// The filesystem the active session is bound to.
    fn session_fs(&self) -> Result<(ExtFs, Session)> {
        let session = self.session()?.clone();
        let fs = self.fs_for_id(&session.mount_id)?;
        Ok((fs, session))
    }

    fn dispatch(&mut self, mut raw: RawCommand) -> Result<Outcome> {
        let name = raw.name.clone();
        match name.as_str() {
            "exit" => {
                raw.finish()?;
                Ok(Outcome::Exit)
            }

            // Disk lifecycle -------------------------------------------
            "mkdisk" => {
                let size = raw.require_i64("size")?;
                let unit = Unit::parse(&raw.take("unit")?.unwrap_or_else(|| "M".into()))?;
                let fit = Fit::parse(&raw.take("fit")?.unwrap_or_else(|| "FF".into()))?;
                let path = PathBuf::from(raw.require("path")?);
                raw.finish()?;
                if size <= 0 {
                    bail!("disk size must be greater than zero");
                }
                create_disk(&path, unit.bytes(size), fit)?;
                Ok(Outcome::Text(format!("disk created: {}", path.display())))
            }
            "rmdisk" => {
                let path = PathBuf::from(raw.require("path")?);
                raw.finish()?;
                remove_disk(&path)?;
                Ok(Outcome::Text(format!("disk removed: {}", path.display())))
            }
            "showdisk" => {
                let path = PathBuf::from(raw.require("path")?);
                raw.finish()?;
                let info = disk_info(&path)?;
                Ok(Outcome::Text(format_disk_info(&info)))
            }

            // Partitions -----------------------------------------------
            "fdisk" => self.fdisk(raw),

            // Mounting -------------------------------------------------
            "mount" => {
                let path = PathBuf::from(raw.require("path")?);
                let part = raw.require("name")?;
                raw.finish()?;
                let id = self.registry.mount(&path, &part)?;
                Ok(Outcome::Text(format!("mounted {part} as {id}")))
            }
            "unmount" => {
                let id = raw.require("id")?;
                raw.finish()?;
                self.registry.unmount(&id)?;
                if self
                    .session
                    .as_ref()
                    .is_some_and(|s| s.mount_id == id)
                {
                    self.session = None;
                }
                Ok(Outcome::Text(format!("unmounted {id}")))
            }
            "mounted" => {
                raw.finish()?;
                let mut out = String::new();
                for mount in self.registry.mounted() {
                    out.push_str(&format!(
                        "{}  {}  {}\n",
                        mount.id,
                        mount.disk.display(),
                        mount.name
                    ));
                }
                if out.is_empty() {
                    out.push_str("no partitions mounted\n");
                }
                Ok(Outcome::Text(out.trim_end().to_string()))
            }

            // Formatting and journaling --------------------------------
            "mkfs" => {
                let id = raw.require("id")?;
                let _type = raw.take("type")?; // only "full" formats exist
                let fs_kind =
                    FsKind::parse(&raw.take("fs")?.unwrap_or_else(|| "2fs".into()))?;
                raw.finish()?;
                let mount = self.registry.get(&id)?;
                ExtFs::format(&mount.disk, mount.start, mount.size, fs_kind)?;
                Ok(Outcome::Text(format!("formatted {id} as {fs_kind:?}")))
            }
            "recovery" => {
                let id = raw.require("id")?;
                raw.finish()?;
                let mut fs = self.fs_for_id(&id)?;
                journal::recover(&mut fs)?;
                Ok(Outcome::Text(format!("recovered {id}")))
            }
            "loss" => {
                let id = raw.require("id")?;
                raw.finish()?;
                let fs = self.fs_for_id(&id)?;
                journal::simulate_loss(&fs)?;
                Ok(Outcome::Text(format!("simulated loss on {id}")))
            }
            "journaling" => {
                let id = raw.require("id")?;
                raw.finish()?;
                let fs = self.fs_for_id(&id)?;
                Ok(Outcome::Text(format_journal(&fs)?))
            }

            // Session --------------------------------------------------
            "login" => {
                let user = raw.require("user")?;
                let pass = raw.require("pass")?;
                let id = raw.require("id")?;
                raw.finish()?;
                let fs = self.fs_for_id(&id)?;
                let session = login(&fs, self.session.as_ref(), &user, &pass, &id)?;
                self.session = Some(session);
                Ok(Outcome::Text(format!("welcome, {user}")))
            }
            "logout" => {
                raw.finish()?;
                match self.session.take() {
                    Some(session) => Ok(Outcome::Text(format!("goodbye, {}", session.username))),
                    None => bail!("no active session"),
                }
            }

            // users.txt management -------------------------------------
            "mkgrp" => {
                let group = raw.require("name")?;
                raw.finish()?;
                let (mut fs, session) = self.session_fs()?;
                ops::mkgrp(&mut fs, &session, &group)?;
                Ok(Outcome::Text(format!("group created: {group}")))
            }
            "rmgrp" => {
                let group = raw.require("name")?;
                raw.finish()?;
                let (mut fs, session) = self.session_fs()?;
                ops::rmgrp(&mut fs, &session, &group)?;
                Ok(Outcome::Text(format!("group removed: {group}")))
            }
            "mkusr" => {
                let user = raw.require("user")?;
                let pass = raw.require("pass")?;
                let group = raw.require("grp")?;
                raw.finish()?;
                let (mut fs, session) = self.session_fs()?;
                ops::mkusr(&mut fs, &session, &user, &pass, &group)?;
                Ok(Outcome::Text(format!("user created: {user}")))
            }
            "rmusr" => {
                let user = raw.require("user")?;
                raw.finish()?;
                let (mut fs, session) = self.session_fs()?;
                ops::rmusr(&mut fs, &session, &user)?;
                Ok(Outcome::Text(format!("user removed: {user}")))
            }
            "chgrp" => {
                let user = raw.require("user")?;
                let group = raw.require("grp")?;
                raw.finish()?;
                let (mut fs, session) = self.session_fs()?;
                ops::chgrp(&mut fs, &session, &user, &group)?;
                Ok(Outcome::Text(format!("user {user} moved to group {group}")))
            }

            // Files and directories ------------------------------------
            "mkdir" => {
                let path = raw.require("path")?;
                let parents = raw.flag("p");
                raw.finish()?;
                let (mut fs, session) = self.session_fs()?;
                ops::mkdir(&mut fs, &session, &path, parents)?;
                Ok(Outcome::Text(format!("directory created: {path}")))
            }
            "mkfile" => {
                let path = raw.require("path")?;
                let parents = raw.flag("r");
                let size = raw.parse_i64("size")?;
                let cont = raw.take("cont")?;
                raw.finish()?;
                let content = ops::mkfile_content(size, cont.as_deref())?;
                let (mut fs, session) = self.session_fs()?;
                ops::mkfile(&mut fs, &session, &path, parents, &content)?;
                Ok(Outcome::Text(format!("file created: {path}")))
            }
            "cat" => {
                let files = raw.take_numbered_files()?;
                raw.finish()?;
                if files.is_empty() {
                    bail!("cat requires at least -file1");
                }
                let (fs, session) = self.session_fs()?;
                let mut out = String::new();
                for file in files {
                    out.push_str(&ops::cat(&fs, &session, &file)?);
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                Ok(Outcome::Text(out.trim_end().to_string()))
            }
            "remove" => {
                let path = raw.require("path")?;
                raw.finish()?;
                let (mut fs, session) = self.session_fs()?;
                ops::remove(&mut fs, &session, &path)?;
                Ok(Outcome::Text(format!("removed: {path}")))
            }
            "edit" => {
                let path = raw.require("path")?;
                let cont = raw.require("cont")?;
                raw.finish()?;
                let content = ops::mkfile_content(None, Some(&cont))?;
                let (mut fs, session) = self.session_fs()?;
                ops::edit(&mut fs, &session, &path, &content)?;
                Ok(Outcome::Text(format!("edited: {path}")))
            }
            "rename" => {
                let path = raw.require("path")?;
                let new_name = raw.require("name")?;
                raw.finish()?;
                let (mut fs, session) = self.session_fs()?;
                ops::rename(&mut fs, &session, &path, &new_name)?;
                Ok(Outcome::Text(format!("renamed {path} to {new_name}")))
            }
            "copy" => {
                let path = raw.require("path")?;
                let destination = raw.require("destino")?;
                raw.finish()?;
                let (mut fs, session) = self.session_fs()?;
                ops::copy(&mut fs, &session, &path, &destination)?;
                Ok(Outcome::Text(format!("copied {path} into {destination}")))
            }
            "move" => {
                let path = raw.require("path")?;
                let destination = raw.require("destino")?;
                raw.finish()?;
                let (mut fs, session) = self.session_fs()?;
                ops::move_entry(&mut fs, &session, &path, &destination)?;
                Ok(Outcome::Text(format!("moved {path} into {destination}")))
            }
            "find" => {
                let path = raw.require("path")?;
                let pattern = raw.require("name")?;
                raw.finish()?;
                let (fs, session) = self.session_fs()?;
                let matches = ops::find(&fs, &session, &path, &pattern)?;
                if matches.is_empty() {
                    Ok(Outcome::Text("no matches".to_string()))
                } else {
                    Ok(Outcome::Text(matches.join("\n")))
                }
            }
            "chown" => {
                let path = raw.require("path")?;
                let user = raw.require("user")?;
                let recursive = raw.flag("r");
                raw.finish()?;
                let (mut fs, session) = self.session_fs()?;
                ops::chown(&mut fs, &session, &path, &user, recursive)?;
                Ok(Outcome::Text(format!("owner of {path} set to {user}")))
            }
            "chmod" => {
                let path = raw.require("path")?;
                let ugo = raw.require_i64("ugo")?;
                let recursive = raw.flag("r");
                raw.finish()?;
                let (mut fs, session) = self.session_fs()?;
                ops::chmod(&mut fs, &session, &path, ugo as i32, recursive)?;
                Ok(Outcome::Text(format!("permissions of {path} set to {ugo}")))
            }

            // Reports --------------------------------------------------
            "rep" => self.rep(raw),

            other => bail!("unknown command '{other}'"),
        }
    }

    fn fdisk(&mut self, mut raw: RawCommand) -> Result<Outcome> {
        // Three modes share the command: delete, resize (-add) and create.
        if let Some(mode) = raw.take("delete")? {
            let path = PathBuf::from(raw.require("path")?);
            let part = raw.require("name")?;
            raw.finish()?;
            vdisk_part::delete_partition(&path, &part, DeleteMode::parse(&mode)?)?;
            return Ok(Outcome::Text(format!("partition deleted: {part}")));
        }
        if let Some(add) = raw.parse_i64("add")? {
            let unit = Unit::parse(&raw.take("unit")?.unwrap_or_else(|| "K".into()))?;
            let path = PathBuf::from(raw.require("path")?);
            let part = raw.require("name")?;
            raw.finish()?;
            if add == 0 {
                bail!("-add must not be zero");
            }
            vdisk_part::resize_partition(&path, &part, unit.bytes(add))?;
            return Ok(Outcome::Text(format!("partition resized: {part}")));
        }

        let size = raw.require_i64("size")?;
        let unit = Unit::parse(&raw.take("unit")?.unwrap_or_else(|| "K".into()))?;
        let fit = Fit::parse(&raw.take("fit")?.unwrap_or_else(|| "WF".into()))?;
        let kind = PartitionKind::parse(&raw.take("type")?.unwrap_or_else(|| "P".into()))?;
        let path = PathBuf::from(raw.require("path")?);
        let part = raw.require("name")?;
        raw.finish()?;
        if size <= 0 {
            bail!("partition size must be greater than zero");
        }
        vdisk_part::create_partition(
            &path,
            &PartitionSpec {
                name: part.clone(),
                size: unit.bytes(size),
                kind,
                fit,
            },
        )?;
        Ok(Outcome::Text(format!("partition created: {part}")))
    }

    fn rep(&mut self, mut raw: RawCommand) -> Result<Outcome> {
        let report_name = raw.require("name")?.to_ascii_lowercase();
        let output = PathBuf::from(raw.require("path")?);
        let id = raw.require("id")?;
        let fs_path = raw.take("path_file_ls")?;
        raw.finish()?;

        let mount = self.registry.get(&id)?;
        let disk = mount.disk.clone();
        let dot = match report_name.as_str() {
            "mbr" => render(&Report::Mbr(&disk_info(&disk)?))?,
            "disk" => render(&Report::Disk(&disk_info(&disk)?))?,
            "ebr" => render(&Report::Ebr(&disk_info(&disk)?))?,
            "sb" => render(&Report::Sb(&self.fs_for_id(&id)?))?,
            "inode" => render(&Report::Inode(&self.fs_for_id(&id)?))?,
            "journaling" => render(&Report::Journaling(&self.fs_for_id(&id)?))?,
            "file" => {
                let target = fs_path
                    .ok_or_else(|| anyhow!("report 'file' requires -path_file_ls"))?;
                render(&Report::File {
                    fs: &self.fs_for_id(&id)?,
                    path: &target,
                })?
            }
            "ls" => {
                let target = fs_path.unwrap_or_else(|| "/".to_string());
                render(&Report::Ls {
                    fs: &self.fs_for_id(&id)?,
                    path: &target,
                })?
            }
            other => bail!("unknown report '{other}'"),
        };

        if let Some(dir) = output.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating {}", dir.display()))?;
            }
        }
        std::fs::write(&output, dot)
            .with_context(|| format!("writing {}", output.display()))?;
        Ok(Outcome::Text(format!(
            "report '{report_name}' written to {}",
            output.display()
        )))
    }
}

fn format_disk_info(info: &vdisk_part::DiskInfo) -> String {
    let mut out = format!(
        "disk: {}\nsize: {} bytes\nfit: {:?}\ncreated: {}\nsignature: {}\n",
        info.path,
        info.size,
        info.fit,
        vdisk_common::time::format_unix(info.created as f64),
        info.signature
    );
    out.push_str("partitions:\n");
    for p in &info.partitions {
        out.push_str(&format!(
            "  {:<16} {:?}  start={:<12} size={:<12} mounted={} {}\n",
            p.name, p.kind, p.start, p.size, p.mounted, p.id
        ));
    }
    if !info.logicals.is_empty() {
        out.push_str("logical partitions:\n");
        for l in &info.logicals {
            out.push_str(&format!(
                "  {:<16} Logical  start={:<12} size={:<12} mounted={}\n",
                l.name, l.start, l.size, l.mounted
            ));
        }
    }
    out.push_str("free gaps:\n");
    for gap in &info.free {
        out.push_str(&format!("  start={:<12} len={}\n", gap.start, gap.len));
    }
    out.trim_end().to_string()
}

fn format_journal(fs: &ExtFs) -> Result<String> {
    let entries = journal::entries(fs)?;
    if entries.is_empty() {
        return Ok("journal is empty".to_string());
    }
    let mut out = format!("{:<4} {:<10} {:<32} {:<20} content\n", "#", "op", "path", "date");
    for (index, entry) in entries.iter().enumerate() {
        let mut content = entry.content().to_string();
        if content.len() > 60 {
            content.truncate(60);
            content.push_str("...");
        }
        out.push_str(&format!(
            "{:<4} {:<10} {:<32} {:<20} {}\n",
            index,
            entry.op(),
            entry.path(),
            vdisk_common::time::format_unix(entry.date),
            content
        ));
    }
    Ok(out.trim_end().to_string())
}
