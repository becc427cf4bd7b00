//! Graphviz DOT report rendering.
//!
//! Each report variant renders one self-contained `digraph` whose nodes use
//! HTML-like table labels. The caller decides where the DOT text goes (a
//! file for the `rep` command).

use vdisk_common::time::format_unix;
use vdisk_part::disk::DiskInfo;
use vdisk_part::manager::PartitionKind;

use crate::fs::journal;
use crate::fs::ExtFs;
use crate::structures::inode::FileKind;
use crate::{FsError, Result};

/// The report surface: one variant per `rep -name=` value.
#[derive(Debug)]
pub enum Report<'a> {
    Mbr(&'a DiskInfo),
    Disk(&'a DiskInfo),
    Ebr(&'a DiskInfo),
    Sb(&'a ExtFs),
    Inode(&'a ExtFs),
    Journaling(&'a ExtFs),
    File { fs: &'a ExtFs, path: &'a str },
    Ls { fs: &'a ExtFs, path: &'a str },
}

pub fn render(report: &Report) -> Result<String> {
    match report {
        Report::Mbr(info) => Ok(render_mbr(info)),
        Report::Disk(info) => Ok(render_disk(info)),
        Report::Ebr(info) => Ok(render_ebr(info)),
        Report::Sb(fs) => Ok(render_sb(fs)),
        Report::Inode(fs) => render_inodes(fs),
        Report::Journaling(fs) => render_journal(fs),
        Report::File { fs, path } => render_file(fs, path),
        Report::Ls { fs, path } => render_ls(fs, path),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn header(title: &str) -> String {
    format!(
        "digraph G {{\n  node [shape=plaintext];\n  report [label=<\n    <table border=\"1\" cellborder=\"1\" cellspacing=\"0\">\n      <tr><td colspan=\"2\" bgcolor=\"lightblue\"><b>{}</b></td></tr>\n",
        escape(title)
    )
}

fn row(label: &str, value: &str) -> String {
    format!(
        "      <tr><td>{}</td><td>{}</td></tr>\n",
        escape(label),
        escape(value)
    )
}

const FOOTER: &str = "    </table>\n  >];\n}\n";

fn kind_letter(kind: PartitionKind) -> &'static str {
    match kind {
        PartitionKind::Primary => "P",
        PartitionKind::Extended => "E",
        PartitionKind::Logical => "L",
    }
}

fn render_mbr(info: &DiskInfo) -> String {
    let mut out = header(&format!("MBR {}", info.path));
    out.push_str(&row("size", &info.size.to_string()));
    out.push_str(&row("created", &format_unix(info.created as f64)));
    out.push_str(&row("signature", &info.signature.to_string()));
    out.push_str(&row("fit", &format!("{:?}", info.fit)));
    for p in &info.partitions {
        out.push_str(&row(
            &format!("partition {}", p.name),
            &format!(
                "type={} start={} size={} mounted={}",
                kind_letter(p.kind),
                p.start,
                p.size,
                p.mounted
            ),
        ));
    }
    out.push_str(FOOTER);
    out
}

fn render_disk(info: &DiskInfo) -> String {
    // Usage bar: one cell per partition or free gap, in disk order.
    let mut cells: Vec<(i64, String, f64)> = Vec::new();
    for p in &info.partitions {
        if p.kind == PartitionKind::Extended {
            continue;
        }
        cells.push((
            p.start,
            format!("{} ({})", p.name, kind_letter(p.kind)),
            p.size as f64,
        ));
    }
    for l in &info.logicals {
        cells.push((l.start, format!("{} (L)", l.name), l.size as f64));
    }
    for gap in &info.free {
        cells.push((gap.start, "free".to_string(), gap.len as f64));
    }
    cells.sort_by_key(|c| c.0);

    let mut out = format!(
        "digraph G {{\n  node [shape=plaintext];\n  disk [label=<\n    <table border=\"1\" cellborder=\"1\" cellspacing=\"0\">\n      <tr><td colspan=\"{}\" bgcolor=\"lightblue\"><b>{}</b></td></tr>\n      <tr>\n",
        cells.len().max(1),
        escape(&info.path)
    );
    for (_, label, size) in &cells {
        let pct = 100.0 * size / info.size as f64;
        out.push_str(&format!(
            "        <td>{}<br/>{:.1}%</td>\n",
            escape(label),
            pct
        ));
    }
    out.push_str("      </tr>\n");
    out.push_str(FOOTER);
    out
}

fn render_ebr(info: &DiskInfo) -> String {
    let mut out = header(&format!("EBR chain {}", info.path));
    for l in &info.logicals {
        out.push_str(&row(
            &l.name,
            &format!(
                "ebr={} start={} size={} next={} mounted={}",
                l.ebr_offset, l.start, l.size, l.next, l.mounted
            ),
        ));
    }
    out.push_str(FOOTER);
    out
}

fn render_sb(fs: &ExtFs) -> String {
    let sb = &fs.sb;
    let mut out = header("SuperBlock");
    out.push_str(&row("fs_type", &sb.fs_type.to_string()));
    out.push_str(&row("magic", &format!("{:#x}", sb.magic)));
    out.push_str(&row("inodes_count", &sb.inodes_count.to_string()));
    out.push_str(&row("blocks_count", &sb.blocks_count.to_string()));
    out.push_str(&row("free_inodes", &sb.free_inodes_count.to_string()));
    out.push_str(&row("free_blocks", &sb.free_blocks_count.to_string()));
    out.push_str(&row("inode_size", &sb.inode_size.to_string()));
    out.push_str(&row("block_size", &sb.block_size.to_string()));
    out.push_str(&row("bm_inode_start", &sb.bm_inode_start.to_string()));
    out.push_str(&row("bm_block_start", &sb.bm_block_start.to_string()));
    out.push_str(&row("inode_start", &sb.inode_start.to_string()));
    out.push_str(&row("block_start", &sb.block_start.to_string()));
    out.push_str(&row("mtime", &format_unix(sb.mtime)));
    out.push_str(FOOTER);
    out
}

fn render_inodes(fs: &ExtFs) -> Result<String> {
    let bitmap = fs.inode_bitmap()?;
    let mut out = String::from("digraph G {\n  node [shape=plaintext];\n  rankdir=LR;\n");
    let mut used: Vec<usize> = Vec::new();
    for index in 0..bitmap.bits() {
        if !bitmap.test(index) {
            continue;
        }
        used.push(index);
        let inode = fs.read_inode(index as i32)?;
        let kind = if inode.is_dir() { "dir" } else { "file" };
        out.push_str(&format!(
            "  inode{index} [label=<\n    <table border=\"1\" cellborder=\"1\" cellspacing=\"0\">\n      <tr><td colspan=\"2\" bgcolor=\"lightyellow\"><b>inode {index} ({kind})</b></td></tr>\n{}{}{}{}\n    </table>\n  >];\n",
            row("uid:gid", &format!("{}:{}", inode.uid, inode.gid)),
            row("size", &inode.size.to_string()),
            row("perm", &format!("{:03}", inode.perm().to_octal())),
            row(
                "blocks",
                &inode
                    .direct_blocks()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        ));
    }
    for pair in used.windows(2) {
        out.push_str(&format!("  inode{} -> inode{};\n", pair[0], pair[1]));
    }
    out.push_str("}\n");
    Ok(out)
}

fn render_journal(fs: &ExtFs) -> Result<String> {
    let entries = journal::entries(fs)?;
    let mut out = header("Journal");
    for (index, entry) in entries.iter().enumerate() {
        let mut content = entry.content().to_string();
        if content.len() > 60 {
            content.truncate(60);
            content.push_str("...");
        }
        out.push_str(&row(
            &format!("{index}"),
            &format!(
                "{} {} {} @ {}",
                entry.op(),
                entry.path(),
                content,
                format_unix(entry.date)
            ),
        ));
    }
    out.push_str(FOOTER);
    Ok(out)
}

fn render_file(fs: &ExtFs, path: &str) -> Result<String> {
    let ino = fs.resolve(path)?;
    let inode = fs.read_inode(ino)?;
    if !inode.is_file() {
        return Err(FsError::NotAFile(path.to_string()));
    }
    let content = fs.read_inode_content(&inode)?;
    let mut out = header(&format!("file {path}"));
    out.push_str(&row("size", &inode.size.to_string()));
    out.push_str(&row("content", &String::from_utf8_lossy(&content)));
    out.push_str(FOOTER);
    Ok(out)
}

fn render_ls(fs: &ExtFs, path: &str) -> Result<String> {
    let rows = fs.list_dir(path)?;
    let mut out = format!(
        "digraph G {{\n  node [shape=plaintext];\n  ls [label=<\n    <table border=\"1\" cellborder=\"1\" cellspacing=\"0\">\n      <tr><td colspan=\"6\" bgcolor=\"lightblue\"><b>ls {}</b></td></tr>\n      <tr><td>name</td><td>type</td><td>size</td><td>perm</td><td>uid:gid</td><td>mtime</td></tr>\n",
        escape(path)
    );
    for entry in &rows {
        let kind = match entry.kind {
            FileKind::Directory => "dir",
            FileKind::Regular => "file",
        };
        out.push_str(&format!(
            "      <tr><td>{}</td><td>{}</td><td>{}</td><td>{:03}</td><td>{}:{}</td><td>{}</td></tr>\n",
            escape(&entry.name),
            kind,
            entry.size,
            entry.perm.to_octal(),
            entry.uid,
            entry.gid,
            format_unix(entry.mtime)
        ));
    }
    out.push_str(FOOTER);
    Ok(out)
}
