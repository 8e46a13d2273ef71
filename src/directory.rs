//! Directory-listing worker: an HTML `<PRE>` table sorted by name, with
//! other-permission-only mode bits, symlink arrows, and file-class suffixes.
//! The teacher's `generate_autoindex` (in `src/handlers/get_handler.rs`)
//! emits a plain `<ul><li>` list with none of this — it is not adapted,
//! only superseded, since the design calls for the original implementation's
//! richer `ls -l`-style table.

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const SIX_MONTHS_SECS: i64 = 60 * 60 * 24 * 182;

struct Row {
    name: String,
    mode_str: String,
    links: u64,
    size: u64,
    time_str: String,
    target: Option<String>,
    class_suffix: char,
}

/// Lists `dir`'s entries (symlinks resolved up to `max_links` hops for
/// classification, matching `MAX_LINKS`) as an HTML fragment.
pub fn render(dir: &Path, now: SystemTime, max_links: u32) -> std::io::Result<String> {
    let mut names: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let now_secs = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;

    let mut rows = Vec::new();
    for name in names {
        let path = dir.join(&name);
        let meta = match fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(_) => continue,
        };

        let is_symlink = meta.file_type().is_symlink();
        let target = if is_symlink { follow_symlink(&path, max_links) } else { None };

        let resolved_meta = if is_symlink {
            fs::metadata(&path).unwrap_or(meta.clone())
        } else {
            meta.clone()
        };

        let mode = resolved_meta.permissions().mode();
        let class_suffix = if resolved_meta.is_dir() {
            '/'
        } else if is_symlink {
            '@'
        } else if resolved_meta.file_type().is_socket_like() {
            '='
        } else if mode & 0o001 != 0 {
            '*'
        } else {
            ' '
        };

        let mtime = resolved_meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let time_str = format_listing_time(mtime, now_secs);

        rows.push(Row {
            name,
            mode_str: other_perms_str(mode),
            links: resolved_meta.nlink(),
            size: resolved_meta.len(),
            time_str,
            target,
            class_suffix,
        });
    }

    let mut out = String::from("<html><body><pre>\n");
    for row in rows {
        let suffix = if row.class_suffix == ' ' { String::new() } else { row.class_suffix.to_string() };
        let arrow = row.target.as_deref().map(|t| format!(" -&gt; {}", t)).unwrap_or_default();
        out.push_str(&format!(
            "{mode} {links:>3} {size:>10} {time} {name}{suffix}{arrow}\n",
            mode = row.mode_str,
            links = row.links,
            size = row.size,
            time = row.time_str,
            name = row.name,
            suffix = suffix,
            arrow = arrow,
        ));
    }
    out.push_str("</pre></body></html>\n");
    Ok(out)
}

trait SocketLikeExt {
    fn is_socket_like(&self) -> bool;
}
impl SocketLikeExt for fs::FileType {
    fn is_socket_like(&self) -> bool {
        use std::os::unix::fs::FileTypeExt;
        self.is_socket()
    }
}

fn other_perms_str(mode: u32) -> String {
    let r = if mode & 0o004 != 0 { 'r' } else { '-' };
    let w = if mode & 0o002 != 0 { 'w' } else { '-' };
    let x = if mode & 0o001 != 0 { 'x' } else { '-' };
    format!("{}{}{}", r, w, x)
}

fn follow_symlink(path: &Path, max_links: u32) -> Option<String> {
    let mut current = path.to_path_buf();
    for _ in 0..max_links {
        match fs::read_link(&current) {
            Ok(target) => {
                if target.is_absolute() {
                    return Some(target.display().to_string());
                }
                current = current.parent().unwrap_or(Path::new("/")).join(&target);
            }
            Err(_) => return Some(current.display().to_string()),
        }
    }
    Some(current.display().to_string())
}

fn format_listing_time(mtime: i64, now_secs: i64) -> String {
    const MONTHS: [&str; 12] =
        ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
    let (year, month, day) = access_log::format_time(UNIX_EPOCH + std::time::Duration::from_secs(mtime.max(0) as u64))
        .split(' ')
        .next()
        .map(|ymd| {
            let mut it = ymd.split('-');
            (
                it.next().unwrap().parse::<i64>().unwrap(),
                it.next().unwrap().parse::<usize>().unwrap(),
                it.next().unwrap().parse::<u32>().unwrap(),
            )
        })
        .unwrap();
    let rem = mtime.rem_euclid(86_400);
    if (now_secs - mtime).abs() > SIX_MONTHS_SECS {
        format!("{:>3} {:02} {:>5}", MONTHS[month - 1], day, year)
    } else {
        format!("{:>3} {:02} {:02}:{:02}", MONTHS[month - 1], day, rem / 3600, (rem % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn old_entries_use_year_format() {
        let old = format_listing_time(0, 100 * 365 * 86_400);
        assert!(old.contains("1970"));
        assert!(!old.contains(':'));
    }

    #[test]
    fn recent_entries_use_time_format() {
        let now = 1_700_000_000i64;
        let recent = format_listing_time(now - 3600, now);
        assert!(recent.contains(':'));
    }

    #[test]
    fn other_perms_str_masks_owner_and_group_bits() {
        assert_eq!(other_perms_str(0o750), "---");
        assert_eq!(other_perms_str(0o755), "r-x");
    }
}
