//! Remote (POSIX) path arithmetic. Remote paths are plain strings; the
//! local `Path` type would apply the client platform's rules.

use kmcx_core::constants::files;
use kmcx_core::job::JobId;

pub fn is_rooted(path: &str) -> bool {
    path.starts_with('/')
}

fn trim_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Joins `a` and `b`. A rooted `b` replaces `a` entirely; an empty `a`
/// yields `b`. The result never ends in a slash (except `/` itself).
pub fn combine_remote_paths(a: &str, b: &str) -> String {
    if is_rooted(b) || a.is_empty() {
        return trim_trailing_slash(b).to_string();
    }
    let head = trim_trailing_slash(a);
    let tail = trim_trailing_slash(b);
    match (head, tail) {
        (head, "") => head.to_string(),
        ("/", tail) => format!("/{tail}"),
        (head, tail) => format!("{head}/{tail}"),
    }
}

/// Directories to create, shallowest first, ending at the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDirectoryPlan {
    directories: Vec<String>,
}

impl RemoteDirectoryPlan {
    pub fn directories(&self) -> &[String] {
        &self.directories
    }

    pub fn target(&self) -> &str {
        self.directories.last().map(String::as_str).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.directories.iter().map(String::as_str)
    }
}

/// Resolves `sub` below `workspace` below `home` and lists the directory
/// chain from `home` (or from the root, for targets outside it) down to
/// the target.
pub fn construct_remote_directory_list(home: &str, workspace: &str, sub: &str) -> RemoteDirectoryPlan {
    let target = combine_remote_paths(home, &combine_remote_paths(workspace, sub));
    let rooted = is_rooted(&target);
    let home = trim_trailing_slash(home);

    let mut directories = Vec::new();
    let mut current = String::new();
    for segment in target.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if current.is_empty() && !rooted {
            current.push_str(segment);
        } else {
            current.push('/');
            current.push_str(segment);
        }
        let is_home_ancestor = home.len() > current.len()
            && home.starts_with(current.as_str())
            && home.as_bytes().get(current.len()) == Some(&b'/');
        if !is_home_ancestor {
            directories.push(current.clone());
        }
    }
    if directories.is_empty() && !target.is_empty() {
        directories.push(target);
    }
    RemoteDirectoryPlan { directories }
}

pub fn job_directory_name(id: JobId) -> String {
    format!("{:04}", id.get())
}

pub fn job_name(prefix: &str, id: JobId) -> String {
    format!("{}_{:04}", prefix, id.get())
}

pub fn job_input_file_name(prefix: &str, id: JobId) -> String {
    format!("{}.{}", job_name(prefix, id), files::INPUT_EXTENSION)
}

pub fn job_log_file_name(prefix: &str, id: JobId) -> String {
    format!("{}.{}", job_name(prefix, id), files::LOG_EXTENSION)
}
