pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Shell command line assembled from quoted arguments.
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    parts: Vec<String>,
}

impl RemoteCommand {
    /// `program` is used verbatim; use [`RemoteCommand::executable`] for paths.
    pub fn new(program: &str) -> Self {
        Self {
            parts: vec![program.to_string()],
        }
    }

    pub fn executable(path: &str) -> Self {
        Self {
            parts: vec![shell_quote(path)],
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.parts.push(shell_quote(arg));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.parts.push(shell_quote(arg.as_ref()));
        }
        self
    }

    fn append_raw(mut self, s: &str) -> Self {
        self.parts.push(s.to_string());
        self
    }

    pub fn and(self, other: RemoteCommand) -> Self {
        self.append_raw("&&").merge(other)
    }

    fn merge(mut self, other: RemoteCommand) -> Self {
        self.parts.extend(other.parts);
        self
    }

    pub fn to_shell_string(&self) -> String {
        self.parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_invocation() {
        let cmd = RemoteCommand::new("sh")
            .arg("/home/a/kmcx/jobs/kmcx_submit.sh")
            .args(["/home/a/kmcx/jobs/kmcx_job.sh", "sim_0001"]);
        assert_eq!(
            cmd.to_shell_string(),
            "sh '/home/a/kmcx/jobs/kmcx_submit.sh' '/home/a/kmcx/jobs/kmcx_job.sh' 'sim_0001'"
        );
    }

    #[test]
    fn test_quoting() {
        let cmd = RemoteCommand::executable("/opt/my sims/kmc").arg("it's");
        assert_eq!(cmd.to_shell_string(), "'/opt/my sims/kmc' 'it'\\''s'");
    }

    #[test]
    fn test_chaining() {
        let cmd = RemoteCommand::new("cp")
            .arg("build/kmc")
            .arg("jobs/kmc")
            .and(RemoteCommand::new("chmod").arg("755").arg("jobs/kmc"));
        assert_eq!(
            cmd.to_shell_string(),
            "cp 'build/kmc' 'jobs/kmc' && chmod '755' 'jobs/kmc'"
        );
    }
}
