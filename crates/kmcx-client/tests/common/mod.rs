#![allow(dead_code)]

use async_trait::async_trait;
use kmcx_client::error::{Result, SubmissionError};
use kmcx_client::remote::paths::combine_remote_paths;
use kmcx_client::remote::version::ExeVersion;
use kmcx_client::session::{
    CommandSession, Credentials, ExecOutput, SessionConnector, TransferSession,
};
use kmcx_client::{
    FingerprintStore, HostKeyPolicy, RemoteSubmission, TrustDecision, TrustPrompt,
};
use kmcx_core::config::{ClusterTarget, RemoteLayout};
use kmcx_core::errors::ConfigError;
use kmcx_test_utils::TestContext;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub const HOME: &str = "/home/alice";
pub const FINGERPRINT: &str = "SHA256:c2VydmVyLWtleQ";
pub const BASE_DIR: &str = "/home/alice/projects/yttria/kmcx/jobs";
pub const BUILD_DIR: &str = "/home/alice/projects/yttria/kmcx/build";

/// In-memory stand-in for the remote host.
pub struct ClusterState {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, (Vec<u8>, u32)>,
    pub versions: BTreeMap<String, String>,
    pub commands: Vec<String>,
    pub events: Vec<String>,
    pub fail_transfer_connect: bool,
    pub fail_submit_at: Option<usize>,
    pub submits: usize,
    pub on_submit: Option<Box<dyn FnMut() + Send>>,
    /// Runs after each directory creation or upload with its event text.
    pub on_transfer: Option<Box<dyn FnMut(&str) + Send>>,
    /// Bits cleared from the mode of every new file, like a remote umask.
    pub umask: u32,
}

#[derive(Clone)]
pub struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        let dirs = ["/", "/home", HOME].iter().map(|d| d.to_string()).collect();
        Self {
            state: Arc::new(Mutex::new(ClusterState {
                dirs,
                files: BTreeMap::new(),
                versions: BTreeMap::new(),
                commands: Vec::new(),
                events: Vec::new(),
                fail_transfer_connect: false,
                fail_submit_at: None,
                submits: 0,
                on_submit: None,
                on_transfer: None,
                umask: 0,
            })),
        }
    }

    /// Cluster with current executables already in the job base directory.
    pub fn ready() -> Self {
        let cluster = Self::new();
        cluster.install_executables(BASE_DIR, "kmc 1.2.0");
        cluster
    }

    pub fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap()
    }

    pub fn install_executables(&self, dir: &str, version_output: &str) {
        let layout = RemoteLayout::default();
        let mut state = self.state();
        for name in [&layout.simulator_executable, &layout.solver_executable] {
            let path = combine_remote_paths(dir, name);
            state.files.insert(path.clone(), (Vec::new(), 0o755));
            state.versions.insert(path, version_output.to_string());
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    pub fn file(&self, path: &str) -> Option<(String, u32)> {
        self.state()
            .files
            .get(path)
            .map(|(bytes, mode)| (String::from_utf8_lossy(bytes).into_owned(), *mode))
    }

    pub fn transfer_events(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with("mkdir ") || e.starts_with("upload "))
            .collect()
    }

    pub fn submit_commands(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.starts_with("sh "))
            .collect()
    }

    fn respond(&self, command: &str) -> ExecOutput {
        let mut state = self.state();
        state.commands.push(command.to_string());

        if command == "echo \"$HOME\"" {
            return ok(&format!("{HOME}\n"));
        }
        if let Some(path) = command
            .strip_suffix(" '-version'")
            .map(|p| p.trim_matches('\''))
        {
            return match state.versions.get(path) {
                Some(v) => ok(&format!("{v}\n")),
                None => failed(127, "not found"),
            };
        }
        if command.starts_with("sh ") {
            let index = state.submits;
            state.submits += 1;
            if let Some(hook) = state.on_submit.as_mut() {
                hook();
            }
            if state.fail_submit_at == Some(index) {
                return failed(1, "sbatch: error: invalid partition");
            }
            return ok(&format!("{}\n", 1000 + index));
        }
        ok("")
    }
}

fn ok(stdout: &str) -> ExecOutput {
    ExecOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: 0,
    }
}

fn failed(code: i32, stderr: &str) -> ExecOutput {
    ExecOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code: code,
    }
}

pub struct FakeCommandSession {
    cluster: FakeCluster,
}

#[async_trait]
impl CommandSession for FakeCommandSession {
    async fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        Ok(self.cluster.respond(command))
    }

    async fn home_dir(&mut self) -> Result<String> {
        let output = self.exec("echo \"$HOME\"").await?;
        Ok(output.stdout.trim().to_string())
    }

    async fn close(&mut self) {
        self.cluster.state().events.push("close command".into());
    }
}

pub struct FakeTransferSession {
    cluster: FakeCluster,
}

#[async_trait]
impl TransferSession for FakeTransferSession {
    async fn exists(&mut self, path: &str) -> Result<bool> {
        let state = self.cluster.state();
        Ok(state.dirs.contains(path) || state.files.contains_key(path))
    }

    async fn is_dir(&mut self, path: &str) -> Result<bool> {
        Ok(self.cluster.state().dirs.contains(path))
    }

    async fn create_dir(&mut self, path: &str) -> Result<()> {
        let mut state = self.cluster.state();
        let event = format!("mkdir {path}");
        state.events.push(event.clone());
        state.dirs.insert(path.to_string());
        if let Some(hook) = state.on_transfer.as_mut() {
            hook(&event);
        }
        Ok(())
    }

    async fn upload(&mut self, path: &str, contents: &[u8], mode: u32) -> Result<()> {
        let mut state = self.cluster.state();
        let parent = path.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        if !state.dirs.contains(parent) {
            return Err(SubmissionError::transfer(path, "no such directory"));
        }
        let event = format!("upload {path}");
        state.events.push(event.clone());
        let mode = mode & !state.umask;
        state.files.insert(path.to_string(), (contents.to_vec(), mode));
        if let Some(hook) = state.on_transfer.as_mut() {
            hook(&event);
        }
        Ok(())
    }

    async fn set_mode(&mut self, path: &str, mode: u32) -> Result<()> {
        let mut state = self.cluster.state();
        match state.files.get_mut(path) {
            Some(entry) => {
                entry.1 = mode;
                Ok(())
            }
            None => Err(SubmissionError::transfer(path, "no such file")),
        }
    }

    async fn close(&mut self) {
        self.cluster.state().events.push("close transfer".into());
    }
}

pub struct FakeConnector {
    pub cluster: FakeCluster,
}

#[async_trait]
impl SessionConnector for FakeConnector {
    async fn connect_command(
        &self,
        target: &ClusterTarget,
        _credentials: &Credentials,
        trust: Arc<HostKeyPolicy>,
    ) -> Result<Box<dyn CommandSession>> {
        self.cluster.state().events.push("connect command".into());
        if !trust.check(&target.host, target.port, FINGERPRINT) {
            return Err(SubmissionError::HostRejected {
                host: target.host.clone(),
                fingerprint: FINGERPRINT.to_string(),
            });
        }
        Ok(Box::new(FakeCommandSession {
            cluster: self.cluster.clone(),
        }))
    }

    async fn connect_transfer(
        &self,
        target: &ClusterTarget,
        _credentials: &Credentials,
        trust: Arc<HostKeyPolicy>,
    ) -> Result<Box<dyn TransferSession>> {
        self.cluster.state().events.push("connect transfer".into());
        if self.cluster.state().fail_transfer_connect {
            return Err(SubmissionError::connection(&target.host, "connection refused"));
        }
        if !trust.check(&target.host, target.port, FINGERPRINT) {
            return Err(SubmissionError::HostRejected {
                host: target.host.clone(),
                fingerprint: FINGERPRINT.to_string(),
            });
        }
        Ok(Box::new(FakeTransferSession {
            cluster: self.cluster.clone(),
        }))
    }
}

pub struct ScriptedPrompt {
    pub answer: TrustDecision,
    pub calls: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new(answer: TrustDecision) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TrustPrompt for ScriptedPrompt {
    fn confirm(&self, _: &str, _: u16, _: &str, _: Option<&str>) -> TrustDecision {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub saved: Mutex<Vec<(String, String)>>,
}

impl FingerprintStore for MemoryStore {
    fn save(&self, profile: &str, fingerprint: &str) -> std::result::Result<(), ConfigError> {
        self.saved
            .lock()
            .unwrap()
            .push((profile.to_string(), fingerprint.to_string()));
        Ok(())
    }
}

pub fn target() -> ClusterTarget {
    TestContext::cluster_profile()
        .cluster_target("cluster")
        .unwrap()
}

pub fn pinned_policy() -> Arc<HostKeyPolicy> {
    Arc::new(HostKeyPolicy::new(
        "cluster",
        Some(FINGERPRINT.to_string()),
        ScriptedPrompt::new(TrustDecision::Reject),
        None,
    ))
}

pub fn submission(cluster: &FakeCluster, trust: Arc<HostKeyPolicy>) -> RemoteSubmission {
    RemoteSubmission::new(
        target(),
        RemoteLayout::default(),
        Credentials::for_target(&target()).with_password(Some("secret".into())),
        trust,
    )
    .with_connector(Arc::new(FakeConnector {
        cluster: cluster.clone(),
    }))
    .with_required_version(ExeVersion::new(1, 0, 0, 0))
}
