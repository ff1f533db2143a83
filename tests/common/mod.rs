//! Shared test harness: a real store on a throwaway database plus a stub
//! provisioner script that records every invocation.

use std::path::PathBuf;

use tempfile::TempDir;
use vmbroker::{Config, SharedState};

pub struct TestHarness {
    pub state: SharedState,
    pub call_log: PathBuf,
    _dir: TempDir,
}

impl TestHarness {
    /// Harness with a provisioner stub that always succeeds.
    pub async fn new() -> Self {
        Self::with_stub(0, 0, 10).await
    }

    /// Harness with a provisioner stub that always fails.
    pub async fn with_failing_provisioner() -> Self {
        Self::with_stub(1, 0, 10).await
    }

    /// Harness with a stub that sleeps well past the configured 1s timeout.
    pub async fn with_hanging_provisioner() -> Self {
        Self::with_stub(0, 30, 1).await
    }

    async fn with_stub(exit_code: i32, sleep_secs: u64, timeout_secs: u64) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let call_log = dir.path().join("calls.log");

        // Records "<working dir> <args>" per invocation, so tests can assert
        // both what ran and where it ran from.
        let stub = dir.path().join("fake-vagrant.sh");
        let script = format!(
            "#!/bin/sh\nsleep {sleep_secs}\necho \"$PWD $@\" >> \"{}\"\necho \"stub: $@\"\nexit {exit_code}\n",
            call_log.display()
        );
        std::fs::write(&stub, script).expect("write stub script");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755))
                .expect("make stub executable");
        }

        let templates = dir.path().join("templates");
        std::fs::create_dir_all(&templates).expect("create templates dir");
        std::fs::write(
            templates.join("Vagrantfile.tmpl"),
            "id = {{id}}\nhostname = \"{{hostname}}\"\nip = \"{{ip}}\"\n",
        )
        .expect("write template");
        std::fs::write(templates.join("bootstrap.sh"), "#!/bin/sh\ntrue\n")
            .expect("write aux file");

        let mut config = Config::default();
        config.general.database_path =
            format!("sqlite:{}", dir.path().join("test.db").display());
        config.provisioner.binary = stub.to_string_lossy().to_string();
        config.provisioner.work_dir = dir.path().join("machines");
        config.provisioner.templates_dir = templates;
        config.provisioner.command_timeout_secs = timeout_secs;

        let state = SharedState::new(config).await.expect("build shared state");

        Self {
            state,
            call_log,
            _dir: dir,
        }
    }

    /// Every stub invocation so far, one line per call.
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.call_log)
            .map(|raw| raw.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
