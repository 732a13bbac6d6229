//! Sandbox configuration and builder

use shared::{LogType, ResultCode, StepUrl};
use std::time::Duration;

/// A scheduler that reacts to change events
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSchedulerConfig {
    pub name: String,
    /// How long after `start()` the scheduler attaches its consumer
    pub subscribe_delay: Duration,
}

impl ChangeSchedulerConfig {
    pub fn new(name: impl Into<String>, subscribe_delay: Duration) -> Self {
        Self {
            name: name.into(),
            subscribe_delay,
        }
    }
}

/// Log produced by a scripted step
#[derive(Debug, Clone, PartialEq)]
pub struct LogScript {
    pub name: String,
    pub log_type: LogType,
    pub content: String,
}

impl LogScript {
    /// Structured log; each line must carry its one-character type tag
    pub fn stdio(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log_type: LogType::Stdio,
            content: content.into(),
        }
    }

    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log_type: LogType::Text,
            content: content.into(),
        }
    }

    pub fn num_lines(&self) -> usize {
        self.content.lines().count()
    }
}

/// Step every unit executes, in order
#[derive(Debug, Clone, PartialEq)]
pub struct StepScript {
    pub name: String,
    pub results: ResultCode,
    pub urls: Vec<StepUrl>,
    pub logs: Vec<LogScript>,
}

impl StepScript {
    pub fn new(name: impl Into<String>, results: ResultCode) -> Self {
        Self {
            name: name.into(),
            results,
            urls: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn with_log(mut self, log: LogScript) -> Self {
        self.logs.push(log);
        self
    }

    pub fn with_url(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.urls.push(StepUrl {
            name: name.into(),
            url: url.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxConfig {
    pub change_schedulers: Vec<ChangeSchedulerConfig>,
    pub force_schedulers: Vec<String>,
    /// Extra random delay added to every scheduler's subscribe delay
    pub subscribe_jitter: Option<Duration>,
    pub jitter_seed: u64,
    /// Identifier given to the first unit; later units count up from it
    pub first_unit_id: u64,
    pub steps: Vec<StepScript>,
    /// Simulated duration of each step
    pub step_delay: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            change_schedulers: vec![ChangeSchedulerConfig::new(
                "change-consumer",
                Duration::from_millis(50),
            )],
            force_schedulers: vec!["force".to_string()],
            subscribe_jitter: None,
            jitter_seed: 0,
            first_unit_id: 1,
            steps: Self::default_steps(),
            step_delay: Duration::ZERO,
        }
    }
}

impl SandboxConfig {
    /// Create a new builder
    pub fn builder() -> SandboxConfigBuilder {
        SandboxConfigBuilder::new()
    }

    /// Two successful steps with one structured log each
    pub fn default_steps() -> Vec<StepScript> {
        vec![
            StepScript::new("checkout", ResultCode::Success)
                .with_url("repository", "file:///sandbox/repo")
                .with_log(LogScript::stdio(
                    "stdio",
                    "hgit checkout main\nocloning into workdir\nocheckout complete\n",
                )),
            StepScript::new("compile", ResultCode::Success).with_log(LogScript::stdio(
                "stdio",
                "hmake all\nocompiling 3 files\nobuild finished\n",
            )),
        ]
    }

    /// Validate the configuration before starting a service with it
    pub fn validate(&self) -> Result<(), String> {
        let mut names: Vec<&str> = self
            .change_schedulers
            .iter()
            .map(|s| s.name.as_str())
            .chain(self.force_schedulers.iter().map(String::as_str))
            .collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(format!("duplicate scheduler name '{}'", pair[0]));
        }
        if self.first_unit_id == 0 {
            return Err("first_unit_id must be positive".to_string());
        }
        Ok(())
    }
}

pub struct SandboxConfigBuilder {
    config: SandboxConfig,
}

impl SandboxConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SandboxConfig::default(),
        }
    }

    /// Replace all change schedulers
    pub fn change_schedulers(mut self, schedulers: Vec<ChangeSchedulerConfig>) -> Self {
        self.config.change_schedulers = schedulers;
        self
    }

    /// Add one change scheduler
    pub fn change_scheduler(mut self, name: impl Into<String>, subscribe_delay: Duration) -> Self {
        self.config
            .change_schedulers
            .push(ChangeSchedulerConfig::new(name, subscribe_delay));
        self
    }

    /// Remove every change scheduler
    pub fn without_change_schedulers(mut self) -> Self {
        self.config.change_schedulers.clear();
        self
    }

    pub fn force_schedulers(mut self, names: Vec<String>) -> Self {
        self.config.force_schedulers = names;
        self
    }

    /// Add seeded random jitter to the subscribe delays
    pub fn subscribe_jitter(mut self, max: Duration, seed: u64) -> Self {
        self.config.subscribe_jitter = Some(max);
        self.config.jitter_seed = seed;
        self
    }

    pub fn first_unit_id(mut self, id: u64) -> Self {
        self.config.first_unit_id = id;
        self
    }

    pub fn steps(mut self, steps: Vec<StepScript>) -> Self {
        self.config.steps = steps;
        self
    }

    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.config.step_delay = delay;
        self
    }

    pub fn build(self) -> SandboxConfig {
        self.config
    }
}

impl Default for SandboxConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
