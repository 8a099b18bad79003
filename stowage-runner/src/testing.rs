//! Test fixtures shared by the engine's unit tests

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use stowage_core::domain::policy::{SchedulePolicy, ScheduleKind};
use stowage_core::domain::target::Target;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::command::CommandSpec;
use crate::error::{BackupError, Result};
use crate::remote::{CommandOutput, RemoteChannel};
use crate::service::RunLog;

pub fn target() -> Target {
    Target {
        id: Uuid::new_v4(),
        name: Some("web".to_string()),
        host: "web1.example.com".to_string(),
        port: 22,
        username: "deploy".to_string(),
        password: None,
        private_key_path: None,
        local_path: None,
        custom_paths: vec![],
        backup_www: false,
        backup_logs: false,
        backup_nginx: false,
        backup_db: false,
        db_host: None,
        db_port: None,
        db_user: None,
        db_password: None,
        db_names: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

pub fn policy(kind: ScheduleKind, target_id: Option<Uuid>) -> SchedulePolicy {
    SchedulePolicy {
        id: Uuid::new_v4(),
        target_id,
        kind,
        time_of_day: Some("02:30".to_string()),
        day_of_week: None,
        day_of_month: None,
        cron_expression: None,
        enabled: true,
        last_run: None,
        next_run: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

/// Canned response for a scripted command
#[derive(Clone)]
pub enum Reply {
    Ok,
    Stdout(String),
    Fail(i32),
    ConnectFail,
    /// Blocks until the gate is notified, then succeeds
    Wait(Arc<Notify>),
}

/// A recorded invocation
#[derive(Debug, Clone)]
pub struct Call {
    pub remote: bool,
    pub program: String,
    pub args: Vec<String>,
    pub display: String,
}

impl Call {
    /// Program name with an `sshpass -e` wrapper peeled off
    pub fn logical_program(&self) -> &str {
        if self.program == "sshpass" {
            self.args.get(1).map(String::as_str).unwrap_or("sshpass")
        } else {
            &self.program
        }
    }
}

struct Rule {
    pattern: String,
    nth: Option<usize>,
    reply: Reply,
    matched: usize,
}

/// `RemoteChannel` double answering from rules matched against the
/// redacted command line; unmatched commands succeed with no output
#[derive(Default)]
pub struct ScriptedChannel {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command containing `pattern` gets `reply`; first rule wins
    pub fn on(&self, pattern: &str, reply: Reply) {
        self.push_rule(pattern, None, reply);
    }

    /// Only the `nth` (0-based) command containing `pattern` gets `reply`
    pub fn on_nth(&self, pattern: &str, nth: usize, reply: Reply) {
        self.push_rule(pattern, Some(nth), reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.logical_program().to_string())
            .collect()
    }

    fn push_rule(&self, pattern: &str, nth: Option<usize>, reply: Reply) {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            nth,
            reply,
            matched: 0,
        });
    }

    fn reply_for(&self, display: &str) -> Reply {
        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if display.contains(&rule.pattern) {
                let index = rule.matched;
                rule.matched += 1;
                if rule.nth.is_none_or(|n| n == index) {
                    return rule.reply.clone();
                }
            }
        }
        Reply::Ok
    }

    async fn answer(&self, remote: bool, command: &CommandSpec) -> Result<CommandOutput> {
        let display = command.to_string();
        self.calls.lock().unwrap().push(Call {
            remote,
            program: command.program().to_string(),
            args: command.argv().iter().map(|a| a.to_string()).collect(),
            display: display.clone(),
        });

        match self.reply_for(&display) {
            Reply::Ok => Ok(CommandOutput::default()),
            Reply::Stdout(stdout) => Ok(CommandOutput {
                stdout,
                ..CommandOutput::default()
            }),
            Reply::Fail(exit_code) if remote => Err(BackupError::RemoteExecFailed {
                command: display,
                exit_code,
            }),
            Reply::Fail(exit_code) => Err(BackupError::LocalExecFailed {
                command: display,
                reason: format!("exit code {}", exit_code),
            }),
            Reply::ConnectFail => Err(BackupError::ConnectFailed {
                host: "scripted".to_string(),
                reason: "Connection refused".to_string(),
            }),
            Reply::Wait(gate) => {
                gate.notified().await;
                Ok(CommandOutput::default())
            }
        }
    }
}

#[async_trait]
impl RemoteChannel for ScriptedChannel {
    async fn run_remote(
        &self,
        _target: &Target,
        command: &CommandSpec,
        _log: &RunLog,
    ) -> Result<CommandOutput> {
        self.answer(true, command).await
    }

    async fn run_local(&self, command: &CommandSpec, _log: &RunLog) -> Result<CommandOutput> {
        self.answer(false, command).await
    }
}
