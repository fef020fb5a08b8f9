//! Delivery command construction.
//!
//! The delivery program is invoked as `<command...> agent ...` for agent
//! targets and `<command...> message send ...` for direct messages. The
//! message is prefixed with a marker naming the originating job so the agent
//! can tell scheduled traffic from interactive traffic.

use clawgate_config::{DeliveryConfig, RoutingConfig};
use clawgate_jobs::{Job, Target};

use crate::error::ExecutorError;

pub const GATEWAY_URL_ENV: &str = "OPENCLAW_GATEWAY_URL";
pub const GATEWAY_TOKEN_ENV: &str = "OPENCLAW_GATEWAY_TOKEN";

/// A fully built invocation of the delivery program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Index into `args` of the message text.
    message_index: usize,
}

impl DeliveryCommand {
    pub fn message(&self) -> &str {
        &self.args[self.message_index]
    }

    /// Command line with the message elided and credentials omitted.
    pub fn redacted(&self) -> String {
        let mut parts = vec![self.program.clone()];
        for (i, arg) in self.args.iter().enumerate() {
            if i == self.message_index {
                parts.push(format!("<message: {} chars>", arg.chars().count()));
            } else if arg.is_empty() || arg.contains(char::is_whitespace) {
                parts.push(format!("{arg:?}"));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

/// Builds [`DeliveryCommand`]s from configuration.
#[derive(Debug, Clone)]
pub struct DeliveryBuilder {
    delivery: DeliveryConfig,
    routing: RoutingConfig,
}

impl DeliveryBuilder {
    pub fn new(delivery: DeliveryConfig, routing: RoutingConfig) -> Self {
        Self { delivery, routing }
    }

    /// Reply account for `target`: explicit on the job, else routed by agent.
    pub fn reply_account(&self, target: &Target) -> Option<String> {
        target
            .reply_account()
            .or_else(|| {
                target
                    .agent_id()
                    .and_then(|agent| self.routing.reply_account(agent))
                    .or(self.routing.default_account.as_deref())
            })
            .map(str::to_string)
    }

    pub fn build(&self, job: &Job, message: &str) -> Result<DeliveryCommand, ExecutorError> {
        let (program, fixed) = self
            .delivery
            .command
            .split_first()
            .filter(|(program, _)| !program.trim().is_empty())
            .ok_or_else(|| ExecutorError::Delivery("delivery command is empty".to_string()))?;

        let reply_account = self.reply_account(&job.target);
        let annotated = annotate(job, reply_account.as_deref(), message);

        let mut args: Vec<String> = fixed.to_vec();
        let message_index;
        match &job.target {
            Target::Agent {
                agent_id,
                channel,
                to,
                ..
            } => {
                args.extend(["agent".into(), "--agent".into(), agent_id.clone()]);
                args.push("--message".into());
                message_index = args.len();
                args.push(annotated);
                if let Some(channel) = channel {
                    args.extend(["--channel".into(), channel.clone()]);
                }
                if let Some(to) = to {
                    args.extend(["--to".into(), to.clone(), "--deliver".into()]);
                }
                if let Some(account) = &reply_account {
                    args.extend(["--reply-account".into(), account.clone()]);
                }
            }
            Target::Message { channel, to, .. } => {
                args.extend([
                    "message".into(),
                    "send".into(),
                    "--channel".into(),
                    channel.clone(),
                    "--target".into(),
                    to.clone(),
                    "--message".into(),
                ]);
                message_index = args.len();
                args.push(annotated);
                if let Some(account) = &reply_account {
                    args.extend(["--account".into(), account.clone()]);
                }
            }
        }

        let mut env = Vec::new();
        if let Some(url) = &self.delivery.gateway_url {
            env.push((GATEWAY_URL_ENV.to_string(), url.clone()));
        }
        if let Some(token) = &self.delivery.gateway_token {
            env.push((GATEWAY_TOKEN_ENV.to_string(), token.clone()));
        }

        Ok(DeliveryCommand {
            program: program.clone(),
            args,
            env,
            message_index,
        })
    }
}

/// Prefix the job-origin marker and reply hint.
fn annotate(job: &Job, reply_account: Option<&str>, message: &str) -> String {
    let name = job.name.replace('"', "'");
    let mut header = format!("[ClawGate job={} name=\"{}\"", job.id, name);
    if let Some(account) = reply_account {
        header.push_str(&format!(" reply-account={account}"));
    }
    header.push(']');
    format!("{header}\n\n{message}")
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
