//! Scheduler tools; let the model manage its own cron jobs.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use vo_tools::{Tool, ToolContext, ToolResult};

use crate::store::JobStore;

/// Build the scheduler tool set over a shared job store.
pub fn scheduler_tools(store: Arc<JobStore>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ScheduleJob {
            store: Arc::clone(&store),
        }),
        Arc::new(RemoveScheduledJob {
            store: Arc::clone(&store),
        }),
        Arc::new(ListScheduledJobs { store }),
    ]
}

// ---------------------------------------------------------------------------
// schedule_job
// ---------------------------------------------------------------------------

struct ScheduleJob {
    store: Arc<JobStore>,
}

#[async_trait]
impl Tool for ScheduleJob {
    fn name(&self) -> &str {
        "schedule_job"
    }

    fn description(&self) -> &str {
        "Create a recurring job. At each cron tick the prompt is evaluated \
         and the answer is delivered to the given channel. Omit channel_id \
         to deliver to the current channel."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Unique job name; re-using a name replaces the job."
                },
                "cron": {
                    "type": "string",
                    "description": "Five-field cron expression, e.g. '0 9 * * *'."
                },
                "prompt": {
                    "type": "string",
                    "description": "Instruction evaluated at every tick."
                },
                "channel_id": {
                    "type": "string",
                    "description": "Delivery channel id."
                },
                "timezone": {
                    "type": "string",
                    "description": "IANA timezone name, e.g. 'Europe/Stockholm'. Default UTC."
                }
            },
            "required": ["name", "cron", "prompt"]
        })
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let Some(name) = args.get("name").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: name");
        };
        let Some(cron) = args.get("cron").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: cron");
        };
        let prompt = args.get("prompt").and_then(|v| v.as_str()).unwrap_or("");
        let channel_id = args
            .get("channel_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| ctx.channel_id.clone());
        let Some(channel_id) = channel_id else {
            return ToolResult::error(
                "no channel_id given and the current context has no channel",
            );
        };
        let timezone = args.get("timezone").and_then(|v| v.as_str());

        match self
            .store
            .add_job(name, cron, prompt, &channel_id, timezone)
        {
            Ok(job) => ToolResult::success(format!(
                "Job '{}' scheduled ({}), next fire: {}",
                job.name,
                job.cron,
                job.next_fire.as_deref().unwrap_or("never"),
            )),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// remove_scheduled_job
// ---------------------------------------------------------------------------

struct RemoveScheduledJob {
    store: Arc<JobStore>,
}

#[async_trait]
impl Tool for RemoveScheduledJob {
    fn name(&self) -> &str {
        "remove_scheduled_job"
    }

    fn description(&self) -> &str {
        "Delete a scheduled job by name, along with its event type and handler."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Job name to delete." }
            },
            "required": ["name"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let Some(name) = args.get("name").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: name");
        };
        match self.store.remove_job(name) {
            Ok(()) => ToolResult::success(format!("Job removed: {name}")),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// list_scheduled_jobs
// ---------------------------------------------------------------------------

struct ListScheduledJobs {
    store: Arc<JobStore>,
}

#[async_trait]
impl Tool for ListScheduledJobs {
    fn name(&self) -> &str {
        "list_scheduled_jobs"
    }

    fn description(&self) -> &str {
        "List every scheduled job with its cron expression and next fire time."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
        match self.store.list_jobs() {
            Ok(jobs) if jobs.is_empty() => ToolResult::success("No jobs scheduled."),
            Ok(jobs) => {
                let mut out = String::new();
                for job in &jobs {
                    out.push_str(&format!(
                        "- {} ({}) -> {} | next: {}\n",
                        job.name,
                        job.cron,
                        job.channel_id,
                        job.next_fire.as_deref().unwrap_or("never"),
                    ));
                }
                ToolResult::success(out)
            }
            Err(e) => ToolResult::error(format!("list_scheduled_jobs failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vo_channels::ChannelInfo;
    use vo_core::db::open_db_in_memory;
    use vo_registry::HandlerRegistry;

    fn setup() -> Vec<Arc<dyn Tool>> {
        let registry = Arc::new(HandlerRegistry::new(open_db_in_memory().unwrap()).unwrap());
        registry
            .upsert_channel(&ChannelInfo {
                id: "C1".to_string(),
                type_name: "memory".to_string(),
                is_group: false,
                is_private: false,
            })
            .unwrap();
        let store = Arc::new(JobStore::new(open_db_in_memory().unwrap(), registry).unwrap());
        scheduler_tools(store)
    }

    fn find<'a>(tools: &'a [Arc<dyn Tool>], name: &str) -> &'a Arc<dyn Tool> {
        tools.iter().find(|t| t.name() == name).unwrap()
    }

    #[tokio::test]
    async fn schedule_falls_back_to_the_current_channel() {
        let tools = setup();
        let ctx = ToolContext {
            channel_id: Some("C1".to_string()),
            ..ToolContext::default()
        };
        let result = find(&tools, "schedule_job")
            .invoke(
                serde_json::json!({"name": "daily", "cron": "0 9 * * *", "prompt": "hi"}),
                &ctx,
            )
            .await;
        assert!(!result.is_error, "{}", result.output);
        assert!(result.output.contains("daily"));
    }

    #[tokio::test]
    async fn bad_cron_comes_back_as_a_tool_string() {
        let tools = setup();
        let ctx = ToolContext {
            channel_id: Some("C1".to_string()),
            ..ToolContext::default()
        };
        let result = find(&tools, "schedule_job")
            .invoke(
                serde_json::json!({"name": "j", "cron": "banana", "prompt": "x"}),
                &ctx,
            )
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("banana"));
    }
}
