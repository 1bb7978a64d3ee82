use db::models::{
    activity::Activity, agent_run::AgentRun, decision::Decision, memory_file::MemoryFile,
    project::Project, task::Task, usage_record::UsageRecord,
};
use json_patch::Patch;
use serde::Serialize;
use serde_json::{Value, from_value, json};
use uuid::Uuid;

fn entity_path(kind: &str, key: &str) -> String {
    format!("/{kind}/{key}")
}

fn to_value<T: Serialize>(entity: &T) -> Value {
    serde_json::to_value(entity).unwrap_or_default()
}

// Keys here are uuids and fixed kind names, so the pointer always parses.
fn add_patch<T: Serialize>(kind: &str, key: &str, entity: &T) -> Patch {
    from_value(json!([{
        "op": "add",
        "path": entity_path(kind, key),
        "value": to_value(entity),
    }]))
    .unwrap()
}

fn replace_patch<T: Serialize>(kind: &str, key: &str, entity: &T) -> Patch {
    from_value(json!([{
        "op": "replace",
        "path": entity_path(kind, key),
        "value": to_value(entity),
    }]))
    .unwrap()
}

fn remove_patch(kind: &str, key: &str) -> Patch {
    from_value(json!([{
        "op": "remove",
        "path": entity_path(kind, key),
    }]))
    .unwrap()
}

pub mod project_patch {
    use super::*;

    pub fn add(project: &Project) -> Patch {
        add_patch("projects", &project.id.to_string(), project)
    }

    pub fn replace(project: &Project) -> Patch {
        replace_patch("projects", &project.id.to_string(), project)
    }
}

pub mod task_patch {
    use super::*;

    pub fn add(task: &Task) -> Patch {
        add_patch("tasks", &task.id.to_string(), task)
    }

    pub fn replace(task: &Task) -> Patch {
        replace_patch("tasks", &task.id.to_string(), task)
    }

    pub fn remove(task_id: Uuid) -> Patch {
        remove_patch("tasks", &task_id.to_string())
    }
}

pub mod decision_patch {
    use super::*;

    pub fn add(decision: &Decision) -> Patch {
        add_patch("decisions", &decision.id.to_string(), decision)
    }

    pub fn replace(decision: &Decision) -> Patch {
        replace_patch("decisions", &decision.id.to_string(), decision)
    }
}

pub mod agent_run_patch {
    use super::*;

    // RFC 6902 add on an object member also covers the replace case, which
    // matches upsert semantics.
    pub fn upsert(run: &AgentRun) -> Patch {
        add_patch("agent_runs", &run.id.to_string(), run)
    }
}

pub mod usage_patch {
    use super::*;

    pub fn upsert(record: &UsageRecord) -> Patch {
        add_patch("usage_records", &record.id.to_string(), record)
    }
}

pub mod activity_patch {
    use super::*;

    pub fn add(activity: &Activity) -> Patch {
        add_patch("activities", &activity.id.to_string(), activity)
    }
}

pub mod memory_patch {
    use super::*;

    pub fn upsert(file: &MemoryFile) -> Patch {
        add_patch("memory_files", &file.id.to_string(), file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: &'static str,
    }

    #[test]
    fn add_patch_targets_entity_pointer() {
        let patch = add_patch("tasks", "abc", &Row { name: "t" });
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{"op": "add", "path": "/tasks/abc", "value": {"name": "t"}}])
        );
    }

    #[test]
    fn replace_patch_carries_the_new_value() {
        let patch = replace_patch("projects", "p1", &Row { name: "renamed" });
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{"op": "replace", "path": "/projects/p1", "value": {"name": "renamed"}}])
        );
    }

    #[test]
    fn remove_patch_carries_no_value() {
        let patch = remove_patch("tasks", "abc");
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{"op": "remove", "path": "/tasks/abc"}])
        );
    }
}
